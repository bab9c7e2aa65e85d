//! Anchoring user highlights to text in a live, mutable document and
//! finding them again after reloads and re-renders.

pub mod anchoring;
pub mod dom;
pub mod error;
pub mod highlighter;
pub mod reconcile;
pub mod render;
pub mod store;

// Re-export key types for easier usage
pub use anchoring::{Anchor, AnchorPatch, HighlightId, NotFoundReason, Resolution, Resolved};
pub use anchoring::{build_anchor, resolve};
pub use dom::{Boundary, Document, DomRange, NodeId};
pub use error::{DomError, HighlightError, StoreError, SyncError};
pub use highlighter::{Highlighter, PassReport};
pub use reconcile::{PageActor, PageHandle, ReconcileContext, ReconcileScheduler};
pub use render::{Interaction, InteractionOutcome, Renderer};
pub use store::{
    HighlightRepository, JsonFileStore, KeyValueStore, MemoryStore, RemoteHighlight, RemoteStore,
    SyncQueue, Syncer,
};
