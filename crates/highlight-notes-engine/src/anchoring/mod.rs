//! # Text Anchoring
//!
//! Turning a live selection into a durable [`Anchor`] and finding it again
//! in a document that may have changed since.
//!
//! ```text
//! DomRange ──build_anchor──▶ Anchor ──(persist, reload, mutate)──▶ resolve ──▶ DomRange
//!               │                                                   │
//!               └────────────── TextIndex (flattened text) ─────────┘
//! ```
//!
//! Resolution never relies on node identity. It searches the flattened text
//! of the scope for the quote, verifies each hit against a short window of
//! the stored prefix/suffix, and breaks ties with the stored offset.

pub mod anchor;
pub mod builder;
pub mod index;
pub mod resolver;

pub use anchor::{Anchor, AnchorPatch, HighlightId};
pub use builder::build_anchor;
pub use index::{Affinity, TextIndex, TextLeaf};
pub use resolver::{NotFoundReason, Resolution, Resolved, resolve};
