//! # Reconciliation
//!
//! Pages re-render themselves. Frameworks swap whole subtrees and take our
//! markers with them without saying so, so the engine watches the mutation
//! log and, when markers have gone missing, re-resolves the whole collection
//! against the current DOM.
//!
//! - [`ReconcileContext`] holds the one authoritative anchor collection for
//!   a page.
//! - [`ReconcileScheduler`] decides when a pass is due (calm detection,
//!   debounce, throttle, suppression after deletes).
//! - [`PageActor`] ties both to a [`Highlighter`](crate::Highlighter) on a
//!   tokio task.

pub mod actor;
pub mod context;
pub mod scheduler;

pub use actor::{PageActor, PageCommand, PageHandle};
pub use context::ReconcileContext;
pub use scheduler::{ReconcileScheduler, SchedulerAction, SchedulerState};
