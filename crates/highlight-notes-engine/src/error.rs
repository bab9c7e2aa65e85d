use crate::dom::NodeId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    #[error("Node {0:?} is not a text node")]
    NotText(NodeId),
    #[error("Node {0:?} has no parent")]
    NoParent(NodeId),
    #[error("Offset {offset} is out of bounds for node {node:?} of length {length}")]
    IndexSize {
        node: NodeId,
        offset: usize,
        length: usize,
    },
    #[error("Cannot insert node {child:?} into its own descendant {parent:?}")]
    HierarchyRequest { parent: NodeId, child: NodeId },
    #[error("Range partially selects a non-text node")]
    PartiallySelected,
    #[error("Range boundaries are not in the same tree")]
    Disconnected,
    #[error("Invalid structural path: {0}")]
    InvalidSelector(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("Remote store unreachable: {0}")]
    Network(String),
    #[error("Remote store rejected the request: {0}")]
    Rejected(String),
    #[error("Remote store requires authentication")]
    Unauthorized,
}

#[derive(Debug, thiserror::Error)]
pub enum HighlightError {
    #[error("Local store error: {0}")]
    Store(#[from] StoreError),
    #[error("DOM error: {0}")]
    Dom(#[from] DomError),
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),
    #[error("No highlight with id {0}")]
    UnknownHighlight(String),
    #[error("Page controller is no longer running")]
    Closed,
}
