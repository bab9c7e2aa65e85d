use crate::anchoring::{Anchor, AnchorPatch, HighlightId};

/// The one copy of a page's anchor collection that every code path reads
/// and writes. Anchors are kept in creation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileContext {
    url: String,
    anchors: Vec<Anchor>,
    enabled: bool,
}

impl ReconcileContext {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anchors: Vec::new(),
            enabled: true,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    pub fn get(&self, id: &HighlightId) -> Option<&Anchor> {
        self.anchors.iter().find(|anchor| &anchor.id == id)
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Returns whether the flag changed.
    pub fn set_enabled(&mut self, enabled: bool) -> bool {
        let changed = self.enabled != enabled;
        self.enabled = enabled;
        changed
    }

    /// How many markers a fully reconciled page should show.
    pub fn expected_markers(&self) -> usize {
        if self.enabled { self.anchors.len() } else { 0 }
    }

    pub fn replace_all(&mut self, anchors: Vec<Anchor>) {
        self.anchors = anchors;
    }

    /// Append an anchor, replacing an existing one with the same id in place.
    pub fn push(&mut self, anchor: Anchor) {
        match self.anchors.iter_mut().find(|a| a.id == anchor.id) {
            Some(existing) => *existing = anchor,
            None => self.anchors.push(anchor),
        }
    }

    pub fn update(&mut self, id: &HighlightId, patch: &AnchorPatch) -> Option<&Anchor> {
        let anchor = self.anchors.iter_mut().find(|a| &a.id == id)?;
        patch.apply(anchor);
        Some(anchor)
    }

    pub fn remove(&mut self, id: &HighlightId) -> Option<Anchor> {
        let position = self.anchors.iter().position(|a| &a.id == id)?;
        Some(self.anchors.remove(position))
    }
}
