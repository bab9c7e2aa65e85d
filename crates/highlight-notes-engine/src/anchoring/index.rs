//! Flattened text view of a scope.
//!
//! The index lists every text leaf under the scope in document order with
//! the char offset it starts at. Text inside note indicators inserted by the
//! renderer is skipped so that rendering never shifts offsets.

use std::cmp::Ordering;
use std::ops::Range;

use crate::dom::range::compare_boundaries;
use crate::dom::{Boundary, Document, NodeId};
use crate::render::NOTE_ICON_CLASS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextLeaf {
    pub node: NodeId,
    /// Char offset of the leaf within the combined text.
    pub start: usize,
    /// Length in chars.
    pub len: usize,
}

impl TextLeaf {
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// Which leaf to pick when an offset sits exactly between two leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    /// The leaf that starts at the offset.
    Start,
    /// The leaf that ends at the offset.
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextIndex {
    scope: NodeId,
    leaves: Vec<TextLeaf>,
    combined_text: String,
    /// Byte position of every char in `combined_text`, plus its total length.
    char_bytes: Vec<usize>,
    base_offset: usize,
}

impl TextIndex {
    pub fn build(doc: &Document, scope: NodeId) -> Self {
        let mut leaves = Vec::new();
        let mut combined_text = String::new();
        let mut offset = 0;

        let mut stack: Vec<NodeId> = doc.children(scope).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            if let Some(text) = doc.text(node) {
                let len = text.chars().count();
                leaves.push(TextLeaf {
                    node,
                    start: offset,
                    len,
                });
                combined_text.push_str(text);
                offset += len;
                continue;
            }
            if doc.has_class(node, NOTE_ICON_CLASS) {
                continue;
            }
            stack.extend(doc.children(node).iter().rev().copied());
        }

        let char_bytes = combined_text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(combined_text.len()))
            .collect();

        Self {
            scope,
            leaves,
            combined_text,
            char_bytes,
            base_offset: 0,
        }
    }

    pub fn scope(&self) -> NodeId {
        self.scope
    }

    pub fn leaves(&self) -> &[TextLeaf] {
        &self.leaves
    }

    pub fn combined_text(&self) -> &str {
        &self.combined_text
    }

    pub fn char_len(&self) -> usize {
        self.char_bytes.len() - 1
    }

    /// Where this index starts inside the scope it was narrowed from.
    pub fn base_offset(&self) -> usize {
        self.base_offset
    }

    pub fn offset_of(&self, node: NodeId) -> Option<usize> {
        self.leaves
            .iter()
            .find(|leaf| leaf.node == node)
            .map(|leaf| leaf.start)
    }

    /// Char offset of a boundary point. Points inside a leaf map directly;
    /// element points map to the first leaf at or after them.
    pub fn boundary_offset(&self, doc: &Document, boundary: Boundary) -> Option<usize> {
        if doc.is_text(boundary.node) {
            let leaf = self.leaves.iter().find(|leaf| leaf.node == boundary.node)?;
            return (boundary.offset <= leaf.len).then(|| leaf.start + boundary.offset);
        }
        let after = self.leaves.partition_point(|leaf| {
            compare_boundaries(doc, Boundary::new(leaf.node, 0), boundary) == Ordering::Less
        });
        Some(
            self.leaves
                .get(after)
                .map_or(self.char_len(), |leaf| leaf.start),
        )
    }

    /// Map a char offset back to a point inside a text leaf.
    pub fn locate(&self, offset: usize, affinity: Affinity) -> Option<Boundary> {
        if offset > self.char_len() || self.leaves.is_empty() {
            return None;
        }
        let index = match affinity {
            Affinity::Start => self
                .leaves
                .partition_point(|leaf| leaf.start <= offset)
                .checked_sub(1)?,
            Affinity::End => self
                .leaves
                .partition_point(|leaf| leaf.start < offset)
                .saturating_sub(1),
        };
        let leaf = self.leaves[index];
        let inner = offset.checked_sub(leaf.start)?;
        (inner <= leaf.len).then(|| Boundary::new(leaf.node, inner))
    }

    /// Text between two char offsets, clamped to the index.
    pub fn slice(&self, range: Range<usize>) -> &str {
        let end = range.end.min(self.char_len());
        let start = range.start.min(end);
        &self.combined_text[self.char_bytes[start]..self.char_bytes[end]]
    }

    /// Char offsets of every occurrence of `needle`, overlapping ones
    /// included.
    pub fn find_all(&self, needle: &str) -> Vec<usize> {
        let mut hits = Vec::new();
        if needle.is_empty() {
            return hits;
        }
        let mut from = 0;
        while let Some(found) = self.combined_text[from..].find(needle) {
            let byte = from + found;
            let char_offset = self.char_bytes.partition_point(|&b| b < byte);
            hits.push(char_offset);
            match self.char_bytes.get(char_offset + 1) {
                Some(&next) => from = next,
                None => break,
            }
        }
        hits
    }

    /// Index restricted to the subtree under `root`, remembering where that
    /// subtree starts in this index's coordinates.
    pub fn narrow(&self, doc: &Document, root: NodeId) -> Self {
        let mut narrowed = Self::build(doc, root);
        narrowed.base_offset = self.base_offset
            + self
                .boundary_offset(doc, Boundary::new(root, 0))
                .unwrap_or(0);
        narrowed
    }
}
