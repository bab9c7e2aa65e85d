//! Live document ranges.
//!
//! A [`DomRange`] is a pair of boundary points. For character data the
//! offset counts chars into the node's text; for any other node it is a
//! child index. Ranges are plain values: they do not track later mutations,
//! so callers re-derive them (by resolution) after the tree changes.

use std::cmp::Ordering;

use super::{Document, NodeId};
use crate::error::DomError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary {
    pub node: NodeId,
    pub offset: usize,
}

impl Boundary {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomRange {
    pub start: Boundary,
    pub end: Boundary,
}

impl DomRange {
    pub fn new(start: Boundary, end: Boundary) -> Self {
        Self { start, end }
    }

    /// Range covering all of a node's contents.
    pub fn select_node_contents(doc: &Document, node: NodeId) -> Self {
        Self {
            start: Boundary::new(node, 0),
            end: Boundary::new(node, doc.node_length(node)),
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    fn collapse_to(&mut self, boundary: Boundary) {
        self.start = boundary;
        self.end = boundary;
    }

    /// Check both boundaries are in bounds and in order.
    pub fn validate(&self, doc: &Document) -> Result<(), DomError> {
        for boundary in [self.start, self.end] {
            let length = doc.node_length(boundary.node);
            if boundary.offset > length {
                return Err(DomError::IndexSize {
                    node: boundary.node,
                    offset: boundary.offset,
                    length,
                });
            }
        }
        if root_of(doc, self.start.node) != root_of(doc, self.end.node) {
            return Err(DomError::Disconnected);
        }
        if compare_boundaries(doc, self.start, self.end) == Ordering::Greater {
            return Err(DomError::IndexSize {
                node: self.end.node,
                offset: self.end.offset,
                length: doc.node_length(self.end.node),
            });
        }
        Ok(())
    }

    /// Deepest node containing both boundaries.
    pub fn common_ancestor(&self, doc: &Document) -> NodeId {
        std::iter::once(self.start.node)
            .chain(doc.ancestors(self.start.node))
            .find(|&candidate| doc.is_inclusive_ancestor(candidate, self.end.node))
            .unwrap_or_else(|| doc.root())
    }

    /// String content of the range: the selected part of every text node.
    pub fn text(&self, doc: &Document) -> String {
        if self.start.node == self.end.node {
            return match doc.text(self.start.node) {
                Some(text) => char_slice(text, self.start.offset, self.end.offset).to_string(),
                None => {
                    let children = doc.children(self.start.node);
                    let end = self.end.offset.min(children.len());
                    let start = self.start.offset.min(end);
                    children[start..end]
                        .iter()
                        .map(|&child| doc.text_content(child))
                        .collect()
                }
            };
        }

        let common = self.common_ancestor(doc);
        let mut out = String::new();
        for node in std::iter::once(common).chain(doc.descendants(common)) {
            let Some(text) = doc.text(node) else {
                continue;
            };
            if let Some((from, to)) = self.selected_chars(doc, node, text.chars().count()) {
                out.push_str(char_slice(text, from, to));
            }
        }
        out
    }

    /// The char span of a text node that lies inside the range, if any.
    fn selected_chars(&self, doc: &Document, node: NodeId, length: usize) -> Option<(usize, usize)> {
        let from = if node == self.start.node {
            self.start.offset
        } else if compare_boundaries(doc, Boundary::new(node, 0), self.start) != Ordering::Less {
            0
        } else {
            return None;
        };
        let to = if node == self.end.node {
            self.end.offset
        } else if compare_boundaries(doc, Boundary::new(node, length), self.end) != Ordering::Greater
        {
            length
        } else {
            return None;
        };
        (from < to).then_some((from, to))
    }

    /// Whether the range partially contains a node that is not character
    /// data, which makes a plain single-container wrap impossible.
    pub fn partially_selects_element(&self, doc: &Document) -> bool {
        let common = self.common_ancestor(doc);
        let start_chain = inclusive_ancestors_below(doc, self.start.node, common);
        let end_chain = inclusive_ancestors_below(doc, self.end.node, common);
        start_chain
            .iter()
            .filter(|n| !end_chain.contains(n))
            .chain(end_chain.iter().filter(|n| !start_chain.contains(n)))
            .any(|&n| !doc.is_character_data(n))
    }

    /// Wrap the range contents in `wrapper` (DOM `surroundContents`).
    ///
    /// Fails with [`DomError::PartiallySelected`] when the range crosses an
    /// element boundary; callers fall back to extract-and-insert.
    pub fn surround_contents(&mut self, doc: &mut Document, wrapper: NodeId) -> Result<(), DomError> {
        self.validate(doc)?;
        if self.partially_selects_element(doc) {
            return Err(DomError::PartiallySelected);
        }
        let fragment = self.extract_contents(doc)?;
        self.insert_node(doc, wrapper)?;
        doc.append_child(wrapper, fragment)?;
        *self = DomRange::select_node_contents(doc, wrapper);
        Ok(())
    }

    /// Move the range contents into a new fragment, splitting partially
    /// selected nodes. Afterwards the range is collapsed where the contents
    /// used to be.
    pub fn extract_contents(&mut self, doc: &mut Document) -> Result<NodeId, DomError> {
        self.validate(doc)?;
        let fragment = doc.create_fragment();
        if self.is_collapsed() {
            return Ok(fragment);
        }

        let Boundary {
            node: start_node,
            offset: start_offset,
        } = self.start;
        let Boundary {
            node: end_node,
            offset: end_offset,
        } = self.end;

        if start_node == end_node && doc.is_character_data(start_node) {
            let clone = doc.clone_shallow(start_node);
            let data = doc.text_content(start_node);
            doc.set_text(clone, char_slice(&data, start_offset, end_offset))?;
            doc.append_child(fragment, clone)?;
            doc.delete_data(start_node, start_offset, end_offset)?;
            self.collapse_to(self.start);
            return Ok(fragment);
        }

        let common = self.common_ancestor(doc);
        let first_partial = if doc.is_inclusive_ancestor(start_node, end_node) {
            None
        } else {
            child_containing(doc, common, start_node)
        };
        let last_partial = if doc.is_inclusive_ancestor(end_node, start_node) {
            None
        } else {
            child_containing(doc, common, end_node)
        };

        let contained: Vec<NodeId> = doc
            .children(common)
            .iter()
            .copied()
            .enumerate()
            .filter(|&(index, _)| {
                compare_boundaries(doc, Boundary::new(common, index), self.start) != Ordering::Less
                    && compare_boundaries(doc, Boundary::new(common, index + 1), self.end)
                        != Ordering::Greater
            })
            .map(|(_, child)| child)
            .collect();

        let new_position = if doc.is_inclusive_ancestor(start_node, end_node) {
            self.start
        } else {
            let mut reference = start_node;
            while let Some(parent) = doc.parent(reference) {
                if doc.is_inclusive_ancestor(parent, end_node) {
                    break;
                }
                reference = parent;
            }
            let parent = doc.parent(reference).ok_or(DomError::NoParent(reference))?;
            let index = doc.index_in_parent(reference).ok_or(DomError::NoParent(reference))?;
            Boundary::new(parent, index + 1)
        };

        if let Some(first) = first_partial {
            if doc.is_character_data(first) {
                let data = doc.text_content(first);
                let length = data.chars().count();
                if start_offset < length {
                    let clone = doc.clone_shallow(first);
                    doc.set_text(clone, char_slice(&data, start_offset, length))?;
                    doc.append_child(fragment, clone)?;
                    doc.delete_data(first, start_offset, length)?;
                }
            } else {
                let clone = doc.clone_shallow(first);
                doc.append_child(fragment, clone)?;
                let mut sub = DomRange::new(self.start, Boundary::new(first, doc.node_length(first)));
                let sub_fragment = sub.extract_contents(doc)?;
                doc.append_child(clone, sub_fragment)?;
            }
        }

        for child in contained {
            doc.append_child(fragment, child)?;
        }

        if let Some(last) = last_partial {
            if doc.is_character_data(last) {
                if end_offset > 0 {
                    let data = doc.text_content(last);
                    let clone = doc.clone_shallow(last);
                    doc.set_text(clone, char_slice(&data, 0, end_offset))?;
                    doc.append_child(fragment, clone)?;
                    doc.delete_data(last, 0, end_offset)?;
                }
            } else {
                let clone = doc.clone_shallow(last);
                doc.append_child(fragment, clone)?;
                let mut sub = DomRange::new(Boundary::new(last, 0), self.end);
                let sub_fragment = sub.extract_contents(doc)?;
                doc.append_child(clone, sub_fragment)?;
            }
        }

        self.collapse_to(new_position);
        Ok(fragment)
    }

    /// Insert `node` at the start of the range (DOM `insertNode`). A text
    /// start container is split so the node lands exactly at the offset.
    pub fn insert_node(&self, doc: &mut Document, node: NodeId) -> Result<(), DomError> {
        let Boundary { node: container, offset } = self.start;
        if doc.is_text(container) {
            let parent = doc.parent(container).ok_or(DomError::NoParent(container))?;
            let length = doc.node_length(container);
            let reference = if offset == 0 {
                Some(container)
            } else if offset >= length {
                let index = doc.index_in_parent(container).ok_or(DomError::NoParent(container))?;
                doc.children(parent).get(index + 1).copied()
            } else {
                Some(doc.split_text(container, offset)?)
            };
            return doc.insert_before(parent, node, reference);
        }
        let reference = doc.children(container).get(offset).copied();
        doc.insert_before(container, node, reference)
    }
}

/// Order two boundary points in tree order. Points in different trees
/// compare by their position relative to their own roots.
pub fn compare_boundaries(doc: &Document, a: Boundary, b: Boundary) -> Ordering {
    boundary_key(doc, a).cmp(&boundary_key(doc, b))
}

/// Child-index path from the root down to the node, followed by the offset.
/// Lexicographic order of these keys is document order of the points.
fn boundary_key(doc: &Document, boundary: Boundary) -> Vec<usize> {
    let mut key = vec![boundary.offset];
    let mut node = boundary.node;
    while let Some(index) = doc.index_in_parent(node) {
        key.push(index);
        match doc.parent(node) {
            Some(parent) => node = parent,
            None => break,
        }
    }
    key.reverse();
    key
}

fn root_of(doc: &Document, node: NodeId) -> NodeId {
    doc.ancestors(node).last().unwrap_or(node)
}

/// The child of `ancestor` that contains `node`.
fn child_containing(doc: &Document, ancestor: NodeId, node: NodeId) -> Option<NodeId> {
    std::iter::once(node)
        .chain(doc.ancestors(node))
        .find(|&n| doc.parent(n) == Some(ancestor))
}

fn inclusive_ancestors_below(doc: &Document, node: NodeId, stop: NodeId) -> Vec<NodeId> {
    std::iter::once(node)
        .chain(doc.ancestors(node))
        .take_while(|&n| n != stop)
        .collect()
}

/// Slice a string by char offsets, clamping to its length.
pub(crate) fn char_slice(text: &str, start: usize, end: usize) -> &str {
    let byte_at = |offset: usize| {
        text.char_indices()
            .nth(offset)
            .map(|(i, _)| i)
            .unwrap_or(text.len())
    };
    let start = byte_at(start);
    let end = byte_at(end).max(start);
    &text[start..end]
}
