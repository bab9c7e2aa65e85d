//! # Page DOM Model
//!
//! An arena-backed document tree standing in for the browser DOM. Nodes are
//! addressed by copyable [`NodeId`]s and are never freed while the document
//! lives; removing a node only detaches it, exactly like a script holding a
//! reference to a removed element.
//!
//! Text offsets everywhere in this module are counted in `char`s.
//!
//! Every structural or textual change is appended to a mutation log, the
//! equivalent of a `MutationObserver` record queue. The reconciliation
//! scheduler drains it with [`Document::take_mutations`].

pub mod html;
pub mod range;
pub mod selector;

pub use html::{DomSink, inner_html, to_html};
pub use range::{Boundary, DomRange};
pub use selector::StructuralPath;

use crate::error::DomError;

/// Handle to a node inside a [`Document`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Document,
    Element(Element),
    Text(String),
    Comment(String),
    /// Detached container returned by range extraction. Inserting a fragment
    /// moves its children instead of the fragment itself.
    Fragment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    ChildList,
    CharacterData,
    Attributes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationRecord {
    pub kind: MutationKind,
    pub target: NodeId,
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    mutations: Vec<MutationRecord>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                data: NodeData::Document,
                parent: None,
                children: Vec::new(),
            }],
            mutations: Vec::new(),
        }
    }

    /// Build a document from HTML markup.
    pub fn parse_html(markup: &str) -> Self {
        let mut doc = Self::new();
        let root = doc.root();
        DomSink::new(&mut doc, root).feed(highlight_notes_markup::parse(markup));
        doc.mutations.clear();
        doc
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// The first element child of the root (normally `<html>`).
    pub fn document_element(&self) -> Option<NodeId> {
        self.element_children(self.root()).into_iter().next()
    }

    /// The `<body>` element, or the root for fragments without one.
    pub fn body(&self) -> NodeId {
        self.descendants(self.root())
            .find(|&id| self.tag(id) == Some("body"))
            .unwrap_or_else(|| self.root())
    }

    // Node creation

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeData::Element(Element {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
        }))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeData::Text(text.into()))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeData::Comment(text.into()))
    }

    pub fn create_fragment(&mut self) -> NodeId {
        self.push(NodeData::Fragment)
    }

    /// Copy a node without its children.
    pub fn clone_shallow(&mut self, id: NodeId) -> NodeId {
        let data = self.nodes[id.0].data.clone();
        let data = match data {
            NodeData::Document => NodeData::Fragment,
            other => other,
        };
        self.push(data)
    }

    // Node inspection

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0].data
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].data, NodeData::Text(_))
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].data, NodeData::Element(_))
    }

    /// Text and comment nodes hold character data; their offsets index chars.
    pub fn is_character_data(&self, id: NodeId) -> bool {
        matches!(
            self.nodes[id.0].data,
            NodeData::Text(_) | NodeData::Comment(_)
        )
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].data {
            NodeData::Element(element) => Some(element.tag.as_str()),
            _ => None,
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].data {
            NodeData::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    fn character_data(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].data {
            NodeData::Text(text) | NodeData::Comment(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// DOM node length: chars for character data, child count otherwise.
    pub fn node_length(&self, id: NodeId) -> usize {
        match self.character_data(id) {
            Some(text) => text.chars().count(),
            None => self.nodes[id.0].children.len(),
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&child| self.is_element(child))
            .collect()
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&child| child == id)
    }

    /// Ancestors from the parent upwards.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&node| self.parent(node))
    }

    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        node == ancestor || self.ancestors(node).any(|a| a == ancestor)
    }

    /// Descendants of `root` in document (pre-)order, excluding `root`.
    pub fn descendants(&self, root: NodeId) -> Descendants<'_> {
        Descendants {
            doc: self,
            stack: self.children(root).iter().rev().copied().collect(),
        }
    }

    /// Concatenated text of every text node under `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(text) = self.character_data(id) {
            return text.to_string();
        }
        self.descendants(id)
            .filter_map(|node| self.text(node))
            .collect()
    }

    /// Whether the node is attached to this document's root.
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.is_inclusive_ancestor(self.root(), id)
    }

    // Attributes

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[id.0].data {
            NodeData::Element(element) => element
                .attributes
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let NodeData::Element(element) = &mut self.nodes[id.0].data {
            match element.attributes.iter_mut().find(|(key, _)| key == name) {
                Some((_, existing)) => *existing = value,
                None => element.attributes.push((name.to_string(), value)),
            }
            self.record(MutationKind::Attributes, id);
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
        if let NodeData::Element(element) = &mut self.nodes[id.0].data {
            let before = element.attributes.len();
            element.attributes.retain(|(key, _)| key != name);
            if element.attributes.len() != before {
                self.record(MutationKind::Attributes, id);
            }
        }
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attribute(id, "class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    /// Add or remove a class; repeated calls with the same state are no-ops.
    pub fn toggle_class(&mut self, id: NodeId, class: &str, present: bool) {
        if self.has_class(id, class) == present {
            return;
        }
        let mut classes: Vec<String> = self
            .attribute(id, "class")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        if present {
            classes.push(class.to_string());
        } else {
            classes.retain(|c| c != class);
        }
        if classes.is_empty() {
            self.remove_attribute(id, "class");
        } else {
            self.set_attribute(id, "class", classes.join(" "));
        }
    }

    pub fn find_by_id(&self, scope: NodeId, element_id: &str) -> Option<NodeId> {
        self.descendants(scope)
            .find(|&node| self.attribute(node, "id") == Some(element_id))
    }

    // Tree mutation

    fn record(&mut self, kind: MutationKind, target: NodeId) {
        self.mutations.push(MutationRecord { kind, target });
    }

    /// Drain the pending mutation records.
    pub fn take_mutations(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.mutations)
    }

    pub fn has_pending_mutations(&self) -> bool {
        !self.mutations.is_empty()
    }

    /// Detach a node from its parent. Detached nodes keep their subtree.
    pub fn remove(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&child| child != id);
            self.record(MutationKind::ChildList, parent);
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let index = self.children(parent).len();
        self.insert_at(parent, index, child)
    }

    /// Insert `child` before `reference`, or append when `reference` is None.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        let index = match reference {
            Some(reference) => self
                .children(parent)
                .iter()
                .position(|&c| c == reference)
                .ok_or(DomError::NoParent(reference))?,
            None => self.children(parent).len(),
        };
        self.insert_at(parent, index, child)
    }

    /// Insert at a child index. Fragments are unpacked into their children.
    pub fn insert_at(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<(), DomError> {
        if matches!(self.nodes[child.0].data, NodeData::Fragment) {
            let moved = std::mem::take(&mut self.nodes[child.0].children);
            let mut at = index.min(self.children(parent).len());
            for node in moved {
                self.nodes[node.0].parent = None;
                self.insert_at(parent, at, node)?;
                at += 1;
            }
            self.record(MutationKind::ChildList, child);
            return Ok(());
        }

        if self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::HierarchyRequest { parent, child });
        }

        let mut index = index;
        if self.nodes[child.0].parent == Some(parent)
            && let Some(current) = self.index_in_parent(child)
            && current < index
        {
            index -= 1;
        }
        self.remove(child);

        let index = index.min(self.children(parent).len());
        self.nodes[parent.0].children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
        self.record(MutationKind::ChildList, parent);
        Ok(())
    }

    /// Replace all children of `parent` with `children`.
    pub fn replace_children(&mut self, parent: NodeId, children: Vec<NodeId>) -> Result<(), DomError> {
        let old: Vec<NodeId> = self.children(parent).to_vec();
        for child in old {
            self.remove(child);
        }
        for child in children {
            self.append_child(parent, child)?;
        }
        Ok(())
    }

    /// Replace `node` by its own children, in place.
    pub fn unwrap_node(&mut self, node: NodeId) -> Result<(), DomError> {
        let parent = self.parent(node).ok_or(DomError::NoParent(node))?;
        let mut at = self.index_in_parent(node).ok_or(DomError::NoParent(node))?;
        let children: Vec<NodeId> = self.children(node).to_vec();
        for child in children {
            self.insert_at(parent, at, child)?;
            at += 1;
        }
        self.remove(node);
        Ok(())
    }

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) -> Result<(), DomError> {
        match &mut self.nodes[id.0].data {
            NodeData::Text(data) | NodeData::Comment(data) => {
                *data = text.into();
                self.record(MutationKind::CharacterData, id);
                Ok(())
            }
            _ => Err(DomError::NotText(id)),
        }
    }

    /// Remove the chars in `start..end` from a character-data node.
    pub fn delete_data(&mut self, id: NodeId, start: usize, end: usize) -> Result<(), DomError> {
        let data = self.character_data(id).ok_or(DomError::NotText(id))?;
        let length = data.chars().count();
        if start > end || end > length {
            return Err(DomError::IndexSize {
                node: id,
                offset: end,
                length,
            });
        }
        let kept: String = data
            .chars()
            .take(start)
            .chain(data.chars().skip(end))
            .collect();
        self.set_text(id, kept)
    }

    /// Split a text node at `offset`; the tail moves to a new sibling which
    /// is returned.
    pub fn split_text(&mut self, id: NodeId, offset: usize) -> Result<NodeId, DomError> {
        let data = self.text(id).ok_or(DomError::NotText(id))?;
        let length = data.chars().count();
        if offset > length {
            return Err(DomError::IndexSize {
                node: id,
                offset,
                length,
            });
        }
        let head: String = data.chars().take(offset).collect();
        let tail: String = data.chars().skip(offset).collect();

        let new_node = self.create_text(tail);
        if let Some(parent) = self.parent(id) {
            let index = self.index_in_parent(id).ok_or(DomError::NoParent(id))?;
            self.insert_at(parent, index + 1, new_node)?;
        }
        self.set_text(id, head)?;
        Ok(new_node)
    }
}

/// Pre-order iterator over a subtree.
pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let node = self.stack.pop()?;
        self.stack
            .extend(self.doc.children(node).iter().rev().copied());
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn paragraph(doc: &mut Document, text: &str) -> (NodeId, NodeId) {
        let p = doc.create_element("p");
        let t = doc.create_text(text);
        doc.append_child(p, t).unwrap();
        let body = doc.body();
        doc.append_child(body, p).unwrap();
        (p, t)
    }

    #[test]
    fn test_body_falls_back_to_root() {
        let doc = Document::new();
        assert_eq!(doc.body(), doc.root());
    }

    #[test]
    fn test_parse_html_finds_body_and_clears_mutations() {
        let doc = Document::parse_html("<html><body><p>Hi</p></body></html>");
        assert_eq!(doc.tag(doc.body()), Some("body"));
        assert_eq!(doc.text_content(doc.body()), "Hi");
        assert!(!doc.has_pending_mutations());
    }

    #[test]
    fn test_descendants_are_pre_order() {
        let doc = Document::parse_html("<div><p>a<b>b</b></p><p>c</p></div>");
        let texts: Vec<&str> = doc
            .descendants(doc.root())
            .filter_map(|n| doc.text(n))
            .collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_split_text_counts_chars_not_bytes() {
        let mut doc = Document::new();
        let (p, t) = paragraph(&mut doc, "héllo wörld");

        let tail = doc.split_text(t, 6).unwrap();

        assert_eq!(doc.text(t), Some("héllo "));
        assert_eq!(doc.text(tail), Some("wörld"));
        assert_eq!(doc.children(p), &[t, tail]);
    }

    #[test]
    fn test_split_text_out_of_bounds() {
        let mut doc = Document::new();
        let (_, t) = paragraph(&mut doc, "abc");
        assert_eq!(
            doc.split_text(t, 4),
            Err(DomError::IndexSize {
                node: t,
                offset: 4,
                length: 3
            })
        );
    }

    #[test]
    fn test_insert_fragment_moves_children() {
        let mut doc = Document::new();
        let (p, t) = paragraph(&mut doc, "end");
        let fragment = doc.create_fragment();
        let a = doc.create_text("a");
        let b = doc.create_text("b");
        doc.append_child(fragment, a).unwrap();
        doc.append_child(fragment, b).unwrap();

        doc.insert_before(p, fragment, Some(t)).unwrap();

        assert_eq!(doc.children(p), &[a, b, t]);
        assert!(doc.children(fragment).is_empty());
        assert_eq!(doc.parent(a), Some(p));
    }

    #[test]
    fn test_insert_into_descendant_is_rejected() {
        let mut doc = Document::new();
        let (p, _) = paragraph(&mut doc, "x");
        let span = doc.create_element("span");
        doc.append_child(p, span).unwrap();

        let result = doc.append_child(span, p);

        assert_eq!(result, Err(DomError::HierarchyRequest { parent: span, child: p }));
    }

    #[test]
    fn test_reinserting_within_same_parent_moves_node() {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        let a = doc.create_text("a");
        let b = doc.create_text("b");
        let c = doc.create_text("c");
        for n in [a, b, c] {
            doc.append_child(div, n).unwrap();
        }

        doc.insert_at(div, 3, a).unwrap();

        assert_eq!(doc.children(div), &[b, c, a]);
    }

    #[test]
    fn test_unwrap_node_keeps_children_in_place() {
        let mut doc = Document::parse_html("<p>a<span>b<i>c</i></span>d</p>");
        let span = doc
            .descendants(doc.root())
            .find(|&n| doc.tag(n) == Some("span"))
            .unwrap();
        let p = doc.parent(span).unwrap();

        doc.unwrap_node(span).unwrap();

        assert_eq!(to_html(&doc, p), "<p>ab<i>c</i>d</p>");
        assert_eq!(doc.parent(span), None);
    }

    #[test]
    fn test_mutations_are_recorded_and_drained() {
        let mut doc = Document::new();
        let (p, t) = paragraph(&mut doc, "abc");
        doc.take_mutations();

        doc.split_text(t, 1).unwrap();
        doc.set_attribute(p, "class", "x");
        let records = doc.take_mutations();

        assert_eq!(
            records.iter().map(|r| r.kind).collect::<Vec<_>>(),
            vec![
                MutationKind::ChildList,
                MutationKind::CharacterData,
                MutationKind::Attributes
            ]
        );
        assert!(!doc.has_pending_mutations());
    }

    #[test]
    fn test_toggle_class_is_idempotent() {
        let mut doc = Document::parse_html("<html class=\"js\"></html>");
        let html = doc.document_element().unwrap();

        doc.toggle_class(html, "hn-disabled", true);
        doc.toggle_class(html, "hn-disabled", true);
        assert_eq!(doc.attribute(html, "class"), Some("js hn-disabled"));

        doc.toggle_class(html, "hn-disabled", false);
        assert_eq!(doc.attribute(html, "class"), Some("js"));
    }

    #[test]
    fn test_delete_data_removes_char_span() {
        let mut doc = Document::new();
        let (_, t) = paragraph(&mut doc, "abcdef");
        doc.delete_data(t, 1, 3).unwrap();
        assert_eq!(doc.text(t), Some("adef"));
    }
}
