//! Drawing anchors into the page and taking them out again.
//!
//! A rendered anchor is a `<mark class="hn-highlight" data-id=…>` wrapping
//! the resolved range. When the range crosses element boundaries the page
//! structure is split around it, so one anchor can own several marker
//! pieces; every operation here treats all pieces with the same id as one
//! marker.

use std::collections::{BTreeSet, HashMap};

use highlight_notes_config::RenderConfig;

use crate::anchoring::{Anchor, HighlightId};
use crate::dom::{Document, DomRange, NodeId};
use crate::error::DomError;

pub const HIGHLIGHT_CLASS: &str = "hn-highlight";
pub const NOTE_ICON_CLASS: &str = "hn-note-icon";
pub const DISABLED_CLASS: &str = "hn-disabled";
const MARKER_TAG: &str = "mark";
const NOTE_ICON_TEXT: &str = " 📝";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    Click,
    Hover,
}

/// What the host should show in response to an interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionOutcome {
    ShowNote { preview: String },
    ShowToolbar { id: HighlightId },
}

#[derive(Debug, Clone)]
struct Handler {
    note: Option<String>,
}

#[derive(Debug)]
pub struct Renderer {
    preview_chars: usize,
    handlers: HashMap<HighlightId, Handler>,
}

impl Renderer {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            preview_chars: config.note_preview_chars,
            handlers: HashMap::new(),
        }
    }

    /// Wrap `range` in a marker for `anchor`. Skipped when a marker with the
    /// same id is already attached; the existing marker is returned.
    pub fn render(
        &mut self,
        doc: &mut Document,
        range: &DomRange,
        anchor: &Anchor,
    ) -> Result<NodeId, DomError> {
        if let Some(existing) = find_marker(doc, &anchor.id) {
            log::debug!("Marker for {} already present", anchor.id);
            return Ok(existing);
        }

        let marker = doc.create_element(MARKER_TAG);
        doc.set_attribute(marker, "class", HIGHLIGHT_CLASS);
        doc.set_attribute(marker, "data-id", anchor.id.as_str());
        apply_style(doc, marker, anchor);

        let mut range = *range;
        match range.surround_contents(doc, marker) {
            Ok(()) => {}
            Err(DomError::PartiallySelected) => {
                log::debug!("Range of {} crosses elements, extracting", anchor.id);
                let contents = range.extract_contents(doc)?;
                doc.append_child(marker, contents)?;
                range.insert_node(doc, marker)?;
            }
            Err(e) => return Err(e),
        }

        if let Some(note) = anchor.note() {
            append_note_icon(doc, marker)?;
            log::debug!("Note indicator added to {} ({} chars)", anchor.id, note.chars().count());
        }
        self.attach_handlers(anchor);
        Ok(marker)
    }

    /// Update color and note of every marker piece in place.
    pub fn restyle(&mut self, doc: &mut Document, anchor: &Anchor) -> Result<bool, DomError> {
        let pieces = marker_pieces(doc, &anchor.id);
        let Some(&last) = pieces.last() else {
            return Ok(false);
        };
        for &piece in &pieces {
            apply_style(doc, piece, anchor);
            remove_note_icons(doc, piece);
        }
        if anchor.note().is_some() {
            append_note_icon(doc, last)?;
        }
        self.attach_handlers(anchor);
        Ok(true)
    }

    /// Replace every marker piece for `id` by its children and drop its
    /// handlers. Returns whether anything was rendered.
    pub fn unrender(&mut self, doc: &mut Document, id: &HighlightId) -> Result<bool, DomError> {
        self.handlers.remove(id);
        let pieces = marker_pieces(doc, id);
        for &piece in &pieces {
            remove_note_icons(doc, piece);
            doc.unwrap_node(piece)?;
        }
        Ok(!pieces.is_empty())
    }

    /// Drop handlers whose markers are no longer attached to the document.
    pub fn forget_detached(&mut self, doc: &Document) {
        self.handlers.retain(|id, _| find_marker(doc, id).is_some());
    }

    fn attach_handlers(&mut self, anchor: &Anchor) {
        self.handlers.insert(
            anchor.id.clone(),
            Handler {
                note: anchor.note().map(str::to_string),
            },
        );
    }

    pub fn has_handlers(&self, id: &HighlightId) -> bool {
        self.handlers.contains_key(id)
    }

    pub fn interact(&self, id: &HighlightId, interaction: Interaction) -> Option<InteractionOutcome> {
        let handler = self.handlers.get(id)?;
        match interaction {
            Interaction::Click => handler.note.as_deref().map(|note| InteractionOutcome::ShowNote {
                preview: preview(note, self.preview_chars),
            }),
            Interaction::Hover => Some(InteractionOutcome::ShowToolbar { id: id.clone() }),
        }
    }
}

fn apply_style(doc: &mut Document, marker: NodeId, anchor: &Anchor) {
    doc.set_attribute(marker, "data-color", anchor.color.as_str());
    doc.set_attribute(marker, "style", format!("background: {}", anchor.color));
    match anchor.note() {
        Some(note) => doc.set_attribute(marker, "data-note", note),
        None => doc.remove_attribute(marker, "data-note"),
    }
}

fn append_note_icon(doc: &mut Document, marker: NodeId) -> Result<(), DomError> {
    let icon = doc.create_element("sup");
    doc.set_attribute(icon, "class", NOTE_ICON_CLASS);
    let text = doc.create_text(NOTE_ICON_TEXT);
    doc.append_child(icon, text)?;
    doc.append_child(marker, icon)
}

fn remove_note_icons(doc: &mut Document, marker: NodeId) {
    let icons: Vec<NodeId> = doc
        .element_children(marker)
        .into_iter()
        .filter(|&child| doc.has_class(child, NOTE_ICON_CLASS))
        .collect();
    for icon in icons {
        doc.remove(icon);
    }
}

fn is_marker(doc: &Document, node: NodeId) -> bool {
    doc.tag(node) == Some(MARKER_TAG) && doc.has_class(node, HIGHLIGHT_CLASS)
}

fn marker_pieces(doc: &Document, id: &HighlightId) -> Vec<NodeId> {
    doc.descendants(doc.root())
        .filter(|&node| is_marker(doc, node) && doc.attribute(node, "data-id") == Some(id.as_str()))
        .collect()
}

/// First attached marker for `id`.
pub fn find_marker(doc: &Document, id: &HighlightId) -> Option<NodeId> {
    doc.descendants(doc.root())
        .find(|&node| is_marker(doc, node) && doc.attribute(node, "data-id") == Some(id.as_str()))
}

/// Number of distinct anchors currently rendered under `scope`.
pub fn marker_count(doc: &Document, scope: NodeId) -> usize {
    doc.descendants(scope)
        .filter(|&node| is_marker(doc, node))
        .filter_map(|node| doc.attribute(node, "data-id"))
        .collect::<BTreeSet<_>>()
        .len()
}

/// Show or hide all highlights without touching the markers themselves.
pub fn set_visible(doc: &mut Document, visible: bool) {
    if let Some(element) = doc.document_element() {
        doc.toggle_class(element, DISABLED_CLASS, !visible);
    }
}

pub fn is_visible(doc: &Document) -> bool {
    doc.document_element()
        .is_none_or(|element| !doc.has_class(element, DISABLED_CLASS))
}

fn preview(note: &str, max_chars: usize) -> String {
    match note.char_indices().nth(max_chars) {
        Some((byte, _)) => format!("{}...", &note[..byte]),
        None => note.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchoring::TextIndex;
    use crate::dom::{Boundary, inner_html};
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;

    fn anchor(id: &str, note: Option<&str>) -> Anchor {
        Anchor {
            id: HighlightId::from(id),
            quote: String::new(),
            prefix: String::new(),
            suffix: String::new(),
            color: "#fff475".to_string(),
            note: note.map(str::to_string),
            start_offset: 0,
            end_offset: 0,
            structural_path: String::new(),
        }
    }

    fn text_node(doc: &Document, text: &str) -> NodeId {
        doc.descendants(doc.root())
            .find(|&n| doc.text(n) == Some(text))
            .unwrap()
    }

    fn renderer() -> Renderer {
        Renderer::new(&RenderConfig::default())
    }

    #[test]
    fn test_render_wraps_single_container() {
        let mut doc = Document::parse_html("<body><p>Hello world</p></body>");
        let t = text_node(&doc, "Hello world");
        let range = DomRange::new(Boundary::new(t, 6), Boundary::new(t, 11));

        renderer().render(&mut doc, &range, &anchor("a", None)).unwrap();

        assert_snapshot!(
            inner_html(&doc, doc.body()),
            @r##"<p>Hello <mark class="hn-highlight" data-id="a" data-color="#fff475" style="background: #fff475">world</mark></p>"##
        );
    }

    #[test]
    fn test_render_wraps_across_inline_elements() {
        let mut doc = Document::parse_html("<body><p>ab<b>cd</b>ef</p></body>");
        let ab = text_node(&doc, "ab");
        let ef = text_node(&doc, "ef");
        let range = DomRange::new(Boundary::new(ab, 1), Boundary::new(ef, 1));

        renderer().render(&mut doc, &range, &anchor("a", Some("n"))).unwrap();

        assert_snapshot!(
            inner_html(&doc, doc.body()),
            @r##"<p>a<mark class="hn-highlight" data-id="a" data-color="#fff475" style="background: #fff475" data-note="n">b<b>cd</b>e<sup class="hn-note-icon"> 📝</sup></mark>f</p>"##
        );
    }

    #[test]
    fn test_render_splits_partially_selected_blocks() {
        // Given a selection from the middle of one paragraph into the next
        let mut doc = Document::parse_html("<body><p>one two</p><p>three four</p></body>");
        let first = text_node(&doc, "one two");
        let second = text_node(&doc, "three four");
        let range = DomRange::new(Boundary::new(first, 4), Boundary::new(second, 5));

        // When rendering it
        renderer().render(&mut doc, &range, &anchor("a", None)).unwrap();

        // Then both paragraphs are split and the marker holds the middle
        assert_snapshot!(
            inner_html(&doc, doc.body()),
            @r##"<p>one </p><mark class="hn-highlight" data-id="a" data-color="#fff475" style="background: #fff475"><p>two</p><p>three</p></mark><p> four</p>"##
        );
        assert_eq!(doc.text_content(doc.body()), "one twothree four");
    }

    #[test]
    fn test_render_is_idempotent_per_id() {
        let mut doc = Document::parse_html("<body><p>Hello world</p></body>");
        let t = text_node(&doc, "Hello world");
        let range = DomRange::new(Boundary::new(t, 0), Boundary::new(t, 5));
        let mut renderer = renderer();

        let first = renderer.render(&mut doc, &range, &anchor("a", None)).unwrap();
        let second = renderer.render(&mut doc, &range, &anchor("a", None)).unwrap();

        assert_eq!(first, second);
        assert_eq!(marker_count(&doc, doc.body()), 1);
    }

    #[test]
    fn test_unrender_restores_text_and_drops_handlers() {
        // Given a rendered anchor with a note
        let mut doc = Document::parse_html("<body><p>one <i>two</i> three</p></body>");
        let before = TextIndex::build(&doc, doc.body()).combined_text().to_string();
        let one = text_node(&doc, "one ");
        let three = text_node(&doc, " three");
        let range = DomRange::new(Boundary::new(one, 2), Boundary::new(three, 3));
        let mut renderer = renderer();
        renderer.render(&mut doc, &range, &anchor("a", Some("note"))).unwrap();

        // When it is unrendered
        let removed = renderer.unrender(&mut doc, &HighlightId::from("a")).unwrap();

        // Then the flattened text is unchanged and nothing is left behind
        assert!(removed);
        assert_eq!(TextIndex::build(&doc, doc.body()).combined_text(), before);
        assert_eq!(doc.text_content(doc.body()), before);
        assert_eq!(marker_count(&doc, doc.body()), 0);
        assert!(!renderer.has_handlers(&HighlightId::from("a")));
    }

    #[test]
    fn test_unrender_unknown_id_is_noop() {
        let mut doc = Document::parse_html("<body><p>text</p></body>");
        let removed = renderer().unrender(&mut doc, &HighlightId::from("missing")).unwrap();
        assert!(!removed);
    }

    #[test]
    fn test_restyle_updates_color_and_note_indicator() {
        let mut doc = Document::parse_html("<body><p>word</p></body>");
        let t = text_node(&doc, "word");
        let range = DomRange::new(Boundary::new(t, 0), Boundary::new(t, 4));
        let mut renderer = renderer();
        let mut a = anchor("a", None);
        let marker = renderer.render(&mut doc, &range, &a).unwrap();

        a.color = "#a7ffeb".to_string();
        a.note = Some("added".to_string());
        renderer.restyle(&mut doc, &a).unwrap();
        renderer.restyle(&mut doc, &a).unwrap();

        assert_eq!(doc.attribute(marker, "data-color"), Some("#a7ffeb"));
        assert_eq!(doc.attribute(marker, "data-note"), Some("added"));
        assert_eq!(doc.text_content(marker), "word 📝");

        a.note = None;
        renderer.restyle(&mut doc, &a).unwrap();
        assert_eq!(doc.attribute(marker, "data-note"), None);
        assert_eq!(doc.text_content(marker), "word");
    }

    #[test]
    fn test_interactions() {
        let mut doc = Document::parse_html("<body><p>a b</p></body>");
        let t = text_node(&doc, "a b");
        let mut renderer = renderer();
        let long_note = "x".repeat(250);
        renderer
            .render(
                &mut doc,
                &DomRange::new(Boundary::new(t, 0), Boundary::new(t, 1)),
                &anchor("noted", Some(&long_note)),
            )
            .unwrap();
        let rest = doc.children(doc.children(doc.body())[0])[1];
        renderer
            .render(
                &mut doc,
                &DomRange::new(Boundary::new(rest, 1), Boundary::new(rest, 2)),
                &anchor("plain", None),
            )
            .unwrap();

        let noted = HighlightId::from("noted");
        let plain = HighlightId::from("plain");
        assert_eq!(
            renderer.interact(&noted, Interaction::Click),
            Some(InteractionOutcome::ShowNote {
                preview: format!("{}...", "x".repeat(200))
            })
        );
        assert_eq!(renderer.interact(&plain, Interaction::Click), None);
        assert_eq!(
            renderer.interact(&plain, Interaction::Hover),
            Some(InteractionOutcome::ShowToolbar { id: plain.clone() })
        );
        assert_eq!(marker_count(&doc, doc.body()), 2);
    }

    #[test]
    fn test_visibility_toggle_is_idempotent() {
        let mut doc = Document::parse_html("<html><body><p>x</p></body></html>");

        set_visible(&mut doc, false);
        set_visible(&mut doc, false);
        assert!(!is_visible(&doc));
        let html = doc.document_element().unwrap();
        assert_eq!(doc.attribute(html, "class"), Some("hn-disabled"));

        set_visible(&mut doc, true);
        assert!(is_visible(&doc));
        assert_eq!(doc.attribute(html, "class"), None);
    }

    #[test]
    fn test_preview_truncates_on_chars() {
        assert_eq!(preview("short", 200), "short");
        assert_eq!(preview("ééé", 2), "éé...");
    }
}
