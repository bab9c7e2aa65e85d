use highlight_notes_config::AnchoringConfig;

use super::anchor::{Anchor, HighlightId};
use super::index::TextIndex;
use crate::dom::{Document, DomRange, NodeId, StructuralPath};

/// Describe a live selection as an [`Anchor`].
///
/// Returns `None` for collapsed or whitespace-only selections and for ranges
/// that do not lie inside `scope`.
pub fn build_anchor(
    doc: &Document,
    scope: NodeId,
    range: &DomRange,
    color: &str,
    note: Option<&str>,
    config: &AnchoringConfig,
) -> Option<Anchor> {
    if range.is_collapsed() || range.validate(doc).is_err() {
        return None;
    }
    if !doc.is_inclusive_ancestor(scope, range.start.node)
        || !doc.is_inclusive_ancestor(scope, range.end.node)
    {
        log::debug!("Selection is outside the anchoring scope");
        return None;
    }

    let index = TextIndex::build(doc, scope);
    let raw_start = index.boundary_offset(doc, range.start)?;
    let raw_end = index.boundary_offset(doc, range.end)?;
    if raw_end <= raw_start {
        return None;
    }

    let raw = index.slice(raw_start..raw_end);
    let quote = raw.trim();
    if quote.is_empty() {
        return None;
    }
    let leading = raw.chars().count() - raw.trim_start().chars().count();
    let trailing = raw.chars().count() - raw.trim_end().chars().count();
    let start_offset = raw_start + leading;
    let end_offset = raw_end - trailing;

    let context = config.context_chars;
    let prefix = index.slice(start_offset.saturating_sub(context)..start_offset);
    let suffix = index.slice(end_offset..end_offset + context);

    let anchor = Anchor {
        id: HighlightId::generate(),
        quote: quote.to_string(),
        prefix: prefix.to_string(),
        suffix: suffix.to_string(),
        color: color.to_string(),
        note: note.filter(|n| !n.is_empty()).map(str::to_string),
        start_offset,
        end_offset,
        structural_path: StructuralPath::describe(doc, scope, range.start.node),
    };
    log::debug!(
        "Built anchor {}: {:?} + [{}] + {:?} at {}..{} ({})",
        anchor.id,
        anchor.prefix,
        anchor.quote,
        anchor.suffix,
        anchor.start_offset,
        anchor.end_offset,
        anchor.structural_path
    );
    Some(anchor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Boundary;
    use pretty_assertions::assert_eq;

    fn text_node(doc: &Document, text: &str) -> NodeId {
        doc.descendants(doc.root())
            .find(|&n| doc.text(n) == Some(text))
            .unwrap()
    }

    fn span(doc: &Document, text: &str, start: usize, end: usize) -> DomRange {
        let node = text_node(doc, text);
        DomRange::new(Boundary::new(node, start), Boundary::new(node, end))
    }

    #[test]
    fn test_builds_quote_context_and_offsets() {
        let doc = Document::parse_html("<body><p>The quick brown fox jumps</p></body>");
        let range = span(&doc, "The quick brown fox jumps", 10, 15);

        let anchor = build_anchor(&doc, doc.body(), &range, "#fff475", None, &Default::default())
            .unwrap();

        assert_eq!(anchor.quote, "brown");
        assert_eq!(anchor.prefix, "The quick ");
        assert_eq!(anchor.suffix, " fox jumps");
        assert_eq!((anchor.start_offset, anchor.end_offset), (10, 15));
        assert_eq!(anchor.structural_path, "p:nth-child(1)");
        assert_eq!(anchor.note, None);
    }

    #[test]
    fn test_trimmed_whitespace_moves_offsets() {
        let doc = Document::parse_html("<body><p>one  two  three</p></body>");
        let range = span(&doc, "one  two  three", 3, 10);

        let anchor = build_anchor(&doc, doc.body(), &range, "#fff475", None, &Default::default())
            .unwrap();

        assert_eq!(anchor.quote, "two");
        assert_eq!((anchor.start_offset, anchor.end_offset), (5, 8));
        assert_eq!(anchor.prefix, "one  ");
        assert_eq!(anchor.suffix, "  three");
    }

    #[test]
    fn test_context_is_clipped_at_scope_edges() {
        // Given a selection covering the whole scope text
        let doc = Document::parse_html("<body><p>edge</p></body>");
        let range = span(&doc, "edge", 0, 4);

        // When building the anchor
        let anchor = build_anchor(&doc, doc.body(), &range, "#fff475", None, &Default::default())
            .unwrap();

        // Then both context strings are empty rather than an error
        assert_eq!(anchor.prefix, "");
        assert_eq!(anchor.suffix, "");
    }

    #[test]
    fn test_context_walks_across_leaves() {
        let doc = Document::parse_html(
            "<body><p>alpha</p><p>beta <b>gamma</b> delta</p><p>epsilon</p></body>",
        );
        let range = span(&doc, "gamma", 0, 5);
        let config = AnchoringConfig {
            context_chars: 8,
            ..Default::default()
        };

        let anchor = build_anchor(&doc, doc.body(), &range, "#fff475", None, &config).unwrap();

        assert_eq!(anchor.prefix, "phabeta ");
        assert_eq!(anchor.suffix, " deltaep");
        assert_eq!(anchor.structural_path, "p:nth-child(2) > b:nth-child(1)");
    }

    #[test]
    fn test_rejects_collapsed_and_blank_selections() {
        let doc = Document::parse_html("<body><p>a   b</p></body>");
        let collapsed = span(&doc, "a   b", 1, 1);
        let blank = span(&doc, "a   b", 1, 4);

        assert_eq!(
            build_anchor(&doc, doc.body(), &collapsed, "c", None, &Default::default()),
            None
        );
        assert_eq!(
            build_anchor(&doc, doc.body(), &blank, "c", None, &Default::default()),
            None
        );
    }

    #[test]
    fn test_empty_note_is_dropped() {
        let doc = Document::parse_html("<body><p>word</p></body>");
        let range = span(&doc, "word", 0, 4);

        let with_empty = build_anchor(&doc, doc.body(), &range, "c", Some(""), &Default::default())
            .unwrap();
        let with_note = build_anchor(&doc, doc.body(), &range, "c", Some("hi"), &Default::default())
            .unwrap();

        assert_eq!(with_empty.note, None);
        assert_eq!(with_note.note.as_deref(), Some("hi"));
    }
}
