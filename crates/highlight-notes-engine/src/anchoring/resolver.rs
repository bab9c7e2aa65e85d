use highlight_notes_config::AnchoringConfig;

use super::anchor::Anchor;
use super::index::{Affinity, TextIndex};
use crate::dom::{Document, DomRange, NodeId, StructuralPath};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundReason {
    EmptyQuote,
    /// The quote does not occur anywhere in the scope.
    QuoteMissing,
    /// The chosen span could not be mapped back onto text nodes.
    Unmappable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub range: DomRange,
    /// Where the match starts, in full-scope coordinates.
    pub start_offset: usize,
    /// Whether the surrounding text matched the stored context.
    pub verified: bool,
    /// Number of raw occurrences considered.
    pub candidates: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Found(Resolution),
    NotFound(NotFoundReason),
}

impl Resolved {
    pub fn found(self) -> Option<Resolution> {
        match self {
            Resolved::Found(resolution) => Some(resolution),
            Resolved::NotFound(_) => None,
        }
    }
}

struct Choice {
    offset: usize,
    verified: bool,
    candidates: usize,
}

/// Locate `anchor` in the current state of `scope`.
///
/// Never fails for a well-formed anchor: misses are reported as
/// [`Resolved::NotFound`] and the caller decides when to retry.
pub fn resolve(
    doc: &Document,
    scope: NodeId,
    anchor: &Anchor,
    config: &AnchoringConfig,
) -> Resolved {
    if anchor.quote.is_empty() {
        return Resolved::NotFound(NotFoundReason::EmptyQuote);
    }

    let full = TextIndex::build(doc, scope);
    let narrowed = narrowed_root(doc, scope, anchor).map(|root| full.narrow(doc, root));

    let (index, choice) = match narrowed
        .as_ref()
        .and_then(|index| choose(index, anchor, config).map(|choice| (index, choice)))
    {
        Some(hit) => hit,
        None => match choose(&full, anchor, config) {
            Some(choice) => (&full, choice),
            None => {
                log::debug!("Quote of {} not found in scope", anchor.id);
                return Resolved::NotFound(NotFoundReason::QuoteMissing);
            }
        },
    };

    let quote_len = anchor.quote.chars().count();
    let start = index.locate(choice.offset, Affinity::Start);
    let end = index.locate(choice.offset + quote_len, Affinity::End);
    let (Some(start), Some(end)) = (start, end) else {
        log::debug!("Could not map {} back onto text nodes", anchor.id);
        return Resolved::NotFound(NotFoundReason::Unmappable);
    };

    Resolved::Found(Resolution {
        range: DomRange::new(start, end),
        start_offset: index.base_offset() + choice.offset,
        verified: choice.verified,
        candidates: choice.candidates,
    })
}

/// Element named by the anchor's structural path, when it still exists.
fn narrowed_root(doc: &Document, scope: NodeId, anchor: &Anchor) -> Option<NodeId> {
    if anchor.structural_path.is_empty() {
        return None;
    }
    let path = match StructuralPath::parse(&anchor.structural_path) {
        Ok(path) => path,
        Err(e) => {
            log::debug!("Ignoring structural path of {}: {e}", anchor.id);
            return None;
        }
    };
    path.select(doc, scope).filter(|&root| root != scope)
}

fn choose(index: &TextIndex, anchor: &Anchor, config: &AnchoringConfig) -> Option<Choice> {
    let occurrences = index.find_all(&anchor.quote);
    let first = *occurrences.first()?;

    let quote_len = anchor.quote.chars().count();
    let prefix_tail = tail_chars(&anchor.prefix, config.match_len);
    let suffix_head = head_chars(&anchor.suffix, config.match_len);

    let verified: Vec<usize> = occurrences
        .iter()
        .copied()
        .filter(|&at| {
            let before = index.slice(at.saturating_sub(config.match_window)..at);
            let after_start = at + quote_len;
            let after = index.slice(after_start..after_start + config.match_window);
            before.ends_with(prefix_tail) && after.starts_with(suffix_head)
        })
        .collect();

    // Stored offsets are in full-scope coordinates.
    let distance = |at: usize| (index.base_offset() + at).abs_diff(anchor.start_offset);
    let (offset, is_verified) = match verified.as_slice() {
        [] => (first, false),
        [only] => (*only, true),
        many => (
            many.iter().copied().min_by_key(|&at| distance(at)).unwrap_or(first),
            true,
        ),
    };

    Some(Choice {
        offset,
        verified: is_verified,
        candidates: occurrences.len(),
    })
}

fn tail_chars(text: &str, n: usize) -> &str {
    let skip = text.chars().count().saturating_sub(n);
    text.char_indices()
        .nth(skip)
        .map_or("", |(byte, _)| &text[byte..])
}

fn head_chars(text: &str, n: usize) -> &str {
    text.char_indices()
        .nth(n)
        .map_or(text, |(byte, _)| &text[..byte])
}
