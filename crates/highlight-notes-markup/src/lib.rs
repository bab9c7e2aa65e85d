//! # highlight-notes-markup
//!
//! Turns HTML-like page markup into a flat, balanced stream of [`Event`]s.
//!
//! ```text
//! Source Text → Lexer → Tokens → Parser → Events → (engine DOM sink)
//!               (Logos)
//! ```
//!
//! The crate deliberately stops at events: building nodes is left to the
//! consumer, which in this workspace is the engine's arena DOM.
//!
//! This is not a conforming HTML5 parser. It handles what page snapshots
//! need for text anchoring: nesting, attributes, entities, comments, void
//! elements, raw-text elements and the common implicit closes.
//!
//! ## Quick Start
//!
//! ```
//! use highlight_notes_markup::{parse, Event};
//!
//! let events = parse("<p>Hello</p>");
//! assert_eq!(events[1], Event::Text("Hello".to_string()));
//! ```

pub mod lexer;
pub mod parser;

pub use parser::event::{Attribute, Event};
pub use parser::{is_void_element, parse};

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;

    fn format_events(events: &[Event]) -> String {
        let mut out = String::new();
        let mut depth = 0usize;
        for event in events {
            match event {
                Event::Start {
                    tag,
                    attributes,
                    void,
                } => {
                    let mut line = format!("{}{tag}", "  ".repeat(depth));
                    for (k, v) in attributes {
                        line.push_str(&format!(" {k}={v:?}"));
                    }
                    out.push_str(&line);
                    out.push('\n');
                    if !void {
                        depth += 1;
                    }
                }
                Event::End { .. } => depth = depth.saturating_sub(1),
                Event::Text(t) => out.push_str(&format!("{}{t:?}\n", "  ".repeat(depth))),
                Event::Comment(c) => out.push_str(&format!("{}<!--{c}-->\n", "  ".repeat(depth))),
            }
        }
        out
    }

    #[test]
    fn test_page_outline() {
        let events = parse(
            "<html><body><ul id=\"list\"><li>First<li>Second <b>bold</b></ul><p>End</p></body></html>",
        );
        assert_snapshot!(format_events(&events), @r#"
        html
          body
            ul id="list"
              li
                "First"
              li
                "Second "
                b
                  "bold"
            p
              "End"
        "#);
    }
}
