//! # Parser - From Tokens to Balanced Events
//!
//! The parser walks the token stream once, keeping a stack of open elements
//! so that the event stream it produces is always balanced:
//!
//! - unmatched end tags are dropped
//! - an end tag closes every element opened after its match
//! - elements still open at end of input are closed
//! - a new `<p>` or block element closes an open `<p>`, and a new `<li>`
//!   closes the previous `<li>` in the same list
//!
//! Raw-text elements (`script`, `style`, `textarea`, `title`) swallow
//! everything up to their own end tag as a single text event.

pub mod event;

use crate::lexer::{Token, TokenKind, lex};
use event::{Attribute, Event};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// Elements whose start tag implicitly closes an open `<p>`.
const CLOSES_PARAGRAPH: &[&str] = &[
    "address", "article", "aside", "blockquote", "div", "dl", "fieldset", "footer", "form", "h1",
    "h2", "h3", "h4", "h5", "h6", "header", "hr", "main", "nav", "ol", "p", "pre", "section",
    "table", "ul",
];

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

/// Parse markup into a balanced event stream.
pub fn parse(input: &str) -> Vec<Event> {
    Parser::new(lex(input)).run()
}

struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    cursor: usize,
    open: Vec<String>,
    events: Vec<Event>,
}

impl<'a> Parser<'a> {
    fn new(tokens: Vec<Token<'a>>) -> Self {
        Self {
            tokens,
            cursor: 0,
            open: Vec::new(),
            events: Vec::new(),
        }
    }

    fn run(mut self) -> Vec<Event> {
        while let Some(token) = self.tokens.get(self.cursor).cloned() {
            self.cursor += 1;
            match token.kind {
                TokenKind::Text | TokenKind::Lt => self.text(token.text),
                TokenKind::Comment => {
                    let body = token
                        .text
                        .trim_start_matches("<!--")
                        .trim_end_matches("-->");
                    self.events.push(Event::Comment(body.to_string()));
                }
                TokenKind::Doctype => {}
                TokenKind::StartTag => self.start_tag(token.text),
                TokenKind::EndTag => {
                    let name = end_tag_name(token.text);
                    self.close(&name);
                }
            }
        }

        while let Some(tag) = self.open.pop() {
            self.events.push(Event::End { tag });
        }
        self.events
    }

    fn text(&mut self, raw: &str) {
        let decoded = html_escape::decode_html_entities(raw).into_owned();
        // Adjacent text tokens (text, stray `<`, text) merge into one event
        if let Some(Event::Text(previous)) = self.events.last_mut() {
            previous.push_str(&decoded);
        } else {
            self.events.push(Event::Text(decoded));
        }
    }

    fn start_tag(&mut self, raw: &str) {
        let (tag, attributes) = split_start_tag(raw);

        if CLOSES_PARAGRAPH.contains(&tag.as_str()) && self.open.iter().any(|t| t == "p") {
            self.close("p");
        }
        if tag == "li" {
            self.close_open_list_item();
        }

        if is_void_element(&tag) {
            self.events.push(Event::Start {
                tag,
                attributes,
                void: true,
            });
            return;
        }

        let self_closing = raw.trim_end_matches('>').trim_end().ends_with('/');
        self.events.push(Event::Start {
            tag: tag.clone(),
            attributes,
            void: false,
        });
        if self_closing {
            self.events.push(Event::End { tag });
            return;
        }

        if RAW_TEXT_ELEMENTS.contains(&tag.as_str()) {
            self.raw_text(&tag);
            self.events.push(Event::End { tag });
            return;
        }

        self.open.push(tag);
    }

    /// Consume tokens verbatim until `</tag>`.
    fn raw_text(&mut self, tag: &str) {
        let mut content = String::new();
        while let Some(token) = self.tokens.get(self.cursor) {
            self.cursor += 1;
            if token.kind == TokenKind::EndTag && end_tag_name(token.text) == tag {
                break;
            }
            content.push_str(token.text);
        }
        if content.is_empty() {
            return;
        }
        let content = match tag {
            "textarea" | "title" => html_escape::decode_html_entities(&content).into_owned(),
            _ => content,
        };
        self.events.push(Event::Text(content));
    }

    fn close(&mut self, tag: &str) {
        let Some(position) = self.open.iter().rposition(|t| t == tag) else {
            return;
        };
        while self.open.len() > position {
            if let Some(open) = self.open.pop() {
                self.events.push(Event::End { tag: open });
            }
        }
    }

    fn close_open_list_item(&mut self) {
        let list_item = self.open.iter().rposition(|t| t == "li");
        let list = self.open.iter().rposition(|t| t == "ul" || t == "ol");
        match (list_item, list) {
            (Some(item), Some(list)) if item > list => self.close("li"),
            (Some(_), None) => self.close("li"),
            _ => {}
        }
    }
}

fn end_tag_name(raw: &str) -> String {
    raw.trim_start_matches("</")
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == ':')
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Split `<tag a="1" b c='2'>` into its lowercase name and attributes.
fn split_start_tag(raw: &str) -> (String, Vec<Attribute>) {
    let inner = raw.trim_start_matches('<').trim_end_matches('>');
    let name_len = inner
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == ':'))
        .unwrap_or(inner.len());
    let tag = inner[..name_len].to_ascii_lowercase();
    (tag, parse_attributes(&inner[name_len..]))
}

fn parse_attributes(source: &str) -> Vec<Attribute> {
    let mut attributes: Vec<Attribute> = Vec::new();
    let mut chars = source.char_indices().peekable();

    loop {
        while chars
            .peek()
            .is_some_and(|(_, c)| c.is_whitespace() || *c == '/')
        {
            chars.next();
        }
        let Some(&(name_start, _)) = chars.peek() else {
            break;
        };

        let mut name_end = source.len();
        while let Some(&(i, c)) = chars.peek() {
            if c.is_whitespace() || c == '=' || c == '/' {
                name_end = i;
                break;
            }
            chars.next();
        }
        let name = source[name_start..name_end].to_ascii_lowercase();

        while chars.peek().is_some_and(|(_, c)| c.is_whitespace()) {
            chars.next();
        }

        let mut value = String::new();
        if chars.peek().is_some_and(|(_, c)| *c == '=') {
            chars.next();
            while chars.peek().is_some_and(|(_, c)| c.is_whitespace()) {
                chars.next();
            }
            match chars.peek().map(|(_, c)| *c) {
                Some(quote @ ('"' | '\'')) => {
                    chars.next();
                    for (_, c) in chars.by_ref() {
                        if c == quote {
                            break;
                        }
                        value.push(c);
                    }
                }
                _ => {
                    while let Some(&(_, c)) = chars.peek() {
                        if c.is_whitespace() {
                            break;
                        }
                        value.push(c);
                        chars.next();
                    }
                }
            }
        }

        if name.is_empty() || attributes.iter().any(|(existing, _)| *existing == name) {
            continue;
        }
        let value = html_escape::decode_html_entities(&value).into_owned();
        attributes.push((name, value));
    }

    attributes
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn start(tag: &str, attributes: &[(&str, &str)]) -> Event {
        Event::Start {
            tag: tag.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            void: false,
        }
    }

    fn end(tag: &str) -> Event {
        Event::End {
            tag: tag.to_string(),
        }
    }

    fn text(s: &str) -> Event {
        Event::Text(s.to_string())
    }

    #[test]
    fn test_nested_elements() {
        let events = parse("<p>Hi <b>there</b></p>");
        assert_eq!(
            events,
            vec![
                start("p", &[]),
                text("Hi "),
                start("b", &[]),
                text("there"),
                end("b"),
                end("p"),
            ]
        );
    }

    #[test]
    fn test_attributes_quoted_unquoted_and_bare() {
        let events = parse(r#"<input type=checkbox checked data-x='a "b"'>"#);
        assert_eq!(
            events,
            vec![Event::Start {
                tag: "input".to_string(),
                attributes: vec![
                    ("type".to_string(), "checkbox".to_string()),
                    ("checked".to_string(), String::new()),
                    ("data-x".to_string(), "a \"b\"".to_string()),
                ],
                void: true,
            }]
        );
    }

    #[test]
    fn test_tag_names_are_lowercased() {
        let events = parse("<DIV ID=\"Main\">x</DIV>");
        assert_eq!(events, vec![start("div", &[("id", "Main")]), text("x"), end("div")]);
    }

    #[test]
    fn test_entities_are_decoded() {
        let events = parse("<p title=\"a &amp; b\">1 &lt; 2 &amp; 3</p>");
        assert_eq!(
            events,
            vec![start("p", &[("title", "a & b")]), text("1 < 2 & 3"), end("p")]
        );
    }

    #[test]
    fn test_stray_less_than_merges_into_text() {
        let events = parse("<p>1 < 2</p>");
        assert_eq!(events, vec![start("p", &[]), text("1 < 2"), end("p")]);
    }

    #[test]
    fn test_unmatched_end_tag_is_ignored() {
        let events = parse("<p>a</span>b</p>");
        assert_eq!(events, vec![start("p", &[]), text("ab"), end("p")]);
    }

    #[test]
    fn test_end_tag_closes_inner_elements() {
        let events = parse("<div><span>a</div>");
        assert_eq!(
            events,
            vec![start("div", &[]), start("span", &[]), text("a"), end("span"), end("div")]
        );
    }

    #[test]
    fn test_unclosed_elements_closed_at_end() {
        let events = parse("<section><p>a");
        assert_eq!(
            events,
            vec![start("section", &[]), start("p", &[]), text("a"), end("p"), end("section")]
        );
    }

    #[rstest]
    #[case("<p>one<p>two", vec!["p", "p"])]
    #[case("<p>one<div>two</div>", vec!["p", "div"])]
    #[case("<ul><li>a<li>b</ul>", vec!["li", "li", "ul"])]
    fn test_implicit_closes(#[case] input: &str, #[case] closed_in_order: Vec<&str>) {
        let ends: Vec<String> = parse(input)
            .into_iter()
            .filter_map(|e| match e {
                Event::End { tag } => Some(tag),
                _ => None,
            })
            .collect();
        assert_eq!(ends, closed_in_order);
    }

    #[test]
    fn test_nested_list_item_does_not_close_outer_item() {
        let events = parse("<ul><li>a<ul><li>b</li></ul></li></ul>");
        let li_ends = events.iter().filter(|e| **e == end("li")).count();
        assert_eq!(li_ends, 2);
        assert_eq!(events.last(), Some(&end("ul")));
    }

    #[test]
    fn test_script_content_is_raw_text() {
        let events = parse("<script>if (a < b) { x = '<p>'; }</script><p>t</p>");
        assert_eq!(
            events,
            vec![
                start("script", &[]),
                text("if (a < b) { x = '<p>'; }"),
                end("script"),
                start("p", &[]),
                text("t"),
                end("p"),
            ]
        );
    }

    #[test]
    fn test_void_and_self_closing_elements() {
        let events = parse("a<br>b<span/>c");
        assert_eq!(
            events,
            vec![
                text("a"),
                Event::Start {
                    tag: "br".to_string(),
                    attributes: vec![],
                    void: true,
                },
                text("b"),
                start("span", &[]),
                end("span"),
                text("c"),
            ]
        );
    }

    #[test]
    fn test_comments_and_doctype() {
        let events = parse("<!doctype html><!-- note --><p>x</p>");
        assert_eq!(
            events,
            vec![Event::Comment(" note ".to_string()), start("p", &[]), text("x"), end("p")]
        );
    }
}
