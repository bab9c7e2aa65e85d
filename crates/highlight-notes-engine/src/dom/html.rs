//! Loading markup events into a [`Document`] and serialising it back.

use highlight_notes_markup::Event;

use super::{Document, NodeData, NodeId};

/// Builds DOM nodes from a markup event stream under a given parent.
pub struct DomSink<'d> {
    doc: &'d mut Document,
    stack: Vec<NodeId>,
}

impl<'d> DomSink<'d> {
    pub fn new(doc: &'d mut Document, parent: NodeId) -> Self {
        Self {
            doc,
            stack: vec![parent],
        }
    }

    fn current(&self) -> NodeId {
        // The stack never drops below the initial parent
        self.stack[self.stack.len() - 1]
    }

    pub fn feed(mut self, events: impl IntoIterator<Item = Event>) {
        for event in events {
            let node = match event {
                Event::Start {
                    tag,
                    attributes,
                    void,
                } => {
                    let element = self.doc.create_element(&tag);
                    for (name, value) in attributes {
                        self.doc.set_attribute(element, &name, value);
                    }
                    let parent = self.current();
                    self.append(parent, element);
                    if !void {
                        self.stack.push(element);
                    }
                    continue;
                }
                Event::End { .. } => {
                    if self.stack.len() > 1 {
                        self.stack.pop();
                    }
                    continue;
                }
                Event::Text(text) => self.doc.create_text(text),
                Event::Comment(text) => self.doc.create_comment(text),
            };
            let parent = self.current();
            self.append(parent, node);
        }
    }

    fn append(&mut self, parent: NodeId, child: NodeId) {
        // Freshly created nodes can always be appended
        if let Err(e) = self.doc.append_child(parent, child) {
            log::warn!("Dropping markup node: {e}");
        }
    }
}

/// Serialise a node (including itself) as HTML.
pub fn to_html(doc: &Document, node: NodeId) -> String {
    let mut out = String::new();
    write_node(doc, node, &mut out);
    out
}

/// Serialise only the children of a node.
pub fn inner_html(doc: &Document, node: NodeId) -> String {
    let mut out = String::new();
    for &child in doc.children(node) {
        write_node(doc, child, &mut out);
    }
    out
}

fn write_node(doc: &Document, node: NodeId, out: &mut String) {
    match doc.data(node) {
        NodeData::Document | NodeData::Fragment => {
            for &child in doc.children(node) {
                write_node(doc, child, out);
            }
        }
        NodeData::Text(text) => {
            let raw_parent = doc
                .parent(node)
                .and_then(|p| doc.tag(p))
                .is_some_and(|tag| tag == "script" || tag == "style");
            if raw_parent {
                out.push_str(text);
            } else {
                out.push_str(&html_escape::encode_text(text));
            }
        }
        NodeData::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeData::Element(element) => {
            out.push('<');
            out.push_str(&element.tag);
            for (name, value) in &element.attributes {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&html_escape::encode_double_quoted_attribute(value));
                out.push('"');
            }
            out.push('>');
            if highlight_notes_markup::is_void_element(&element.tag) {
                return;
            }
            for &child in doc.children(node) {
                write_node(doc, child, out);
            }
            out.push_str("</");
            out.push_str(&element.tag);
            out.push('>');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("<p>Hello <b>world</b></p>")]
    #[case("<ul id=\"list\"><li>a</li><li>b</li></ul>")]
    #[case("<p>1 &lt; 2 &amp; 3<br>next</p>")]
    #[case("<div title=\"say &quot;hi&quot;\"><!-- c --></div>")]
    #[case("<script>if (a < b) {}</script>")]
    fn test_markup_roundtrip(#[case] markup: &str) {
        let doc = Document::parse_html(markup);
        assert_eq!(inner_html(&doc, doc.root()), markup);
    }

    #[test]
    fn test_sink_into_existing_element() {
        let mut doc = Document::parse_html("<body><main></main></body>");
        let main = doc.descendants(doc.root()).find(|&n| doc.tag(n) == Some("main")).unwrap();

        DomSink::new(&mut doc, main).feed(highlight_notes_markup::parse("<p>x</p>"));

        assert_eq!(to_html(&doc, main), "<main><p>x</p></main>");
    }
}
