// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
#[allow(dead_code)]
pub fn generate_article(paragraphs: usize) -> String {
    let mut html = String::from("<html><body><article>");
    for i in 0..paragraphs {
        html.push_str(&format!(
            "<section id=\"s{i}\"><h2>Section {i}</h2><p>Paragraph {i} has <em>some</em> \
             repeated text and a <a href=\"#\">link</a>. The quick brown fox jumps over \
             the lazy dog.</p></section>"
        ));
    }
    html.push_str("</article></body></html>");
    html
}
