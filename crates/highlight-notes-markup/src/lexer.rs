//! # Lexer - Tokenizing Page Markup
//!
//! Breaks HTML-like source into a flat sequence of tokens using [Logos].
//!
//! [Logos]: https://docs.rs/logos
//!
//! ## The Lossless Guarantee
//!
//! Every byte of the input appears in exactly one token, so concatenating
//! token texts reproduces the source:
//!
//! ```
//! use highlight_notes_markup::lexer::lex;
//!
//! let input = "<p class=\"x\">Hello <b>world</b></p>";
//! let tokens = lex(input);
//!
//! let reconstructed: String = tokens.iter().map(|t| t.text).collect();
//! assert_eq!(input, reconstructed);
//! ```
//!
//! ## Token Design
//!
//! Tags are lexed whole (`<a href="x">` is one [`TokenKind::StartTag`]);
//! splitting a tag into its name and attributes is the parser's job. A `<`
//! that does not begin a well-formed tag becomes [`TokenKind::Lt`] and is
//! treated as text by the parser.

use logos::Logos;

/// Token kinds produced by the Logos lexer.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `<!-- ... -->`
    #[regex(r"<!--([^-]|-[^-]|--[^>])*-->")]
    Comment,

    /// `<!DOCTYPE html>` and other markup declarations
    #[regex(r"<![A-Za-z][^>]*>")]
    Doctype,

    /// `</tag>`
    #[regex(r"</[A-Za-z][A-Za-z0-9:-]*[^<>]*>")]
    EndTag,

    /// `<tag attr="value">` or `<tag/>`; quoted values may contain `<` and `>`
    #[regex(r#"<[A-Za-z][A-Za-z0-9:-]*([^<>"']|"[^"]*"|'[^']*')*>"#)]
    StartTag,

    /// A `<` that does not open a tag
    #[token("<")]
    Lt,

    /// Character data between tags
    #[regex(r"[^<]+")]
    Text,
}

/// A lexed token with its kind and text slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
}

/// Lex the input into a sequence of tokens.
///
/// Guarantees that all bytes from the input appear in the output tokens.
pub fn lex(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut lexer = TokenKind::lexer(input);

    while let Some(result) = lexer.next() {
        let text = lexer.slice();
        // Logos error means unrecognized input - keep it as text
        let kind = result.unwrap_or(TokenKind::Text);
        tokens.push(Token { kind, text });
    }

    tokens
}
