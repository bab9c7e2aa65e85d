//! # Parser Events
//!
//! The parser does not build a tree. It emits a flat, balanced sequence of
//! events that a sink (for example the engine's DOM builder) turns into nodes:
//!
//! ```text
//! <p>Hi <b>there</b></p>
//!
//! Start(p)
//!   Text("Hi ")
//!   Start(b)
//!     Text("there")
//!   End(b)
//! End(p)
//! ```
//!
//! Every `Start` is matched by exactly one `End`, except for void elements
//! (`<br>`, `<img>`, ...) which never contain anything and never get an `End`.

/// A name/value attribute pair in source order.
pub type Attribute = (String, String);

/// An event emitted by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Open an element. Void elements are reported with `void: true` and are
    /// not followed by an `End`.
    Start {
        tag: String,
        attributes: Vec<Attribute>,
        void: bool,
    },
    /// Close the most recently opened non-void element.
    End { tag: String },
    /// Character data with entities decoded.
    Text(String),
    /// Comment body without the `<!--` / `-->` delimiters.
    Comment(String),
}
