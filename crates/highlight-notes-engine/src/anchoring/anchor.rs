use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque, stable highlight identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HighlightId(String);

impl HighlightId {
    pub fn generate() -> Self {
        Self(format!("hn-highlight-{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for HighlightId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for HighlightId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for HighlightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Durable description of a highlighted span, independent of any node.
///
/// Offsets are char offsets into the flattened text of the anchoring scope
/// at creation time and only serve as a tie-break hint afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anchor {
    pub id: HighlightId,
    pub quote: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(alias = "start_pos")]
    pub start_offset: usize,
    #[serde(alias = "end_pos")]
    pub end_offset: usize,
    #[serde(default, alias = "css_path")]
    pub structural_path: String,
}

impl Anchor {
    /// The note, treating an empty string as no note.
    pub fn note(&self) -> Option<&str> {
        self.note.as_deref().filter(|note| !note.is_empty())
    }
}

/// Mutable fields of a stored anchor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AnchorPatch {
    pub color: Option<String>,
    /// `Some(None)` clears the note.
    pub note: Option<Option<String>>,
}

impl AnchorPatch {
    pub fn apply(&self, anchor: &mut Anchor) {
        if let Some(color) = &self.color {
            anchor.color = color.clone();
        }
        if let Some(note) = &self.note {
            anchor.note = note.clone().filter(|n| !n.is_empty());
        }
    }
}
