//! Structural path hints.
//!
//! A path is a chain of compounds joined by ` > `, each either `tag#id` or
//! `tag:nth-child(n)` (1-based among element siblings). Paths are written
//! relative to an anchoring scope and are only ever hints: a stale path
//! simply fails to select.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use super::{Document, NodeId};
use crate::error::DomError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Id { tag: String, id: String },
    NthChild { tag: String, index: usize },
}

impl Step {
    fn tag(&self) -> &str {
        match self {
            Step::Id { tag, .. } | Step::NthChild { tag, .. } => tag,
        }
    }

    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        if doc.tag(node) != Some(self.tag()) {
            return false;
        }
        match self {
            Step::Id { id, .. } => doc.attribute(node, "id") == Some(id.as_str()),
            Step::NthChild { index, .. } => doc
                .parent(node)
                .map(|parent| doc.element_children(parent))
                .and_then(|siblings| siblings.iter().position(|&s| s == node))
                .is_some_and(|position| position + 1 == *index),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Id { tag, id } => write!(f, "{tag}#{id}"),
            Step::NthChild { tag, index } => write!(f, "{tag}:nth-child({index})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralPath {
    steps: Vec<Step>,
}

fn step_regex() -> &'static Regex {
    static STEP_REGEX: OnceLock<Regex> = OnceLock::new();
    STEP_REGEX.get_or_init(|| {
        Regex::new(r"^([a-z][a-z0-9-]*)(?:#(\S+)|:nth-child\((\d+)\))$")
            .expect("Invalid structural path regex")
    })
}

impl StructuralPath {
    pub fn parse(path: &str) -> Result<Self, DomError> {
        let invalid = || DomError::InvalidSelector(path.to_string());
        let steps = path
            .split('>')
            .map(str::trim)
            .map(|compound| {
                let caps = step_regex().captures(compound).ok_or_else(invalid)?;
                let tag = caps[1].to_string();
                if let Some(id) = caps.get(2) {
                    return Ok(Step::Id {
                        tag,
                        id: id.as_str().to_string(),
                    });
                }
                let index = caps[3].parse::<usize>().map_err(|_| invalid())?;
                if index == 0 {
                    return Err(invalid());
                }
                Ok(Step::NthChild { tag, index })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Path from `scope` to the element containing `node` (its parent when
    /// `node` is text). The walk stops early at an element with an id.
    /// Returns an empty string when the node sits directly in the scope.
    pub fn describe(doc: &Document, scope: NodeId, node: NodeId) -> String {
        let mut element = if doc.is_element(node) {
            Some(node)
        } else {
            doc.parent(node)
        };
        let mut steps = Vec::new();
        while let Some(current) = element {
            if current == scope || !doc.is_element(current) {
                break;
            }
            let Some(tag) = doc.tag(current) else {
                break;
            };
            let tag = tag.to_string();
            if let Some(id) = doc.attribute(current, "id").filter(|id| !id.is_empty()) {
                steps.push(Step::Id {
                    tag,
                    id: id.to_string(),
                });
                break;
            }
            let index = doc
                .parent(current)
                .map(|parent| doc.element_children(parent))
                .and_then(|siblings| siblings.iter().position(|&s| s == current))
                .map_or(1, |position| position + 1);
            steps.push(Step::NthChild { tag, index });
            element = doc.parent(current);
        }
        steps.reverse();
        Self { steps }.to_string()
    }

    /// Find the element this path names inside `scope`.
    pub fn select(&self, doc: &Document, scope: NodeId) -> Option<NodeId> {
        let (first, rest) = self.steps.split_first()?;
        let mut current = match first {
            Step::Id { .. } => doc
                .descendants(scope)
                .find(|&node| first.matches(doc, node))?,
            Step::NthChild { .. } => doc
                .element_children(scope)
                .into_iter()
                .find(|&node| first.matches(doc, node))?,
        };
        for step in rest {
            current = doc
                .element_children(current)
                .into_iter()
                .find(|&node| step.matches(doc, node))?;
        }
        Some(current)
    }
}

impl fmt::Display for StructuralPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(" > ")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}
