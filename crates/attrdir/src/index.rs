//! # Attribute Selectors
//!
//! Text interfaces need a compact way to point at one attribute. A selector is
//! either a name or a position within one of the two orderings:
//!
//! | Input | Meaning |
//! |-------|---------|
//! | `units` | the attribute named `units` |
//! | `#0` | first attribute in increasing creation order |
//! | `~2` | third attribute in increasing name order |
//!
//! Positions are zero-based offsets into the *current* ordering, so they shift when
//! attributes are deleted. A name that itself starts with `#` or `~` followed by
//! digits can be selected by prefixing it with `=` (`=#1` is the attribute named `#1`).

use crate::model::{IndexType, IterOrder};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrSelector {
    Name(String),
    Position { index_type: IndexType, n: u64 },
}

impl AttrSelector {
    /// Direction positions are counted in. Selectors always count upwards.
    pub fn order(&self) -> IterOrder {
        IterOrder::Increasing
    }
}

impl fmt::Display for AttrSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrSelector::Name(name) => {
                if parse_position(name).is_some() || name.starts_with('=') {
                    write!(f, "={}", name)
                } else {
                    write!(f, "{}", name)
                }
            }
            AttrSelector::Position {
                index_type: IndexType::CreationOrder,
                n,
            } => write!(f, "#{}", n),
            AttrSelector::Position {
                index_type: IndexType::Name,
                n,
            } => write!(f, "~{}", n),
        }
    }
}

impl FromStr for AttrSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err("Empty attribute selector".to_string());
        }
        if let Some(name) = s.strip_prefix('=') {
            if name.is_empty() {
                return Err("Empty attribute name after '='".to_string());
            }
            return Ok(AttrSelector::Name(name.to_string()));
        }
        if let Some(sel) = parse_position(s) {
            return sel;
        }
        Ok(AttrSelector::Name(s.to_string()))
    }
}

/// `Some` when `s` looks like a positional selector, with the parse outcome.
fn parse_position(s: &str) -> Option<Result<AttrSelector, String>> {
    let (index_type, rest) = if let Some(rest) = s.strip_prefix('#') {
        (IndexType::CreationOrder, rest)
    } else if let Some(rest) = s.strip_prefix('~') {
        (IndexType::Name, rest)
    } else {
        return None;
    };
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(
        rest.parse()
            .map(|n| AttrSelector::Position { index_type, n })
            .map_err(|_| format!("Position out of range: {}", s)),
    )
}
