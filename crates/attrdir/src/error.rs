use crate::model::{IndexType, IterOrder};
use std::fmt;
use thiserror::Error;

/// Identifies the record an operation was aimed at, so failures can say which
/// attribute caused them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrTarget {
    Name(String),
    Index {
        index_type: IndexType,
        order: IterOrder,
        n: u64,
    },
    Handle {
        id: u64,
        key: u64,
    },
}

impl fmt::Display for AttrTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrTarget::Name(name) => write!(f, "\"{}\"", name),
            AttrTarget::Index {
                index_type,
                order,
                n,
            } => write!(f, "#{} ({}, {})", n, index_type, order),
            AttrTarget::Handle { id, key } => {
                write!(f, "handle {} (creation order {})", id, key)
            }
        }
    }
}

impl From<&str> for AttrTarget {
    fn from(name: &str) -> Self {
        AttrTarget::Name(name.to_string())
    }
}

#[derive(Error, Debug)]
pub enum AttrError {
    #[error("Attribute not found: {0}")]
    NotFound(AttrTarget),

    #[error("Attribute already exists: \"{0}\"")]
    Duplicate(String),

    #[error("Index out of range: {target} (count {count})")]
    InvalidIndex { target: AttrTarget, count: u64 },

    #[error("Size mismatch for \"{name}\": expected {expected} bytes, got {actual}")]
    TypeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Storage inconsistent: {0}")]
    StorageInconsistent(String),

    #[error("Iteration aborted with {code} at cursor {cursor}")]
    IteratorAborted { code: i32, cursor: u64 },

    #[error("Iteration short-circuited with {code} at cursor {cursor}")]
    IteratorShortCircuited { code: i32, cursor: u64 },

    #[error("Creation order is not tracked on {0}")]
    CreationOrderNotTracked(String),

    #[error("Invalid attribute name: {0}")]
    InvalidName(String),

    #[error("Invalid or closed attribute handle: {0}")]
    InvalidHandle(u64),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Object already exists: {0}")]
    ObjectExists(String),

    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<confique::Error> for AttrError {
    fn from(e: confique::Error) -> Self {
        AttrError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AttrError>;
