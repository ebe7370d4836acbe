//! # Cursor-Driven Iteration
//!
//! Iteration hands each attribute to a caller-supplied callback and interprets its
//! return value:
//!
//! | Return | Meaning | Result |
//! |--------|---------|--------|
//! | `0` | continue | next element, or [`IterStatus::Completed`] at the end |
//! | `> 0` | stop, success | [`IterStatus::ShortCircuited`] with the value |
//! | `< 0` | stop, failure | [`IterStatus::Aborted`] with the value |
//!
//! ## The Cursor
//!
//! The cursor is a plain `u64` owned by the caller and passed by `&mut`. On entry it
//! is the position to start at; on return it is the position of the next element that
//! has not been handed to the callback. After a stop on the element at position `k`
//! the cursor is `k + 1`, so calling again with the same cursor resumes right after the
//! element that stopped iteration. After completion the cursor equals the element
//! count.
//!
//! Because the cursor is the only state, any number of independent iterations can run
//! over the same directory, and abandoning one needs no cleanup.
//!
//! ## Mutation Between Calls
//!
//! The callback only sees `(name, info)`, so the directory cannot change while a single
//! call is running. Between calls it can: the cursor is positional, so an insert or
//! delete before the cursor shifts later elements and a resumed walk may skip or repeat
//! one. Each resumed call re-reads the current store, so it never sees a record that
//! no longer exists.

use crate::error::{AttrError, Result};
use crate::model::{AttrInfo, AttributeRecord};

/// Outcome of one iteration call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterStatus {
    Completed,
    ShortCircuited(i32),
    Aborted(i32),
}

impl IterStatus {
    /// The raw callback value: `0` for completion.
    pub fn code(&self) -> i32 {
        match self {
            IterStatus::Completed => 0,
            IterStatus::ShortCircuited(code) | IterStatus::Aborted(code) => *code,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, IterStatus::Completed)
    }

    /// Routes both early stops through the error channel, keeping the value and the
    /// cursor they stopped at.
    pub fn into_result(self, cursor: u64) -> Result<()> {
        match self {
            IterStatus::Completed => Ok(()),
            IterStatus::ShortCircuited(code) => {
                Err(AttrError::IteratorShortCircuited { code, cursor })
            }
            IterStatus::Aborted(code) => Err(AttrError::IteratorAborted { code, cursor }),
        }
    }
}

/// Drives `op` over `records` starting at `*cursor`, updating the cursor as described
/// in the module docs. The caller guarantees `*cursor` is within `[0, count]`.
pub fn drive<'a, I, F>(records: I, cursor: &mut u64, mut op: F) -> IterStatus
where
    I: Iterator<Item = &'a AttributeRecord>,
    F: FnMut(&str, &AttrInfo) -> i32,
{
    let start = *cursor;
    for (pos, rec) in (start..).zip(records.skip(start as usize)) {
        let code = op(&rec.name, &rec.info());
        *cursor = pos + 1;
        if code > 0 {
            return IterStatus::ShortCircuited(code);
        }
        if code < 0 {
            return IterStatus::Aborted(code);
        }
    }
    IterStatus::Completed
}
