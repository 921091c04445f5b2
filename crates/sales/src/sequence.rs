//! Sibling sequence numbers (`SeqNo`).
//!
//! Stored values are 8-character digit strings. The logical number is the
//! stored string with its trailing zeros removed, so `"30000000"` is 3 and
//! `"12000000"` is 12. A new value is rendered by reversing the decimal digits
//! of the logical number, left-padding to 8 digits and reversing again.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use erplink_core::RepositoryError;

/// Width of a rendered `SeqNo`.
pub const SEQ_NO_WIDTH: usize = 8;

/// Next logical value when a scope has no siblings or they cannot be read.
pub const DEFAULT_NEXT_SEQUENCE: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeqNo(String);

impl SeqNo {
    /// Wrap a stored value as-is.
    pub fn from_stored(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Render a logical value in stored form.
    pub fn render(logical: u64) -> Self {
        let reversed: String = logical.to_string().chars().rev().collect();
        // Leading zeros of the reversed digits vanish here, as they did in the stored format.
        let significant = reversed.trim_start_matches('0');
        let significant = if significant.is_empty() { "0" } else { significant };
        let padded = format!("{significant:0>width$}", width = SEQ_NO_WIDTH);
        Self(padded.chars().rev().collect())
    }

    /// Logical value, or `None` when the stored value is not a digit string.
    pub fn logical(&self) -> Option<u64> {
        let trimmed = self.0.trim().trim_end_matches('0');
        if trimmed.is_empty() {
            return if self.0.trim().is_empty() { None } else { Some(0) };
        }
        trimmed.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for SeqNo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Next logical value after the highest sibling.
///
/// Unparsable siblings are skipped. With no usable siblings the result is
/// [`DEFAULT_NEXT_SEQUENCE`].
pub fn next_sequence_value(siblings: &[SeqNo]) -> u64 {
    siblings
        .iter()
        .filter_map(|s| {
            let logical = s.logical();
            if logical.is_none() {
                warn!(seq_no = %s, "ignoring unparsable sibling SeqNo");
            }
            logical
        })
        .max()
        .map_or(DEFAULT_NEXT_SEQUENCE, |max| max + 1)
}

/// Stored form of the next value after `siblings`.
///
/// Logical values ending in zero render like shorter ones (`10` and `1` are
/// both `"10000000"`). A rendering some sibling already holds is skipped.
pub fn next_seq_no(siblings: &[SeqNo]) -> SeqNo {
    let mut next = next_sequence_value(siblings);
    loop {
        let seq_no = SeqNo::render(next);
        if !siblings.contains(&seq_no) {
            return seq_no;
        }
        debug!(logical = next, seq_no = %seq_no, "rendered SeqNo already taken; skipping");
        next += 1;
    }
}

/// Like [`next_seq_no`], treating a failed sibling lookup as "no siblings".
pub fn next_seq_no_from(lookup: Result<Vec<SeqNo>, RepositoryError>) -> SeqNo {
    match lookup {
        Ok(siblings) => next_seq_no(&siblings),
        Err(error) => {
            warn!(%error, "sibling lookup failed; using default sequence start");
            SeqNo::render(DEFAULT_NEXT_SEQUENCE)
        }
    }
}

/// A record numbered within its parent scope.
pub trait Sequenced {
    fn seq_no(&self) -> Option<&SeqNo>;
    fn assign_seq_no(&mut self, seq_no: SeqNo);
}

/// Number `record` after `siblings` and return the assigned value.
pub fn set_sequence<T: Sequenced>(record: &mut T, siblings: &[SeqNo]) -> SeqNo {
    let seq_no = next_seq_no(siblings);
    record.assign_seq_no(seq_no.clone());
    seq_no
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SequenceError {
    /// Another writer took the allocated value first; retry the allocation.
    #[error("sequence conflict in {scope}: {seq_no} already taken")]
    ConcurrentConflict { scope: String, seq_no: SeqNo },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
