//! Modification markers for cache invalidation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Monotonic change marker of a row (the ERP's `LastUpdate` column).
///
/// Anything derived from a row (cached discount sets, for instance) must be
/// keyed on this marker so a changed row never serves stale results.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModificationVersion(DateTime<Utc>);

impl ModificationVersion {
    pub fn new(last_update: DateTime<Utc>) -> Self {
        Self(last_update)
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Millisecond representation, stable across serialization formats.
    pub fn as_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }
}

impl From<DateTime<Utc>> for ModificationVersion {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

/// Rows that expose a modification marker.
pub trait Versioned {
    fn version(&self) -> ModificationVersion;
}
