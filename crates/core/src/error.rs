//! Domain and repository error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Storage failures are reported as [`RepositoryError`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested record was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A conflict occurred (e.g. duplicate key).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}

/// Failure reported by a repository adapter.
///
/// Missing rows are never an error: lookups return `Ok(None)` (or an empty
/// collection) instead. This type is reserved for the storage layer itself.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// The backing store failed (connection, query, driver).
    #[error("storage error: {0}")]
    Storage(String),

    /// A row could not be mapped onto its domain view.
    #[error("malformed row in {table}: {message}")]
    MalformedRow { table: String, message: String },

    /// A unique key was already taken (e.g. a sibling `SeqNo`).
    #[error("unique violation: {0}")]
    UniqueViolation(String),

    /// An in-process lock was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

impl RepositoryError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn malformed(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedRow {
            table: table.into(),
            message: message.into(),
        }
    }
}
