use thiserror::Error;

use erplink_core::{CustomerNo, RepositoryError};

pub type PricingResult<T> = Result<T, PricingError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PricingError {
    /// A record the caller asked for directly does not exist.
    #[error("{entity} {key} not found")]
    NotFound { entity: &'static str, key: String },

    /// A price reason could not be mapped back onto a discount source.
    #[error("malformed price reason {reason:?}: {message}")]
    MalformedReason { reason: String, message: String },

    /// The chain revisits a customer or is deeper than the configured bound.
    #[error("chain cycle detected at customer {customer_no} (depth {depth})")]
    CycleDetected { customer_no: CustomerNo, depth: usize },

    /// The discount cache backend failed; the computation itself did not run.
    #[error("discount cache failure: {0}")]
    Cache(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl PricingError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn malformed_reason(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedReason {
            reason: reason.into(),
            message: message.into(),
        }
    }
}
