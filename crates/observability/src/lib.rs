//! Tracing setup shared by erplink binaries, benches and tests.

/// Initialize process-wide logging with the format taken from `ERP_LOG_FORMAT`.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init_with(LogFormat::from_env(), tracing::DEFAULT_FILTER);
}

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use self::tracing::{LogFormat, init_with};
