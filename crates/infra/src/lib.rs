//! Infrastructure layer: configuration, table adapters, caches and sequence allocation.

pub mod cache;
pub mod config;
pub mod sequence;
pub mod store;

pub use cache::{CacheStats, InMemoryDiscountCache};
pub use config::{ConfigError, ErpConfig, TableNames};
pub use sequence::SequenceAllocator;
pub use store::{InMemoryErpStore, PostgresErpStore};
