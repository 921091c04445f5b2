//! Discount cache backends.

pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis;

pub use in_memory::{CacheStats, InMemoryDiscountCache};
#[cfg(feature = "redis")]
pub use self::redis::RedisDiscountCache;
