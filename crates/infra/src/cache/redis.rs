//! Redis-backed discount cache (shared between processes).
//!
//! Values are JSON-encoded agreement sets stored under
//! `{namespace}:{DiscountCacheKey::to_cache_string()}` with the configured TTL.
//! Redis being unavailable never fails a lookup: the set is computed directly.

use std::sync::Arc;
use std::time::Duration;

use redis::Commands;
use tracing::{debug, warn};

use erplink_core::CustomerNo;
use erplink_pricing::{DiscountCache, DiscountCacheKey, DiscountSet, PricingError};

/// Default key namespace.
const DEFAULT_NAMESPACE: &str = "erplink";

#[derive(Debug, Clone)]
pub struct RedisDiscountCache {
    client: Arc<redis::Client>,
    namespace: String,
    ttl: Option<Duration>,
}

impl RedisDiscountCache {
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    pub fn new(redis_url: impl AsRef<str>, ttl: Option<Duration>) -> Result<Self, PricingError> {
        let client = redis::Client::open(redis_url.as_ref()).map_err(|e| PricingError::Cache(e.to_string()))?;
        Ok(Self {
            client: Arc::new(client),
            namespace: DEFAULT_NAMESPACE.to_string(),
            ttl,
        })
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    fn redis_key(&self, key: &DiscountCacheKey) -> String {
        format!("{}:{}", self.namespace, key.to_cache_string())
    }

    fn read(&self, conn: &mut redis::Connection, redis_key: &str) -> Option<DiscountSet> {
        let payload: Option<String> = match conn.get(redis_key) {
            Ok(payload) => payload,
            Err(error) => {
                warn!(%error, key = redis_key, "redis GET failed");
                return None;
            }
        };
        let payload = payload?;
        match serde_json::from_str(&payload) {
            Ok(set) => Some(set),
            Err(error) => {
                warn!(%error, key = redis_key, "discarding undecodable cache entry");
                None
            }
        }
    }

    fn write(&self, conn: &mut redis::Connection, redis_key: &str, value: &DiscountSet) {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(error) => {
                warn!(%error, "failed to encode discount set");
                return;
            }
        };

        let mut cmd = redis::cmd("SET");
        cmd.arg(redis_key).arg(payload);
        if let Some(ttl) = self.ttl {
            cmd.arg("EX").arg(ttl.as_secs().max(1));
        }
        if let Err(error) = cmd.query::<()>(conn) {
            warn!(%error, key = redis_key, "redis SET failed");
        }
    }

    /// Delete every entry for `customer_no`.
    pub fn invalidate_customer(&self, customer_no: CustomerNo) -> Result<usize, PricingError> {
        let mut conn = self
            .client
            .get_connection()
            .map_err(|e| PricingError::Cache(e.to_string()))?;

        let pattern = format!("{}:discounts_for:{}:*", self.namespace, customer_no);
        let keys: Vec<String> = conn
            .scan_match::<_, String>(&pattern)
            .map_err(|e| PricingError::Cache(e.to_string()))?
            .collect();
        if keys.is_empty() {
            return Ok(0);
        }

        conn.del::<_, ()>(&keys)
            .map_err(|e| PricingError::Cache(e.to_string()))?;
        Ok(keys.len())
    }
}

impl DiscountCache for RedisDiscountCache {
    fn fetch<F>(&self, key: &DiscountCacheKey, compute: F) -> Result<DiscountSet, PricingError>
    where
        F: FnOnce() -> Result<DiscountSet, PricingError>,
    {
        let redis_key = self.redis_key(key);
        let mut conn = match self.client.get_connection() {
            Ok(conn) => conn,
            Err(error) => {
                warn!(%error, "redis unavailable; computing uncached");
                return compute();
            }
        };

        if let Some(hit) = self.read(&mut conn, &redis_key) {
            debug!(key = %redis_key, "discount cache hit");
            return Ok(hit);
        }

        debug!(key = %redis_key, "discount cache miss");
        let value = compute()?;
        self.write(&mut conn, &redis_key, &value);
        Ok(value)
    }
}
