use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use erplink_core::{CustomerNo, ModificationVersion};
use erplink_pricing::{DiscountCache, DiscountCacheKey, DiscountSet, PricingError};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: DiscountSet,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: DiscountSet, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|d| Instant::now() + d),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() > at)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Process-local discount cache with optional TTL.
///
/// Concurrent lookups of the same key wait for a single computation instead of
/// each querying the store. A poisoned lock degrades to computing uncached.
/// Storing a newer customer version drops that customer's older entries; results
/// for a version older than one already seen are not stored.
#[derive(Debug, Default)]
pub struct InMemoryDiscountCache {
    entries: RwLock<HashMap<DiscountCacheKey, CacheEntry>>,
    in_flight: Mutex<HashMap<DiscountCacheKey, Arc<Mutex<()>>>>,
    latest: Mutex<HashMap<CustomerNo, ModificationVersion>>,
    ttl: Option<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl InMemoryDiscountCache {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            ..Self::default()
        }
    }

    fn lookup(&self, key: &DiscountCacheKey) -> Option<DiscountSet> {
        let entries = match self.entries.read() {
            Ok(entries) => entries,
            Err(_) => {
                warn!("discount cache lock poisoned; bypassing cache");
                return None;
            }
        };
        entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone())
    }

    fn store(&self, key: &DiscountCacheKey, value: &DiscountSet) {
        let Ok(mut entries) = self.entries.write() else {
            return;
        };
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        let seen = latest.entry(key.customer_no).or_insert(key.customer_version);
        if key.customer_version < *seen {
            return;
        }
        if key.customer_version > *seen {
            *seen = key.customer_version;
            let before = entries.len();
            entries.retain(|k, _| k.customer_no != key.customer_no || k.customer_version >= key.customer_version);
            debug!(
                customer_no = %key.customer_no,
                dropped = before - entries.len(),
                "dropped superseded customer versions"
            );
        }
        entries.insert(key.clone(), CacheEntry::new(value.clone(), self.ttl));
    }

    fn slot(&self, key: &DiscountCacheKey) -> Arc<Mutex<()>> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        in_flight.entry(key.clone()).or_default().clone()
    }

    fn release(&self, key: &DiscountCacheKey) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        in_flight.remove(key);
    }

    /// Drop every entry computed for `customer_no`, whatever its version.
    pub fn invalidate_customer(&self, customer_no: CustomerNo) {
        if let Ok(mut entries) = self.entries.write() {
            entries.retain(|key, _| key.customer_no != customer_no);
            self.latest
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&customer_no);
        }
    }

    /// Drop expired entries.
    pub fn purge_expired(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.retain(|_, entry| !entry.is_expired());
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
            self.latest.lock().unwrap_or_else(PoisonError::into_inner).clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl DiscountCache for InMemoryDiscountCache {
    fn fetch<F>(&self, key: &DiscountCacheKey, compute: F) -> Result<DiscountSet, PricingError>
    where
        F: FnOnce() -> Result<DiscountSet, PricingError>,
    {
        if let Some(hit) = self.lookup(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key.to_cache_string(), "discount cache hit");
            return Ok(hit);
        }

        let slot = self.slot(key);
        let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);

        // Another caller may have filled the entry while we waited.
        if let Some(hit) = self.lookup(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key.to_cache_string(), "discount cache miss");
        let result = compute();
        if let Ok(value) = &result {
            self.store(key, value);
        }
        self.release(key);
        result
    }
}
