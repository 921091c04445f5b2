//! Memoization seam for discount resolution.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use erplink_core::{ArticleNo, CustomerNo, ModificationVersion, Versioned};
use erplink_parties::Customer;

use crate::agreement::DiscountSet;
use crate::error::PricingError;

/// Cache key: stable identity plus the customer's modification version.
///
/// A customer whose row changed gets a new key, so stale entries are never
/// served; they simply age out according to the cache's own policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiscountCacheKey {
    pub customer_no: CustomerNo,
    pub customer_version: ModificationVersion,
    pub article_no: ArticleNo,
    pub at_date: NaiveDate,
}

impl DiscountCacheKey {
    pub fn new(customer: &Customer, article_no: ArticleNo, at_date: NaiveDate) -> Self {
        Self {
            customer_no: customer.customer_no,
            customer_version: customer.version(),
            article_no,
            at_date,
        }
    }

    /// Flat string form for external key/value caches.
    pub fn to_cache_string(&self) -> String {
        format!(
            "discounts_for:{}:{}:{}:{}",
            self.customer_no,
            self.customer_version.as_millis(),
            self.article_no,
            self.at_date
        )
    }
}

/// Memoizing wrapper around a discount computation.
///
/// Implementations must return exactly what `compute` would have returned for
/// the same key; failed computations are never cached.
pub trait DiscountCache: Send + Sync {
    fn fetch<F>(&self, key: &DiscountCacheKey, compute: F) -> Result<DiscountSet, PricingError>
    where
        F: FnOnce() -> Result<DiscountSet, PricingError>;
}

impl<C> DiscountCache for Arc<C>
where
    C: DiscountCache,
{
    fn fetch<F>(&self, key: &DiscountCacheKey, compute: F) -> Result<DiscountSet, PricingError>
    where
        F: FnOnce() -> Result<DiscountSet, PricingError>,
    {
        (**self).fetch(key, compute)
    }
}

/// Pass-through cache: always computes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl DiscountCache for NoCache {
    fn fetch<F>(&self, _key: &DiscountCacheKey, compute: F) -> Result<DiscountSet, PricingError>
    where
        F: FnOnce() -> Result<DiscountSet, PricingError>,
    {
        compute()
    }
}
