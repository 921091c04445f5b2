//! Configuration loading and representation.
//!
//! Every physical table in the legacy database carries a site-specific prefix
//! (schema and/or company code). The prefix is mandatory: an empty value would
//! silently point every query at the wrong tables.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use erplink_observability::LogFormat;
use erplink_observability::tracing::LOG_FORMAT_ENV;
use erplink_pricing::DEFAULT_MAX_CHAIN_DEPTH;

pub const TABLE_PREFIX_ENV: &str = "ERP_TABLE_PREFIX";
pub const MAX_CHAIN_DEPTH_ENV: &str = "ERP_MAX_CHAIN_DEPTH";
pub const CACHE_TTL_ENV: &str = "ERP_CACHE_TTL_SECS";

const DEFAULT_CACHE_TTL_SECS: u64 = 300;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing option value {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

fn default_max_chain_depth() -> usize {
    DEFAULT_MAX_CHAIN_DEPTH
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

/// Integration settings shared by the repository adapters and caches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErpConfig {
    /// Prepended verbatim to every table name, e.g. `F0001.`.
    pub table_prefix: String,

    /// Chain hops followed before resolution fails with a cycle error.
    #[serde(default = "default_max_chain_depth")]
    pub max_chain_depth: usize,

    /// Lifetime of cached discount resolutions; `0` disables caching.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    #[serde(default)]
    pub log_format: LogFormat,
}

impl ErpConfig {
    pub fn new(table_prefix: impl Into<String>) -> Result<Self, ConfigError> {
        let config = Self {
            table_prefix: table_prefix.into(),
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            log_format: LogFormat::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from `ERP_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary key lookup (environment, test map, ...).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let table_prefix = lookup(TABLE_PREFIX_ENV).ok_or(ConfigError::Missing(TABLE_PREFIX_ENV))?;
        let mut config = Self::new(table_prefix)?;

        if let Some(raw) = lookup(MAX_CHAIN_DEPTH_ENV) {
            config.max_chain_depth = parse_number(MAX_CHAIN_DEPTH_ENV, &raw)?;
        }
        if let Some(raw) = lookup(CACHE_TTL_ENV) {
            config.cache_ttl_secs = parse_number(CACHE_TTL_ENV, &raw)?;
        }
        if let Some(raw) = lookup(LOG_FORMAT_ENV) {
            config.log_format = LogFormat::parse(&raw);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.table_prefix.trim().is_empty() {
            return Err(ConfigError::Missing(TABLE_PREFIX_ENV));
        }
        if self.max_chain_depth == 0 {
            return Err(ConfigError::Invalid {
                key: MAX_CHAIN_DEPTH_ENV,
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        (self.cache_ttl_secs > 0).then(|| Duration::from_secs(self.cache_ttl_secs))
    }

    pub fn tables(&self) -> TableNames {
        TableNames::new(&self.table_prefix)
    }
}

fn parse_number<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        message: e.to_string(),
    })
}

/// Physical table names derived from the configured prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub customer: String,
    pub customer_invoice_address: String,
    pub article: String,
    pub discount_agreement: String,
    pub price_list: String,
    pub discount_group: String,
    pub customer_order: String,
    pub customer_order_line: String,
}

impl TableNames {
    pub fn new(prefix: &str) -> Self {
        let table = |name: &str| format!("{prefix}{name}");
        Self {
            customer: table("Customer"),
            customer_invoice_address: table("CustomerInvoiceAdresses"),
            article: table("Article"),
            discount_agreement: table("DiscountAgreementCustomer"),
            price_list: table("PriceList"),
            discount_group: table("DiscountGroupCustomer"),
            customer_order: table("CustomerOrder"),
            customer_order_line: table("CustomerOrderLine"),
        }
    }
}
