//! Strongly-typed natural keys of the legacy ERP tables.
//!
//! The ERP identifies rows by business numbers rather than surrogate ids. Several
//! columns use `0` to mean "not set"; [`from_legacy`](CustomerNo::from_legacy)
//! maps that convention onto `Option`.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Customer number (`CustomerNo`). Also used for chain heads (`ChainNo`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerNo(i64);

/// Price list number (`PriceListNo`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceListNo(i64);

/// Customer discount group number (`DiscountGrpCustNo`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiscountGroupNo(i64);

/// Article discount group number (`DiscountGrpArtNo`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleGroupNo(i64);

/// Customer order number (`OrderNo`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNo(i64);

macro_rules! impl_number_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Map a raw column value, treating `0` as "not set".
            pub fn from_legacy(value: i64) -> Option<Self> {
                if value == 0 { None } else { Some(Self(value)) }
            }

            pub const fn get(&self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<i64> for $t {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$t> for i64 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let value = s
                    .trim()
                    .parse::<i64>()
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(value))
            }
        }
    };
}

impl_number_newtype!(CustomerNo, "CustomerNo");
impl_number_newtype!(PriceListNo, "PriceListNo");
impl_number_newtype!(DiscountGroupNo, "DiscountGrpCustNo");
impl_number_newtype!(ArticleGroupNo, "DiscountGrpArtNo");
impl_number_newtype!(OrderNo, "OrderNo");

/// Article number (`ArticleNo`), an opaque non-empty string key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleNo(String);

impl ArticleNo {
    /// Create an article number. Surrounding whitespace (CHAR padding) is dropped.
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        Self(value.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ArticleNo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArticleNo {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl FromStr for ArticleNo {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Self::new(s);
        if value.0.is_empty() {
            return Err(DomainError::invalid_id("ArticleNo: empty"));
        }
        Ok(value)
    }
}
