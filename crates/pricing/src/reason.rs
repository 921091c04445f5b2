//! Price reasons: which source produced a candidate price.
//!
//! Rendered labels are `article`, the source column (`CustomerNo`,
//! `PriceListNo`, `DiscountGrpCustNo`) for the customer's own sources, and
//! `ChainNo:<column>` for agreements inherited through the chain.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::agreement::{DiscountAgreement, DiscountSourceKind};
use crate::error::PricingError;
use crate::sources::DiscountSources;

pub const ARTICLE_LABEL: &str = "article";
pub const CHAIN_LABEL: &str = "ChainNo";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum PriceReason {
    /// The article's base price; no discount applied.
    Article,
    /// One of the customer's own sources.
    Own(DiscountSourceKind),
    /// A source reached through the customer's chain.
    Chain(DiscountSourceKind),
}

impl PriceReason {
    /// Attribute an agreement relative to the customer it was resolved for.
    pub fn for_agreement(agreement: &DiscountAgreement, own_sources: &DiscountSources) -> Self {
        let kind = agreement.source.kind();
        if own_sources.contains(&agreement.source) {
            PriceReason::Own(kind)
        } else {
            PriceReason::Chain(kind)
        }
    }

    pub fn is_article(&self) -> bool {
        matches!(self, PriceReason::Article)
    }
}

impl core::fmt::Display for PriceReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PriceReason::Article => f.write_str(ARTICLE_LABEL),
            PriceReason::Own(kind) => f.write_str(kind.column()),
            PriceReason::Chain(kind) => write!(f, "{CHAIN_LABEL}:{}", kind.column()),
        }
    }
}

impl FromStr for PriceReason {
    type Err = PricingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut segments = s.split(':');
        let first = segments.next().unwrap_or_default();
        let second = segments.next();
        if segments.next().is_some() {
            return Err(PricingError::malformed_reason(s, "more than two segments"));
        }

        let kind = |column: &str| {
            DiscountSourceKind::from_column(column).ok_or_else(|| {
                PricingError::malformed_reason(s, format!("unknown discount source {column:?}"))
            })
        };

        match (first, second) {
            (ARTICLE_LABEL, None) => Ok(PriceReason::Article),
            (column, None) => Ok(PriceReason::Own(kind(column)?)),
            (CHAIN_LABEL, Some(column)) => Ok(PriceReason::Chain(kind(column)?)),
            (other, Some(_)) => Err(PricingError::malformed_reason(
                s,
                format!("{other:?} does not lead to a discount source"),
            )),
        }
    }
}

impl From<PriceReason> for String {
    fn from(value: PriceReason) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for PriceReason {
    type Error = PricingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
