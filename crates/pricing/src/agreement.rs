//! Discount agreements (`DiscountAgreementCustomer` rows).

use std::collections::BTreeSet;

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use erplink_core::{
    ArticleGroupNo, ArticleNo, CustomerNo, DiscountGroupNo, PriceListNo, ValueObject,
};

/// Deduplicated, ordered set of agreements.
///
/// Ordering follows the full agreement identity, so two resolutions over the
/// same data always iterate identically.
pub type DiscountSet = BTreeSet<DiscountAgreement>;

/// The three customer columns an agreement can be keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DiscountSourceKind {
    Customer,
    PriceList,
    DiscountGroup,
}

impl DiscountSourceKind {
    pub const ALL: [DiscountSourceKind; 3] = [
        DiscountSourceKind::Customer,
        DiscountSourceKind::PriceList,
        DiscountSourceKind::DiscountGroup,
    ];

    /// Legacy column name, also used as the price reason label.
    pub fn column(self) -> &'static str {
        match self {
            DiscountSourceKind::Customer => "CustomerNo",
            DiscountSourceKind::PriceList => "PriceListNo",
            DiscountSourceKind::DiscountGroup => "DiscountGrpCustNo",
        }
    }

    pub fn from_column(column: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.column() == column)
    }
}

impl core::fmt::Display for DiscountSourceKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.column())
    }
}

/// A concrete `(source_kind, source_id)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DiscountSource {
    Customer(CustomerNo),
    PriceList(PriceListNo),
    DiscountGroup(DiscountGroupNo),
}

impl DiscountSource {
    pub fn kind(&self) -> DiscountSourceKind {
        match self {
            DiscountSource::Customer(_) => DiscountSourceKind::Customer,
            DiscountSource::PriceList(_) => DiscountSourceKind::PriceList,
            DiscountSource::DiscountGroup(_) => DiscountSourceKind::DiscountGroup,
        }
    }

    /// Column value the source matches against.
    pub fn raw_id(&self) -> i64 {
        match self {
            DiscountSource::Customer(no) => no.get(),
            DiscountSource::PriceList(no) => no.get(),
            DiscountSource::DiscountGroup(no) => no.get(),
        }
    }
}

impl core::fmt::Display for DiscountSource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}={}", self.kind().column(), self.raw_id())
    }
}

/// What an agreement applies to: one article, or every article in a group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DiscountTarget {
    Article(ArticleNo),
    ArticleGroup(ArticleGroupNo),
}

impl DiscountTarget {
    pub fn matches(&self, article_no: &ArticleNo, article_group: Option<ArticleGroupNo>) -> bool {
        match self {
            DiscountTarget::Article(no) => no == article_no,
            DiscountTarget::ArticleGroup(group) => article_group == Some(*group),
        }
    }
}

/// Discount terms: a net price, or a percentage off the base price.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DiscountTerms {
    /// Net price in smallest currency unit.
    FixedPrice(u64),
    /// Percentage off the base price (`12.5` means 12.5 %).
    Percent(Decimal),
}

impl ValueObject for DiscountTerms {}

/// A discount agreement. Every field is part of its identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DiscountAgreement {
    pub source: DiscountSource,
    pub target: DiscountTarget,
    pub valid_from: NaiveDate,
    /// Inclusive end of validity; `None` is open-ended.
    pub valid_to: Option<NaiveDate>,
    pub terms: DiscountTerms,
}

impl DiscountAgreement {
    pub fn new(
        source: DiscountSource,
        target: DiscountTarget,
        valid_from: NaiveDate,
        valid_to: Option<NaiveDate>,
        terms: DiscountTerms,
    ) -> Self {
        Self {
            source,
            target,
            valid_from,
            valid_to,
            terms,
        }
    }

    /// Whether `at_date` falls inside `[valid_from, valid_to]`.
    pub fn is_valid_at(&self, at_date: NaiveDate) -> bool {
        self.valid_from <= at_date && self.valid_to.is_none_or(|to| at_date <= to)
    }

    /// Net price for an article with the given base price.
    ///
    /// Percentages are rounded half away from zero to whole minor units and
    /// never go below zero.
    pub fn price_for(&self, base_price: u64) -> u64 {
        match &self.terms {
            DiscountTerms::FixedPrice(price) => *price,
            DiscountTerms::Percent(percent) => {
                let base = Decimal::from(base_price);
                let net = base - base * *percent / Decimal::ONE_HUNDRED;
                net.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                    .max(Decimal::ZERO)
                    .to_u64()
                    .unwrap_or(0)
            }
        }
    }

    /// Fraction of the base price this agreement takes off (`0.25` = 25 %).
    pub fn discount_factor(&self, base_price: u64) -> Decimal {
        match &self.terms {
            DiscountTerms::Percent(percent) => *percent / Decimal::ONE_HUNDRED,
            DiscountTerms::FixedPrice(_) if base_price == 0 => Decimal::ZERO,
            DiscountTerms::FixedPrice(price) => {
                let base = Decimal::from(base_price);
                (base - Decimal::from(*price)) / base
            }
        }
    }
}
