//! Discount sources of a customer and the agreement query built from them.

use chrono::NaiveDate;

use erplink_core::{ArticleGroupNo, ArticleNo};
use erplink_parties::Customer;

use crate::agreement::{DiscountAgreement, DiscountSource, DiscountSourceKind};

/// Ordered `(source_kind, source_id)` list for one customer.
///
/// Always starts with the customer number, followed by the price list and the
/// discount group when those are set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscountSources(Vec<DiscountSource>);

impl DiscountSources {
    pub fn for_customer(customer: &Customer) -> Self {
        let mut sources = vec![DiscountSource::Customer(customer.customer_no)];
        if let Some(price_list_no) = customer.price_list_no {
            sources.push(DiscountSource::PriceList(price_list_no));
        }
        if let Some(discount_group_no) = customer.discount_group_no {
            sources.push(DiscountSource::DiscountGroup(discount_group_no));
        }
        Self(sources)
    }

    pub fn single(source: DiscountSource) -> Self {
        Self(vec![source])
    }

    pub fn as_slice(&self) -> &[DiscountSource] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiscountSource> {
        self.0.iter()
    }

    pub fn contains(&self, source: &DiscountSource) -> bool {
        self.0.contains(source)
    }

    pub fn of_kind(&self, kind: DiscountSourceKind) -> Option<DiscountSource> {
        self.0.iter().copied().find(|s| s.kind() == kind)
    }
}

/// Agreement lookup: any source (OR), valid at the date, for the article or its group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscountQuery {
    pub sources: DiscountSources,
    pub article_no: ArticleNo,
    pub article_group: Option<ArticleGroupNo>,
    pub at_date: NaiveDate,
}

impl DiscountQuery {
    pub fn new(
        sources: DiscountSources,
        article_no: ArticleNo,
        article_group: Option<ArticleGroupNo>,
        at_date: NaiveDate,
    ) -> Self {
        Self {
            sources,
            article_no,
            article_group,
            at_date,
        }
    }

    /// Reference predicate for adapters that filter in process.
    pub fn matches(&self, agreement: &DiscountAgreement) -> bool {
        self.sources.contains(&agreement.source)
            && agreement.is_valid_at(self.at_date)
            && agreement.target.matches(&self.article_no, self.article_group)
    }
}
