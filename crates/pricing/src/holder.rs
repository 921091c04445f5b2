//! Discount-bearing entities and their uniform discount-factor computation.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use erplink_core::{DiscountGroupNo, Entity, PriceListNo, RepositoryError};
use erplink_parties::Customer;
use erplink_products::Article;

use crate::agreement::{DiscountAgreement, DiscountSource};
use crate::repository::DiscountAgreementStore;
use crate::sources::{DiscountQuery, DiscountSources};

/// Row of `PriceList`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceList {
    pub price_list_no: PriceListNo,
    pub name: String,
}

impl Entity for PriceList {
    type Id = PriceListNo;

    fn id(&self) -> &Self::Id {
        &self.price_list_no
    }
}

/// Row of `DiscountGroupCustomer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountGroup {
    pub discount_group_no: DiscountGroupNo,
    pub name: String,
}

impl Entity for DiscountGroup {
    type Id = DiscountGroupNo;

    fn id(&self) -> &Self::Id {
        &self.discount_group_no
    }
}

/// The entity behind a discount source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscountHolder {
    Customer(Customer),
    PriceList(PriceList),
    DiscountGroup(DiscountGroup),
}

impl DiscountHolder {
    pub fn source(&self) -> DiscountSource {
        match self {
            DiscountHolder::Customer(c) => DiscountSource::Customer(c.customer_no),
            DiscountHolder::PriceList(p) => DiscountSource::PriceList(p.price_list_no),
            DiscountHolder::DiscountGroup(g) => DiscountSource::DiscountGroup(g.discount_group_no),
        }
    }

    /// Cheapest agreement this holder has for `article` at `at_date`, with its net price.
    ///
    /// Only agreements keyed directly on the holder count; nothing is inherited.
    pub fn price_for<S>(
        &self,
        store: &S,
        article: &Article,
        at_date: NaiveDate,
    ) -> Result<Option<(DiscountAgreement, u64)>, RepositoryError>
    where
        S: DiscountAgreementStore + ?Sized,
    {
        let query = DiscountQuery::new(
            DiscountSources::single(self.source()),
            article.article_no.clone(),
            article.article_group,
            at_date,
        );
        let agreements = store.find_discount_agreements(&query)?;
        Ok(agreements
            .into_iter()
            .map(|a| {
                let price = a.price_for(article.base_price);
                (a, price)
            })
            .min_by(|(a1, p1), (a2, p2)| p1.cmp(p2).then_with(|| a1.cmp(a2))))
    }

    /// Discount factor of the holder's cheapest agreement; zero when it has none.
    pub fn discount_factor<S>(
        &self,
        store: &S,
        article: &Article,
        at_date: NaiveDate,
    ) -> Result<Decimal, RepositoryError>
    where
        S: DiscountAgreementStore + ?Sized,
    {
        Ok(self
            .price_for(store, article, at_date)?
            .map(|(agreement, _)| agreement.discount_factor(article.base_price))
            .unwrap_or(Decimal::ZERO))
    }
}
