//! In-process store for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{NaiveDate, TimeZone, Utc};

use erplink_core::{ArticleNo, CustomerNo, DiscountGroupNo, PriceListNo, RepositoryError};
use erplink_parties::{Customer, CustomerDirectory};
use erplink_products::{Article, ArticleCatalog};

use crate::agreement::{DiscountAgreement, DiscountSource, DiscountTarget, DiscountTerms};
use crate::holder::{DiscountGroup, PriceList};
use crate::repository::DiscountAgreementStore;
use crate::sources::DiscountQuery;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn customer(no: i64) -> Customer {
    Customer::new(
        CustomerNo::new(no),
        format!("Customer {no}"),
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
    )
}

pub fn article(no: &str, base_price: u64) -> Article {
    Article::new(ArticleNo::new(no), format!("Article {no}"), base_price)
}

#[derive(Debug, Default)]
pub struct FixtureStore {
    pub customers: HashMap<CustomerNo, Customer>,
    pub articles: HashMap<ArticleNo, Article>,
    pub agreements: Vec<DiscountAgreement>,
    pub price_lists: HashMap<PriceListNo, PriceList>,
    pub discount_groups: HashMap<DiscountGroupNo, DiscountGroup>,
    pub agreement_queries: AtomicUsize,
}

impl FixtureStore {
    pub fn with_customer(mut self, customer: Customer) -> Self {
        self.customers.insert(customer.customer_no, customer);
        self
    }

    pub fn with_article(mut self, article: Article) -> Self {
        self.articles.insert(article.article_no.clone(), article);
        self
    }

    /// Open-ended agreement valid from 2000-01-01.
    pub fn with_agreement(self, source: DiscountSource, target: DiscountTarget, terms: DiscountTerms) -> Self {
        self.with_agreement_window(source, target, terms, date(2000, 1, 1), None)
    }

    pub fn with_agreement_window(
        mut self,
        source: DiscountSource,
        target: DiscountTarget,
        terms: DiscountTerms,
        valid_from: NaiveDate,
        valid_to: Option<NaiveDate>,
    ) -> Self {
        self.agreements
            .push(DiscountAgreement::new(source, target, valid_from, valid_to, terms));
        self
    }

    pub fn with_price_list(mut self, no: i64, name: &str) -> Self {
        let price_list_no = PriceListNo::new(no);
        self.price_lists.insert(
            price_list_no,
            PriceList {
                price_list_no,
                name: name.to_string(),
            },
        );
        self
    }

    pub fn with_discount_group(mut self, no: i64, name: &str) -> Self {
        let discount_group_no = DiscountGroupNo::new(no);
        self.discount_groups.insert(
            discount_group_no,
            DiscountGroup {
                discount_group_no,
                name: name.to_string(),
            },
        );
        self
    }

    pub fn queries(&self) -> usize {
        self.agreement_queries.load(Ordering::SeqCst)
    }
}

impl CustomerDirectory for FixtureStore {
    fn find_customer(&self, customer_no: CustomerNo) -> Result<Option<Customer>, RepositoryError> {
        Ok(self.customers.get(&customer_no).cloned())
    }

    fn list_chain_members(&self, chain_no: CustomerNo) -> Result<Vec<Customer>, RepositoryError> {
        Ok(self
            .customers
            .values()
            .filter(|c| c.chain_no == Some(chain_no) && c.customer_no != chain_no)
            .cloned()
            .collect())
    }
}

impl ArticleCatalog for FixtureStore {
    fn find_article(&self, article_no: &ArticleNo) -> Result<Option<Article>, RepositoryError> {
        Ok(self.articles.get(article_no).cloned())
    }
}

impl DiscountAgreementStore for FixtureStore {
    fn find_discount_agreements(
        &self,
        query: &DiscountQuery,
    ) -> Result<Vec<DiscountAgreement>, RepositoryError> {
        self.agreement_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .agreements
            .iter()
            .filter(|a| query.matches(a))
            .cloned()
            .collect())
    }

    fn find_price_list(&self, price_list_no: PriceListNo) -> Result<Option<PriceList>, RepositoryError> {
        Ok(self.price_lists.get(&price_list_no).cloned())
    }

    fn find_discount_group(
        &self,
        discount_group_no: DiscountGroupNo,
    ) -> Result<Option<DiscountGroup>, RepositoryError> {
        Ok(self.discount_groups.get(&discount_group_no).cloned())
    }

    fn customers_with_discount_agreements(&self) -> Result<Vec<CustomerNo>, RepositoryError> {
        let mut customers: Vec<CustomerNo> = self
            .agreements
            .iter()
            .filter_map(|a| match a.source {
                DiscountSource::Customer(no) => Some(no),
                _ => None,
            })
            .collect();
        customers.sort();
        customers.dedup();
        Ok(customers)
    }
}
