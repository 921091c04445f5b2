use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use erplink_core::{ArticleNo, CustomerNo, DiscountGroupNo, OrderNo, PriceListNo, RepositoryError};
use erplink_parties::{Customer, CustomerDirectory};
use erplink_pricing::{
    DiscountAgreement, DiscountAgreementStore, DiscountGroup, DiscountQuery, DiscountSource, PriceList,
};
use erplink_products::{Article, ArticleCatalog};
use erplink_sales::{CustomerOrder, OrderLine, OrderStore, SeqNo};

/// In-memory ERP tables.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryErpStore {
    customers: RwLock<HashMap<CustomerNo, Customer>>,
    articles: RwLock<HashMap<ArticleNo, Article>>,
    agreements: RwLock<Vec<DiscountAgreement>>,
    price_lists: RwLock<HashMap<PriceListNo, PriceList>>,
    discount_groups: RwLock<HashMap<DiscountGroupNo, DiscountGroup>>,
    orders: RwLock<HashMap<OrderNo, CustomerOrder>>,
    agreement_queries: AtomicU64,
}

fn poisoned<T>(_: T) -> RepositoryError {
    RepositoryError::LockPoisoned("in-memory erp store")
}

impl InMemoryErpStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_customer(&self, customer: Customer) -> Result<(), RepositoryError> {
        self.customers
            .write()
            .map_err(poisoned)?
            .insert(customer.customer_no, customer);
        Ok(())
    }

    pub fn upsert_article(&self, article: Article) -> Result<(), RepositoryError> {
        self.articles
            .write()
            .map_err(poisoned)?
            .insert(article.article_no.clone(), article);
        Ok(())
    }

    /// Agreements are an append-only table; identical rows are kept once.
    pub fn insert_agreement(&self, agreement: DiscountAgreement) -> Result<(), RepositoryError> {
        let mut agreements = self.agreements.write().map_err(poisoned)?;
        if !agreements.contains(&agreement) {
            agreements.push(agreement);
        }
        Ok(())
    }

    pub fn upsert_price_list(&self, price_list: PriceList) -> Result<(), RepositoryError> {
        self.price_lists
            .write()
            .map_err(poisoned)?
            .insert(price_list.price_list_no, price_list);
        Ok(())
    }

    pub fn upsert_discount_group(&self, group: DiscountGroup) -> Result<(), RepositoryError> {
        self.discount_groups
            .write()
            .map_err(poisoned)?
            .insert(group.discount_group_no, group);
        Ok(())
    }

    pub fn upsert_order(&self, order: CustomerOrder) -> Result<(), RepositoryError> {
        self.orders
            .write()
            .map_err(poisoned)?
            .insert(order.order_no, order);
        Ok(())
    }

    /// Number of agreement queries served so far.
    pub fn agreement_queries(&self) -> u64 {
        self.agreement_queries.load(Ordering::Relaxed)
    }
}

impl CustomerDirectory for InMemoryErpStore {
    fn find_customer(&self, customer_no: CustomerNo) -> Result<Option<Customer>, RepositoryError> {
        let customers = self.customers.read().map_err(poisoned)?;
        Ok(customers.get(&customer_no).cloned())
    }

    fn list_chain_members(&self, chain_no: CustomerNo) -> Result<Vec<Customer>, RepositoryError> {
        let customers = self.customers.read().map_err(poisoned)?;
        let mut members: Vec<Customer> = customers
            .values()
            .filter(|c| c.chain_ref() == Some(chain_no))
            .cloned()
            .collect();
        members.sort_by_key(|c| c.customer_no);
        Ok(members)
    }
}

impl ArticleCatalog for InMemoryErpStore {
    fn find_article(&self, article_no: &ArticleNo) -> Result<Option<Article>, RepositoryError> {
        let articles = self.articles.read().map_err(poisoned)?;
        Ok(articles.get(article_no).cloned())
    }
}

impl DiscountAgreementStore for InMemoryErpStore {
    fn find_discount_agreements(
        &self,
        query: &DiscountQuery,
    ) -> Result<Vec<DiscountAgreement>, RepositoryError> {
        self.agreement_queries.fetch_add(1, Ordering::Relaxed);
        let agreements = self.agreements.read().map_err(poisoned)?;
        Ok(agreements.iter().filter(|a| query.matches(a)).cloned().collect())
    }

    fn find_price_list(&self, price_list_no: PriceListNo) -> Result<Option<PriceList>, RepositoryError> {
        let price_lists = self.price_lists.read().map_err(poisoned)?;
        Ok(price_lists.get(&price_list_no).cloned())
    }

    fn find_discount_group(
        &self,
        discount_group_no: DiscountGroupNo,
    ) -> Result<Option<DiscountGroup>, RepositoryError> {
        let groups = self.discount_groups.read().map_err(poisoned)?;
        Ok(groups.get(&discount_group_no).cloned())
    }

    fn customers_with_discount_agreements(&self) -> Result<Vec<CustomerNo>, RepositoryError> {
        let agreements = self.agreements.read().map_err(poisoned)?;
        let mut customers: Vec<CustomerNo> = agreements
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

impl OrderStore for InMemoryErpStore {
    fn find_order(&self, order_no: OrderNo) -> Result<Option<CustomerOrder>, RepositoryError> {
        let orders = self.orders.read().map_err(poisoned)?;
        Ok(orders.get(&order_no).cloned())
    }

    fn order_line_seq_nos(&self, order_no: OrderNo) -> Result<Vec<SeqNo>, RepositoryError> {
        let orders = self.orders.read().map_err(poisoned)?;
        Ok(orders.get(&order_no).map(CustomerOrder::seq_nos).unwrap_or_default())
    }

    fn insert_order_line(&self, order_no: OrderNo, line: &OrderLine) -> Result<(), RepositoryError> {
        let mut orders = self.orders.write().map_err(poisoned)?;
        let order = orders
            .get_mut(&order_no)
            .ok_or_else(|| RepositoryError::storage(format!("order {order_no} does not exist")))?;

        if let Some(seq_no) = &line.seq_no
            && order.lines.iter().any(|l| l.seq_no.as_ref() == Some(seq_no))
        {
            return Err(RepositoryError::UniqueViolation(format!(
                "order {order_no} already has a line with SeqNo {seq_no}"
            )));
        }

        order.lines.push(line.clone());
        Ok(())
    }
}
