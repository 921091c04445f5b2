//! Postgres-backed adapter for the legacy ERP tables.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | RepositoryError |
//! |------------|----------------------|-----------------|
//! | Database (unique violation) | `23505` | `UniqueViolation` |
//! | Database (other) | Any other | `Storage` |
//! | Column decode failure | N/A | `MalformedRow` |
//! | Other | N/A | `Storage` |
//!
//! ## Sync facade
//!
//! The repository traits are synchronous. Each trait method drives the async
//! query on the runtime handle captured at construction, so callers must not
//! be running on that runtime's worker threads themselves.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tokio::runtime::Handle;
use tracing::instrument;

use erplink_core::{
    ArticleGroupNo, ArticleNo, CustomerNo, DiscountGroupNo, OrderNo, PriceListNo, RepositoryError,
};
use erplink_parties::{
    ChainType, Customer, CustomerDirectory, CustomerStatus, InvoiceAddress, PostalAddress,
};
use erplink_pricing::{
    DiscountAgreement, DiscountAgreementStore, DiscountGroup, DiscountQuery, DiscountSource,
    DiscountTarget, DiscountTerms, PriceList,
};
use erplink_products::{Article, ArticleCatalog};
use erplink_sales::{
    CustomerOrder, OrderLine, OrderStatus, OrderStore, SeqNo, SequenceError, next_seq_no_from,
};

use super::sql;
use crate::config::{ErpConfig, TableNames};

/// Postgres adapter implementing every repository trait.
#[derive(Debug, Clone)]
pub struct PostgresErpStore {
    pool: Arc<PgPool>,
    tables: TableNames,
    handle: Handle,
}

impl PostgresErpStore {
    /// Create a store on the current tokio runtime.
    pub fn new(pool: PgPool, config: &ErpConfig) -> Result<Self, RepositoryError> {
        let handle = Handle::try_current().map_err(|_| {
            RepositoryError::storage(
                "PostgresErpStore requires a tokio runtime; construct it inside Runtime::enter()",
            )
        })?;
        Ok(Self::with_handle(pool, config, handle))
    }

    pub fn with_handle(pool: PgPool, config: &ErpConfig, handle: Handle) -> Self {
        Self {
            pool: Arc::new(pool),
            tables: config.tables(),
            handle,
        }
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    fn block_on<F, T>(&self, future: F) -> T
    where
        F: Future<Output = T>,
    {
        self.handle.block_on(future)
    }

    #[instrument(skip(self), fields(customer_no = %customer_no), err)]
    pub async fn fetch_customer(&self, customer_no: CustomerNo) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query(&sql::customer_by_no(&self.tables))
            .bind(customer_no.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_customer", e))?;
        row.map(|r| self.customer_from_row(&r)).transpose()
    }

    #[instrument(skip(self), fields(chain_no = %chain_no), err)]
    pub async fn fetch_chain_members(&self, chain_no: CustomerNo) -> Result<Vec<Customer>, RepositoryError> {
        let rows = sqlx::query(&sql::chain_members(&self.tables))
            .bind(chain_no.get())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_chain_members", e))?;
        rows.iter().map(|r| self.customer_from_row(r)).collect()
    }

    #[instrument(skip(self), fields(article_no = %article_no), err)]
    pub async fn fetch_article(&self, article_no: &ArticleNo) -> Result<Option<Article>, RepositoryError> {
        let row = sqlx::query(&sql::article_by_no(&self.tables))
            .bind(article_no.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_article", e))?;
        row.map(|r| self.article_from_row(&r)).transpose()
    }

    #[instrument(
        skip(self, query),
        fields(article_no = %query.article_no, at_date = %query.at_date, sources = query.sources.as_slice().len()),
        err
    )]
    pub async fn fetch_discount_agreements(
        &self,
        query: &DiscountQuery,
    ) -> Result<Vec<DiscountAgreement>, RepositoryError> {
        let mut builder = sql::discount_agreements(&self.tables, query);
        let rows = builder
            .build()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_discount_agreements", e))?;

        let mut agreements = Vec::with_capacity(rows.len());
        for row in &rows {
            agreements.push(self.agreement_from_row(row)?);
        }
        Ok(agreements)
    }

    pub async fn fetch_price_list(&self, price_list_no: PriceListNo) -> Result<Option<PriceList>, RepositoryError> {
        let row = sqlx::query(&sql::price_list_by_no(&self.tables))
            .bind(price_list_no.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_price_list", e))?;
        row.map(|r| -> Result<PriceList, RepositoryError> {
            Ok(PriceList {
                price_list_no,
                name: get(&r, &self.tables.price_list, "Name")?,
            })
        })
        .transpose()
    }

    pub async fn fetch_discount_group(
        &self,
        discount_group_no: DiscountGroupNo,
    ) -> Result<Option<DiscountGroup>, RepositoryError> {
        let row = sqlx::query(&sql::discount_group_by_no(&self.tables))
            .bind(discount_group_no.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_discount_group", e))?;
        row.map(|r| -> Result<DiscountGroup, RepositoryError> {
            Ok(DiscountGroup {
                discount_group_no,
                name: get(&r, &self.tables.discount_group, "Name")?,
            })
        })
        .transpose()
    }

    pub async fn fetch_customers_with_agreements(&self) -> Result<Vec<CustomerNo>, RepositoryError> {
        let rows = sqlx::query(&sql::customers_with_agreements(&self.tables))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_customers_with_agreements", e))?;
        rows.iter()
            .map(|r| get::<i64>(r, &self.tables.discount_agreement, "CustomerNo").map(CustomerNo::new))
            .collect()
    }

    #[instrument(skip(self), fields(order_no = %order_no), err)]
    pub async fn fetch_order(&self, order_no: OrderNo) -> Result<Option<CustomerOrder>, RepositoryError> {
        let Some(row) = sqlx::query(&sql::order_by_no(&self.tables))
            .bind(order_no.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_order", e))?
        else {
            return Ok(None);
        };

        let table = &self.tables.customer_order;
        let mut order = CustomerOrder::new(
            order_no,
            CustomerNo::new(get(&row, table, "CustomerNo")?),
            OrderStatus::from_code(get(&row, table, "OrderStatus")?),
            get(&row, table, "LastUpdate")?,
        );
        order.chain_no = CustomerNo::from_legacy(get::<Option<i64>>(&row, table, "ChainNo")?.unwrap_or(0));
        order.our_reference = get::<Option<String>>(&row, table, "OurRef")?.filter(|s| !s.trim().is_empty());

        let lines = sqlx::query(&sql::order_lines(&self.tables))
            .bind(order_no.get())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_order_lines", e))?;
        let table = &self.tables.customer_order_line;
        for line in &lines {
            let quantity: Decimal = get(line, table, "Quantity")?;
            let price: Decimal = get(line, table, "Price")?;
            order.lines.push(OrderLine {
                seq_no: get::<Option<String>>(line, table, "SeqNo")?.map(SeqNo::from_stored),
                article_no: ArticleNo::new(get::<String>(line, table, "ArticleNo")?),
                quantity: quantity.round().to_i64().unwrap_or(0),
                unit_price: to_minor_units(table, "Price", price)?,
                price_reason: None,
            });
        }
        Ok(Some(order))
    }

    pub async fn fetch_order_line_seq_nos(&self, order_no: OrderNo) -> Result<Vec<SeqNo>, RepositoryError> {
        let rows = sqlx::query(&sql::order_line_seq_nos(&self.tables))
            .bind(order_no.get())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_order_line_seq_nos", e))?;
        let table = &self.tables.customer_order_line;
        collect_seq_nos(rows.iter().map(|r| get::<Option<String>>(r, table, "SeqNo")))
    }

    pub async fn store_order_line(&self, order_no: OrderNo, line: &OrderLine) -> Result<(), RepositoryError> {
        sqlx::query(&sql::insert_order_line(&self.tables))
            .bind(order_no.get())
            .bind(line.seq_no.as_ref().map(|s| s.as_str().to_string()))
            .bind(line.article_no.as_str())
            .bind(Decimal::from(line.quantity))
            .bind(from_minor_units(line.unit_price))
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("store_order_line", e))?;
        Ok(())
    }

    /// Number and insert a line in one transaction, holding the order row lock.
    ///
    /// Writers in other processes serialize on the lock; a unique violation on
    /// `(OrderNo, SeqNo)` still surfaces as [`SequenceError::ConcurrentConflict`].
    #[instrument(skip(self, line), fields(order_no = %order_no), err)]
    pub async fn allocate_order_line(&self, order_no: OrderNo, mut line: OrderLine) -> Result<OrderLine, SequenceError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("allocate_order_line", e))?;

        sqlx::query(&sql::lock_order(&self.tables))
            .bind(order_no.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_order", e))?
            .ok_or_else(|| RepositoryError::storage(format!("order {order_no} does not exist")))?;

        let table = self.tables.customer_order_line.clone();
        let siblings = sqlx::query(&sql::order_line_seq_nos(&self.tables))
            .bind(order_no.get())
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("order_line_seq_nos", e))
            .and_then(|rows| collect_seq_nos(rows.iter().map(|r| get::<Option<String>>(r, &table, "SeqNo"))));
        let seq_no = next_seq_no_from(siblings);
        line.seq_no = Some(seq_no.clone());

        let inserted = sqlx::query(&sql::insert_order_line(&self.tables))
            .bind(order_no.get())
            .bind(seq_no.as_str())
            .bind(line.article_no.as_str())
            .bind(Decimal::from(line.quantity))
            .bind(from_minor_units(line.unit_price))
            .execute(&mut *tx)
            .await;

        match inserted.map_err(|e| map_sqlx_error("allocate_order_line", e)) {
            Ok(_) => {}
            Err(RepositoryError::UniqueViolation(_)) => {
                return Err(SequenceError::ConcurrentConflict {
                    scope: format!("order {order_no}"),
                    seq_no,
                });
            }
            Err(other) => return Err(other.into()),
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("allocate_order_line", e))?;
        Ok(line)
    }

    fn customer_from_row(&self, row: &PgRow) -> Result<Customer, RepositoryError> {
        let table = &self.tables.customer;
        let legacy = |column: &str| -> Result<i64, RepositoryError> {
            Ok(get::<Option<i64>>(row, table, column)?.unwrap_or(0))
        };
        let text = |column: &str| -> Result<String, RepositoryError> {
            Ok(get::<Option<String>>(row, table, column)?.unwrap_or_default())
        };

        let last_update: DateTime<Utc> = get(row, table, "LastUpdate")?;
        let mut customer = Customer::new(CustomerNo::new(get(row, table, "CustomerNo")?), text("Name")?, last_update);
        customer.price_list_no = PriceListNo::from_legacy(legacy("PriceListNo")?);
        customer.discount_group_no = DiscountGroupNo::from_legacy(legacy("DiscountGrpCustNo")?);
        customer.chain_no = CustomerNo::from_legacy(legacy("ChainNo")?);
        customer.chain_type = ChainType::from_code(legacy("TypeOfChain")? as i32);
        customer.status = CustomerStatus::from_code(legacy("InActiveYesNo")? as i32);
        customer.postal = PostalAddress {
            address1: text("Address1")?,
            address2: text("Address2")?,
            post_code: text("PostCode")?,
            post_office: text("PostOffice")?,
        };

        let invoice_address_no = legacy("InvoiceAdressNo")?;
        if invoice_address_no != 0 && get::<Option<String>>(row, table, "InvoiceName")?.is_some() {
            customer.invoice_address = Some(InvoiceAddress {
                invoice_address_no,
                name: text("InvoiceName")?,
                address: PostalAddress {
                    address1: text("InvoiceAddress1")?,
                    address2: text("InvoiceAddress2")?,
                    post_code: text("InvoicePostCode")?,
                    post_office: text("InvoicePostOffice")?,
                },
            });
        }
        Ok(customer)
    }

    fn article_from_row(&self, row: &PgRow) -> Result<Article, RepositoryError> {
        let table = &self.tables.article;
        let price: Decimal = get::<Option<Decimal>>(row, table, "Price1")?.unwrap_or(Decimal::ZERO);
        let mut article = Article::new(
            ArticleNo::new(get::<String>(row, table, "ArticleNo")?),
            get::<Option<String>>(row, table, "Name")?.unwrap_or_default(),
            to_minor_units(table, "Price1", price)?,
        );
        article.article_group =
            ArticleGroupNo::from_legacy(get::<Option<i64>>(row, table, "DiscountGrpArtNo")?.unwrap_or(0));
        Ok(article)
    }

    fn agreement_from_row(&self, row: &PgRow) -> Result<DiscountAgreement, RepositoryError> {
        let table = &self.tables.discount_agreement;
        let legacy = |column: &str| -> Result<i64, RepositoryError> {
            Ok(get::<Option<i64>>(row, table, column)?.unwrap_or(0))
        };

        let source = if let Some(no) = CustomerNo::from_legacy(legacy("CustomerNo")?) {
            DiscountSource::Customer(no)
        } else if let Some(no) = PriceListNo::from_legacy(legacy("PriceListNo")?) {
            DiscountSource::PriceList(no)
        } else if let Some(no) = DiscountGroupNo::from_legacy(legacy("DiscountGrpCustNo")?) {
            DiscountSource::DiscountGroup(no)
        } else {
            return Err(RepositoryError::malformed(table, "agreement has no discount source"));
        };

        let article_no = get::<Option<String>>(row, table, "ArticleNo")?.filter(|a| !a.trim().is_empty());
        let target = match (article_no, ArticleGroupNo::from_legacy(legacy("DiscountGrpArtNo")?)) {
            (Some(article_no), _) => DiscountTarget::Article(ArticleNo::new(article_no)),
            (None, Some(group)) => DiscountTarget::ArticleGroup(group),
            (None, None) => {
                return Err(RepositoryError::malformed(table, "agreement has no article or article group"));
            }
        };

        let price = get::<Option<Decimal>>(row, table, "Price")?.filter(|p| !p.is_zero());
        let terms = match price {
            Some(price) => DiscountTerms::FixedPrice(to_minor_units(table, "Price", price)?),
            None => DiscountTerms::Percent(get::<Option<Decimal>>(row, table, "DiscountPercent")?.unwrap_or_default()),
        };

        Ok(DiscountAgreement::new(
            source,
            target,
            get::<NaiveDate>(row, table, "FromDate")?,
            get::<Option<NaiveDate>>(row, table, "ToDate")?,
            terms,
        ))
    }
}

fn get<'r, T>(row: &'r PgRow, table: &str, column: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column)
        .map_err(|e| RepositoryError::malformed(table, format!("{column}: {e}")))
}

/// Sibling `SeqNo` values; lines without one are skipped, undecodable ones fail the read.
pub(crate) fn collect_seq_nos<I>(values: I) -> Result<Vec<SeqNo>, RepositoryError>
where
    I: IntoIterator<Item = Result<Option<String>, RepositoryError>>,
{
    let mut seq_nos = Vec::new();
    for value in values {
        if let Some(stored) = value? {
            seq_nos.push(SeqNo::from_stored(stored));
        }
    }
    Ok(seq_nos)
}

/// Legacy prices are stored as decimal currency amounts.
pub(crate) fn to_minor_units(table: &str, column: &str, amount: Decimal) -> Result<u64, RepositoryError> {
    (amount * Decimal::ONE_HUNDRED)
        .round()
        .to_u64()
        .ok_or_else(|| RepositoryError::malformed(table, format!("{column}: {amount} is not a price")))
}

pub(crate) fn from_minor_units(minor: u64) -> Decimal {
    Decimal::from(minor) / Decimal::ONE_HUNDRED
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => RepositoryError::UniqueViolation(msg),
                _ => RepositoryError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => RepositoryError::storage(format!("connection pool closed in {operation}")),
        other => RepositoryError::storage(format!("sqlx error in {operation}: {other}")),
    }
}

impl CustomerDirectory for PostgresErpStore {
    fn find_customer(&self, customer_no: CustomerNo) -> Result<Option<Customer>, RepositoryError> {
        self.block_on(self.fetch_customer(customer_no))
    }

    fn list_chain_members(&self, chain_no: CustomerNo) -> Result<Vec<Customer>, RepositoryError> {
        self.block_on(self.fetch_chain_members(chain_no))
    }
}

impl ArticleCatalog for PostgresErpStore {
    fn find_article(&self, article_no: &ArticleNo) -> Result<Option<Article>, RepositoryError> {
        self.block_on(self.fetch_article(article_no))
    }
}

impl DiscountAgreementStore for PostgresErpStore {
    fn find_discount_agreements(&self, query: &DiscountQuery) -> Result<Vec<DiscountAgreement>, RepositoryError> {
        self.block_on(self.fetch_discount_agreements(query))
    }

    fn find_price_list(&self, price_list_no: PriceListNo) -> Result<Option<PriceList>, RepositoryError> {
        self.block_on(self.fetch_price_list(price_list_no))
    }

    fn find_discount_group(
        &self,
        discount_group_no: DiscountGroupNo,
    ) -> Result<Option<DiscountGroup>, RepositoryError> {
        self.block_on(self.fetch_discount_group(discount_group_no))
    }

    fn customers_with_discount_agreements(&self) -> Result<Vec<CustomerNo>, RepositoryError> {
        self.block_on(self.fetch_customers_with_agreements())
    }
}

impl OrderStore for PostgresErpStore {
    fn find_order(&self, order_no: OrderNo) -> Result<Option<CustomerOrder>, RepositoryError> {
        self.block_on(self.fetch_order(order_no))
    }

    fn order_line_seq_nos(&self, order_no: OrderNo) -> Result<Vec<SeqNo>, RepositoryError> {
        self.block_on(self.fetch_order_line_seq_nos(order_no))
    }

    fn insert_order_line(&self, order_no: OrderNo, line: &OrderLine) -> Result<(), RepositoryError> {
        self.block_on(self.store_order_line(order_no, line))
    }
}
