//! Print the effective price of an article for a customer.
//!
//! Usage: `price <customer_no> <article_no> [YYYY-MM-DD]`
//!
//! Reads `DATABASE_URL` plus the `ERP_*` settings understood by
//! [`ErpConfig::from_env`].

use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::NaiveDate;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use erplink_core::{ArticleNo, CustomerNo};
use erplink_infra::{ErpConfig, InMemoryDiscountCache, PostgresErpStore};
use erplink_pricing::DiscountResolver;

fn main() -> anyhow::Result<()> {
    let config = ErpConfig::from_env()?;
    erplink_observability::init_with(config.log_format, erplink_observability::tracing::DEFAULT_FILTER);

    let mut args = std::env::args().skip(1);
    let (Some(customer_no), Some(article_no)) = (args.next(), args.next()) else {
        bail!("usage: price <customer_no> <article_no> [YYYY-MM-DD]");
    };
    let customer_no = CustomerNo::new(customer_no.parse().context("customer_no must be an integer")?);
    let article_no = ArticleNo::new(article_no);
    let at_date = args
        .next()
        .map(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d"))
        .transpose()
        .context("date must be YYYY-MM-DD")?;

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let pool = runtime
        .block_on(PgPoolOptions::new().max_connections(4).connect(&database_url))
        .context("connecting to the ERP database")?;
    let store = PostgresErpStore::with_handle(pool, &config, runtime.handle().clone());

    let resolver = DiscountResolver::new(store)
        .with_cache(Arc::new(InMemoryDiscountCache::new(config.cache_ttl())))
        .with_max_chain_depth(config.max_chain_depth);
    let selector = resolver.selector_for(customer_no)?;

    match at_date {
        None => {
            let (reason, price) = selector.explained_price_for(&article_no)?;
            info!(customer_no = %customer_no, article_no = %article_no, %reason, price, "price resolved");
            println!("{price}\t{reason}");
        }
        Some(at_date) => match selector.price_for(&article_no, Some(at_date))? {
            Some(price) => println!("{price}"),
            None => println!("no discount valid at {at_date}"),
        },
    }

    Ok(())
}
