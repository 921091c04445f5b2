//! Repository adapters for the legacy ERP tables.
//!
//! Both adapters implement every repository trait the domain crates define:
//! [`CustomerDirectory`](erplink_parties::CustomerDirectory),
//! [`ArticleCatalog`](erplink_products::ArticleCatalog),
//! [`DiscountAgreementStore`](erplink_pricing::DiscountAgreementStore) and
//! [`OrderStore`](erplink_sales::OrderStore).

pub mod in_memory;
pub mod postgres;
pub mod sql;

pub use in_memory::InMemoryErpStore;
pub use postgres::PostgresErpStore;
