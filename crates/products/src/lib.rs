//! Products module: ERP articles and their base prices.
//!
//! Articles are immutable for the duration of a price resolution; this crate
//! only exposes the read-only view and the catalog lookup.

pub mod article;

pub use article::{Article, ArticleCatalog};
