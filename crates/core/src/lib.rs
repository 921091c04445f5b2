//! `erplink-core` - shared building blocks for the ERP integration layer.
//!
//! This crate contains **pure domain** primitives (no storage concerns): the
//! natural business identifiers used by the legacy tables, the error model and
//! the small traits every entity view implements.

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;
pub mod version;

pub use entity::Entity;
pub use error::{DomainError, DomainResult, RepositoryError};
pub use id::{ArticleGroupNo, ArticleNo, CustomerNo, DiscountGroupNo, OrderNo, PriceListNo};
pub use value_object::ValueObject;
pub use version::{ModificationVersion, Versioned};
