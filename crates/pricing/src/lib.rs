//! Pricing module: discount resolution and price selection.
//!
//! Given a customer, an article and an as-of date, the [`DiscountResolver`]
//! collects every discount agreement reachable through the customer's own
//! discount sources (customer number, price list, discount group) and through
//! its chain heads. The [`PriceSelector`] ranks those agreements against the
//! article's base price and explains which source won.
//!
//! Storage and caching are collaborators behind traits
//! ([`PricingRepository`], [`DiscountCache`]); this crate performs no IO.

pub mod agreement;
pub mod cache;
pub mod clock;
pub mod error;
pub mod holder;
pub mod reason;
pub mod repository;
pub mod resolver;
pub mod selector;
pub mod sources;

#[cfg(test)]
pub(crate) mod fixtures;

pub use agreement::{
    DiscountAgreement, DiscountSet, DiscountSource, DiscountSourceKind, DiscountTarget,
    DiscountTerms,
};
pub use cache::{DiscountCache, DiscountCacheKey, NoCache};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{PricingError, PricingResult};
pub use holder::{DiscountGroup, DiscountHolder, PriceList};
pub use reason::PriceReason;
pub use repository::{DiscountAgreementStore, PricingRepository};
pub use resolver::{DEFAULT_MAX_CHAIN_DEPTH, DiscountResolver};
pub use selector::{PriceRecord, PriceSelector, Prices};
pub use sources::{DiscountQuery, DiscountSources};
