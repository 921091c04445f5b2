use std::sync::Arc;

use erplink_core::{CustomerNo, DiscountGroupNo, PriceListNo, RepositoryError};
use erplink_parties::CustomerDirectory;
use erplink_products::ArticleCatalog;

use crate::agreement::DiscountAgreement;
use crate::holder::{DiscountGroup, PriceList};
use crate::sources::DiscountQuery;

/// Read access to discount agreements and the entities that own them.
pub trait DiscountAgreementStore: Send + Sync {
    /// Agreements matching [`DiscountQuery::matches`]. Order is irrelevant.
    fn find_discount_agreements(
        &self,
        query: &DiscountQuery,
    ) -> Result<Vec<DiscountAgreement>, RepositoryError>;

    fn find_price_list(&self, price_list_no: PriceListNo) -> Result<Option<PriceList>, RepositoryError>;

    fn find_discount_group(
        &self,
        discount_group_no: DiscountGroupNo,
    ) -> Result<Option<DiscountGroup>, RepositoryError>;

    /// Customers with at least one agreement keyed on their own number.
    fn customers_with_discount_agreements(&self) -> Result<Vec<CustomerNo>, RepositoryError>;
}

impl<S> DiscountAgreementStore for Arc<S>
where
    S: DiscountAgreementStore + ?Sized,
{
    fn find_discount_agreements(
        &self,
        query: &DiscountQuery,
    ) -> Result<Vec<DiscountAgreement>, RepositoryError> {
        (**self).find_discount_agreements(query)
    }

    fn find_price_list(&self, price_list_no: PriceListNo) -> Result<Option<PriceList>, RepositoryError> {
        (**self).find_price_list(price_list_no)
    }

    fn find_discount_group(
        &self,
        discount_group_no: DiscountGroupNo,
    ) -> Result<Option<DiscountGroup>, RepositoryError> {
        (**self).find_discount_group(discount_group_no)
    }

    fn customers_with_discount_agreements(&self) -> Result<Vec<CustomerNo>, RepositoryError> {
        (**self).customers_with_discount_agreements()
    }
}

/// Everything the resolver reads.
pub trait PricingRepository: CustomerDirectory + ArticleCatalog + DiscountAgreementStore {}

impl<T> PricingRepository for T where T: CustomerDirectory + ArticleCatalog + DiscountAgreementStore + ?Sized {}
