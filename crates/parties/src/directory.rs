use std::sync::Arc;

use erplink_core::{CustomerNo, RepositoryError};

use crate::customer::Customer;

/// Read access to the customer table.
///
/// Missing customers are `Ok(None)`; errors are reserved for storage failures.
pub trait CustomerDirectory: Send + Sync {
    /// Resolve a customer (or chain head) by number.
    fn find_customer(&self, customer_no: CustomerNo) -> Result<Option<Customer>, RepositoryError>;

    /// List the customers whose `ChainNo` points at `chain_no` (the head itself excluded).
    fn list_chain_members(&self, chain_no: CustomerNo) -> Result<Vec<Customer>, RepositoryError>;
}

impl<S> CustomerDirectory for Arc<S>
where
    S: CustomerDirectory + ?Sized,
{
    fn find_customer(&self, customer_no: CustomerNo) -> Result<Option<Customer>, RepositoryError> {
        (**self).find_customer(customer_no)
    }

    fn list_chain_members(&self, chain_no: CustomerNo) -> Result<Vec<Customer>, RepositoryError> {
        (**self).list_chain_members(chain_no)
    }
}
