//! Chain navigation: parent lookup, member listing and billing routing.

use tracing::warn;

use erplink_core::RepositoryError;

use crate::customer::{ChainType, Customer, InvoiceAddress};
use crate::directory::CustomerDirectory;

/// Invoice address that applies to `customer`.
///
/// With no chain head the customer's own address is used. With a head that is
/// billed on behalf of its members (`TypeOfChain == 1`) the head's address is
/// used; otherwise the customer's own.
pub fn current_invoice_address<'a>(
    customer: &'a Customer,
    chain_head: Option<&'a Customer>,
) -> Option<&'a InvoiceAddress> {
    billing_customer(customer, chain_head).invoice_address.as_ref()
}

/// Customer that receives the bill for `customer`.
pub fn billing_customer<'a>(customer: &'a Customer, chain_head: Option<&'a Customer>) -> &'a Customer {
    match chain_head {
        Some(head) if customer.chain_type == ChainType::HeadBilled => head,
        _ => customer,
    }
}

/// Resolves chain relations through a [`CustomerDirectory`].
pub struct ChainNavigator<'a, D: ?Sized> {
    directory: &'a D,
}

impl<'a, D> ChainNavigator<'a, D>
where
    D: CustomerDirectory + ?Sized,
{
    pub fn new(directory: &'a D) -> Self {
        Self { directory }
    }

    /// The chain head of `customer`, or `None` when it has no chain or the
    /// referenced head does not exist.
    pub fn chain_head(&self, customer: &Customer) -> Result<Option<Customer>, RepositoryError> {
        let Some(chain_no) = customer.chain_ref() else {
            return Ok(None);
        };

        let head = self.directory.find_customer(chain_no)?;
        if head.is_none() {
            warn!(
                customer_no = %customer.customer_no,
                chain_no = %chain_no,
                "chain head not found; treating customer as unaffiliated"
            );
        }
        Ok(head)
    }

    /// Customers pointing at `head` as their chain.
    pub fn chain_members(&self, head: &Customer) -> Result<Vec<Customer>, RepositoryError> {
        let members = self.directory.list_chain_members(head.customer_no)?;
        Ok(members
            .into_iter()
            .filter(|m| m.customer_no != head.customer_no)
            .collect())
    }

    pub fn current_invoice_address(
        &self,
        customer: &Customer,
    ) -> Result<Option<InvoiceAddress>, RepositoryError> {
        let head = self.chain_head(customer)?;
        Ok(current_invoice_address(customer, head.as_ref()).cloned())
    }

    pub fn billing_customer(&self, customer: &Customer) -> Result<Customer, RepositoryError> {
        let head = self.chain_head(customer)?;
        Ok(billing_customer(customer, head.as_ref()).clone())
    }
}
