//! Parties module: ERP customers and the chains that group them.
//!
//! Customers are read-only views over the legacy `Customer` table. A customer
//! may head a chain, belong to one, or stand alone; [`chain`] decides who is
//! billed and which invoice address applies.

pub mod chain;
pub mod customer;
pub mod directory;

pub use chain::{ChainNavigator, billing_customer, current_invoice_address};
pub use customer::{ChainType, Customer, CustomerStatus, InvoiceAddress, PostalAddress};
pub use directory::CustomerDirectory;
