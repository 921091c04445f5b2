use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use erplink_core::{
    CustomerNo, DiscountGroupNo, Entity, ModificationVersion, PriceListNo, ValueObject, Versioned,
};

/// Who receives the bill for a chain member (`TypeOfChain`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainType {
    /// The member is billed itself (any code other than `1`).
    MemberBilled,
    /// The chain head is billed on behalf of its members (code `1`).
    HeadBilled,
}

impl ChainType {
    pub fn from_code(code: i32) -> Self {
        if code == 1 {
            ChainType::HeadBilled
        } else {
            ChainType::MemberBilled
        }
    }

    pub fn code(self) -> i32 {
        match self {
            ChainType::MemberBilled => 0,
            ChainType::HeadBilled => 1,
        }
    }
}

/// Customer status lifecycle (`InActiveYesNo`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    Active,
    Inactive,
}

impl CustomerStatus {
    pub fn from_code(code: i32) -> Self {
        if code == 0 {
            CustomerStatus::Active
        } else {
            CustomerStatus::Inactive
        }
    }
}

/// Postal address fields stored on the customer row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalAddress {
    pub address1: String,
    pub address2: String,
    pub post_code: String,
    pub post_office: String,
}

impl ValueObject for PostalAddress {}

impl PostalAddress {
    /// Single-line rendering: `Address1, Address2, PostCode PostOffice`.
    ///
    /// Blank segments are skipped.
    pub fn one_line(&self) -> String {
        let place = format!("{} {}", self.post_code.trim(), self.post_office.trim());
        [self.address1.trim(), self.address2.trim(), place.trim()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Row of `CustomerInvoiceAdresses`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceAddress {
    pub invoice_address_no: i64,
    pub name: String,
    pub address: PostalAddress,
}

impl ValueObject for InvoiceAddress {}

/// Read-only view of an ERP customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub customer_no: CustomerNo,
    pub name: String,
    pub price_list_no: Option<PriceListNo>,
    pub discount_group_no: Option<DiscountGroupNo>,
    /// Raw `ChainNo`. `None`, or the customer's own number, means "no chain".
    pub chain_no: Option<CustomerNo>,
    pub chain_type: ChainType,
    pub status: CustomerStatus,
    pub postal: PostalAddress,
    pub invoice_address: Option<InvoiceAddress>,
    pub last_update: DateTime<Utc>,
}

impl Customer {
    /// A standalone, active customer with no price list, discount group or chain.
    pub fn new(customer_no: CustomerNo, name: impl Into<String>, last_update: DateTime<Utc>) -> Self {
        Self {
            customer_no,
            name: name.into(),
            price_list_no: None,
            discount_group_no: None,
            chain_no: None,
            chain_type: ChainType::MemberBilled,
            status: CustomerStatus::Active,
            postal: PostalAddress::default(),
            invoice_address: None,
            last_update,
        }
    }

    pub fn with_price_list(mut self, price_list_no: PriceListNo) -> Self {
        self.price_list_no = Some(price_list_no);
        self
    }

    pub fn with_discount_group(mut self, discount_group_no: DiscountGroupNo) -> Self {
        self.discount_group_no = Some(discount_group_no);
        self
    }

    pub fn with_chain(mut self, chain_no: CustomerNo, chain_type: ChainType) -> Self {
        self.chain_no = Some(chain_no);
        self.chain_type = chain_type;
        self
    }

    pub fn with_invoice_address(mut self, invoice_address: InvoiceAddress) -> Self {
        self.invoice_address = Some(invoice_address);
        self
    }

    /// The chain head this customer points at, if any.
    ///
    /// A customer referencing itself is a chain head, not a member.
    pub fn chain_ref(&self) -> Option<CustomerNo> {
        self.chain_no.filter(|no| *no != self.customer_no && no.get() != 0)
    }

    pub fn is_active(&self) -> bool {
        self.status == CustomerStatus::Active
    }

    /// Single-line postal address.
    pub fn address(&self) -> String {
        self.postal.one_line()
    }
}

impl Entity for Customer {
    type Id = CustomerNo;

    fn id(&self) -> &Self::Id {
        &self.customer_no
    }
}

impl Versioned for Customer {
    fn version(&self) -> ModificationVersion {
        ModificationVersion::new(self.last_update)
    }
}
