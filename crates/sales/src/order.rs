use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use erplink_core::{
    ArticleNo, CustomerNo, DomainError, Entity, ModificationVersion, OrderNo, RepositoryError,
    Versioned,
};
use erplink_pricing::{DiscountCache, PriceSelector, PricingError, PricingRepository};

use crate::sequence::{SeqNo, Sequenced, set_sequence};

/// `OrderStatus` column. Codes outside the named set are kept verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    SystemInvoiced,
    UserInvoiced,
    Nullified,
    ForPicking,
    Other(i32),
}

impl OrderStatus {
    pub fn from_code(code: i32) -> Self {
        match code {
            1030 => OrderStatus::SystemInvoiced,
            1000 => OrderStatus::UserInvoiced,
            -1 => OrderStatus::Nullified,
            1015 => OrderStatus::ForPicking,
            other => OrderStatus::Other(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            OrderStatus::SystemInvoiced => 1030,
            OrderStatus::UserInvoiced => 1000,
            OrderStatus::Nullified => -1,
            OrderStatus::ForPicking => 1015,
            OrderStatus::Other(code) => code,
        }
    }

    pub fn is_invoiced(self) -> bool {
        matches!(self, OrderStatus::SystemInvoiced | OrderStatus::UserInvoiced)
    }
}

/// Order line as stored: article, quantity, unit price and its sibling `SeqNo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub seq_no: Option<SeqNo>,
    pub article_no: ArticleNo,
    pub quantity: i64,
    /// Price in smallest currency unit (e.g., øre/cents).
    pub unit_price: u64,
    /// Price reason label the unit price was chosen by, when priced by the selector.
    pub price_reason: Option<String>,
}

impl OrderLine {
    pub fn new(article_no: ArticleNo, quantity: i64, unit_price: u64) -> Self {
        Self {
            seq_no: None,
            article_no,
            quantity,
            unit_price,
            price_reason: None,
        }
    }

    /// Line priced for the order's customer by the selector.
    pub fn priced<R, C>(
        selector: &PriceSelector<'_, R, C>,
        article_no: ArticleNo,
        quantity: i64,
    ) -> Result<Self, PricingError>
    where
        R: PricingRepository,
        C: DiscountCache,
    {
        let (reason, unit_price) = selector.explained_price_for(&article_no)?;
        Ok(Self {
            price_reason: Some(reason.to_string()),
            ..Self::new(article_no, quantity, unit_price)
        })
    }

    pub fn line_total(&self) -> u64 {
        self.unit_price.saturating_mul(self.quantity.unsigned_abs())
    }
}

impl Sequenced for OrderLine {
    fn seq_no(&self) -> Option<&SeqNo> {
        self.seq_no.as_ref()
    }

    fn assign_seq_no(&mut self, seq_no: SeqNo) {
        self.seq_no = Some(seq_no);
    }
}

/// `CustomerOrder` row with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerOrder {
    pub order_no: OrderNo,
    pub customer_no: CustomerNo,
    pub chain_no: Option<CustomerNo>,
    pub status: OrderStatus,
    /// `OurRef`: name of the responsible employee.
    pub our_reference: Option<String>,
    pub lines: Vec<OrderLine>,
    pub last_update: DateTime<Utc>,
}

impl CustomerOrder {
    pub fn new(order_no: OrderNo, customer_no: CustomerNo, status: OrderStatus, last_update: DateTime<Utc>) -> Self {
        Self {
            order_no,
            customer_no,
            chain_no: None,
            status,
            our_reference: None,
            lines: Vec::new(),
            last_update,
        }
    }

    pub fn with_chain(mut self, chain_no: CustomerNo) -> Self {
        self.chain_no = Some(chain_no);
        self
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    /// Invoiced and nullified orders are frozen.
    pub fn is_modifiable(&self) -> bool {
        !self.status.is_invoiced() && self.status != OrderStatus::Nullified
    }

    pub fn seq_nos(&self) -> Vec<SeqNo> {
        self.lines.iter().filter_map(|l| l.seq_no.clone()).collect()
    }

    /// Append `line`, numbering it after the existing lines.
    pub fn add_line(&mut self, mut line: OrderLine) -> Result<&OrderLine, DomainError> {
        if !self.is_modifiable() {
            return Err(DomainError::invariant(format!(
                "order {} cannot be modified in status {}",
                self.order_no,
                self.status.code()
            )));
        }
        if line.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }

        set_sequence(&mut line, &self.seq_nos());
        self.lines.push(line);
        Ok(&self.lines[self.lines.len() - 1])
    }

    pub fn total(&self) -> u64 {
        self.lines
            .iter()
            .fold(0u64, |acc, l| acc.saturating_add(l.line_total()))
    }
}

impl Entity for CustomerOrder {
    type Id = OrderNo;

    fn id(&self) -> &Self::Id {
        &self.order_no
    }
}

impl Versioned for CustomerOrder {
    fn version(&self) -> ModificationVersion {
        ModificationVersion::new(self.last_update)
    }
}

/// Order storage used by the sequence allocator.
pub trait OrderStore: Send + Sync {
    fn find_order(&self, order_no: OrderNo) -> Result<Option<CustomerOrder>, RepositoryError>;

    /// Stored `SeqNo` values of the order's lines.
    fn order_line_seq_nos(&self, order_no: OrderNo) -> Result<Vec<SeqNo>, RepositoryError>;

    /// Insert a numbered line. A taken `SeqNo` is [`RepositoryError::UniqueViolation`].
    fn insert_order_line(&self, order_no: OrderNo, line: &OrderLine) -> Result<(), RepositoryError>;
}

impl<S> OrderStore for Arc<S>
where
    S: OrderStore + ?Sized,
{
    fn find_order(&self, order_no: OrderNo) -> Result<Option<CustomerOrder>, RepositoryError> {
        (**self).find_order(order_no)
    }

    fn order_line_seq_nos(&self, order_no: OrderNo) -> Result<Vec<SeqNo>, RepositoryError> {
        (**self).order_line_seq_nos(order_no)
    }

    fn insert_order_line(&self, order_no: OrderNo, line: &OrderLine) -> Result<(), RepositoryError> {
        (**self).insert_order_line(order_no, line)
    }
}
