//! Customer orders and sibling sequence numbering.
//!
//! Plain domain logic: order lines are numbered with legacy `SeqNo` values and
//! may be priced through [`erplink_pricing::PriceSelector`]. Locking around
//! concurrent allocation lives with the storage adapters.

pub mod order;
pub mod sequence;

pub use order::{CustomerOrder, OrderLine, OrderStatus, OrderStore};
pub use sequence::{
    DEFAULT_NEXT_SEQUENCE, SEQ_NO_WIDTH, SeqNo, SequenceError, Sequenced, next_sequence_value,
    next_seq_no, next_seq_no_from, set_sequence,
};
