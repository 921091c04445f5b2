//! Sequence allocation serialized per sibling scope.
//!
//! Numbering reads the siblings, computes the next value and inserts; two
//! writers interleaving those steps would take the same `SeqNo`. Writers in
//! this process are serialized by a lock per order. The store's uniqueness on
//! `(OrderNo, SeqNo)` catches writers elsewhere, and that collision is reported
//! as [`SequenceError::ConcurrentConflict`] for the caller to retry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, instrument};

use erplink_core::{OrderNo, RepositoryError};
use erplink_sales::{OrderLine, OrderStore, SequenceError, Sequenced, next_seq_no_from};

pub struct SequenceAllocator<S> {
    store: S,
    scopes: Mutex<HashMap<OrderNo, Arc<Mutex<()>>>>,
}

impl<S> SequenceAllocator<S>
where
    S: OrderStore,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            scopes: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn scope(&self, order_no: OrderNo) -> Arc<Mutex<()>> {
        let mut scopes = self.scopes.lock().unwrap_or_else(PoisonError::into_inner);
        scopes.entry(order_no).or_default().clone()
    }

    /// Forget the order's lock once no other writer holds or waits on it.
    fn release(&self, order_no: OrderNo, scope: Arc<Mutex<()>>) {
        let mut scopes = self.scopes.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one held here.
        if Arc::strong_count(&scope) <= 2 {
            scopes.remove(&order_no);
        }
    }

    /// Orders with a writer holding or waiting on their lock.
    pub fn active_scopes(&self) -> usize {
        self.scopes.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Number `line` after the order's existing lines and insert it.
    #[instrument(skip(self, line), fields(order_no = %order_no, article_no = %line.article_no), err)]
    pub fn add_line(&self, order_no: OrderNo, line: OrderLine) -> Result<OrderLine, SequenceError> {
        let scope = self.scope(order_no);
        let result = {
            let _guard = scope.lock().unwrap_or_else(PoisonError::into_inner);
            self.number_and_insert(order_no, line)
        };
        self.release(order_no, scope);
        result
    }

    fn number_and_insert(&self, order_no: OrderNo, mut line: OrderLine) -> Result<OrderLine, SequenceError> {
        let seq_no = next_seq_no_from(self.store.order_line_seq_nos(order_no));
        line.assign_seq_no(seq_no.clone());

        match self.store.insert_order_line(order_no, &line) {
            Ok(()) => {
                debug!(seq_no = %seq_no, "allocated order line");
                Ok(line)
            }
            Err(RepositoryError::UniqueViolation(_)) => Err(SequenceError::ConcurrentConflict {
                scope: format!("order {order_no}"),
                seq_no,
            }),
            Err(other) => Err(other.into()),
        }
    }
}
