//! Active order book — the set of orders believed still open.
//!
//! Holds only order identifiers; every read resolves through the
//! [`OrderStore`] so callers always see the latest record. Membership is
//! inserted on submission acknowledgment and removed the moment a stream
//! echo carries a terminal status.

use std::sync::{Arc, Mutex};

use ahash::AHashSet;
use t7_core::types::Order;
use tracing::{debug, info, warn};

use crate::store::OrderStore;

/// View over the order store holding only non-terminal orders.
///
/// # Thread safety
///
/// The id set is mutex-guarded; [`orders`](ActiveOrderBook::orders) returns
/// a snapshot copy that is safe to iterate while the stream consumer keeps
/// mutating the book.
pub struct ActiveOrderBook {
    symbol: String,
    ids: Mutex<AHashSet<u64>>,
    store: Arc<OrderStore>,
}

impl ActiveOrderBook {
    pub fn new(symbol: &str, store: Arc<OrderStore>) -> Self {
        Self {
            symbol: symbol.to_string(),
            ids: Mutex::new(AHashSet::new()),
            store,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Insert newly submitted orders. The caller records them in the order
    /// store first; the book keeps only the identifiers.
    pub fn add(&self, orders: &[Order]) {
        let mut ids = self.ids.lock().expect("active book lock poisoned");
        for order in orders {
            ids.insert(order.order_id);
        }
    }

    /// Evict an order by identifier. Returns whether it was present.
    pub fn remove(&self, order_id: u64) -> bool {
        self.ids
            .lock()
            .expect("active book lock poisoned")
            .remove(&order_id)
    }

    pub fn contains(&self, order_id: u64) -> bool {
        self.ids
            .lock()
            .expect("active book lock poisoned")
            .contains(&order_id)
    }

    pub fn num_of_orders(&self) -> usize {
        self.ids.lock().expect("active book lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_of_orders() == 0
    }

    /// Snapshot of the open orders, resolved through the order store.
    ///
    /// An id without a store record means the submission path recorded the
    /// book before the store; such entries are skipped here and will resolve
    /// on the next read.
    pub fn orders(&self) -> Vec<Order> {
        let ids: Vec<u64> = self
            .ids
            .lock()
            .expect("active book lock poisoned")
            .iter()
            .copied()
            .collect();

        ids.iter()
            .filter_map(|id| {
                let order = self.store.get(*id);
                if order.is_none() {
                    debug!("[book] {} id #{} has no store record yet", self.symbol, id);
                }
                order
            })
            .collect()
    }

    /// Apply a stream order-update: a transition into a terminal state
    /// evicts the id; non-terminal transitions leave membership intact
    /// (the store already holds the refreshed fields).
    pub fn apply_update(&self, order: &Order) {
        if order.is_terminal() {
            if self.remove(order.order_id) {
                info!(
                    "[book] {} order #{} {} — removed from active book",
                    self.symbol, order.order_id, order.status,
                );
            } else {
                debug!(
                    "[book] {} terminal update for #{} not in active book",
                    self.symbol, order.order_id,
                );
            }
        }
    }

    /// Evict every order absent from an exchange-confirmed set of open ids.
    ///
    /// Used by the reconciliation fallback: an order the REST snapshot does
    /// not list is already closed on the exchange and its stream update was
    /// presumably lost. Returns the evicted ids.
    pub fn evict_missing(&self, open_ids: &AHashSet<u64>) -> Vec<u64> {
        let mut ids = self.ids.lock().expect("active book lock poisoned");
        let evicted: Vec<u64> = ids.iter().copied().filter(|id| !open_ids.contains(id)).collect();
        for id in &evicted {
            ids.remove(id);
            warn!(
                "[book] {} order #{} absent from exchange snapshot — evicting as closed",
                self.symbol, id,
            );
        }
        evicted
    }

    /// Log the current open orders at warn level (used before retrying a
    /// cancel pass).
    pub fn log_open_orders(&self) {
        for order in self.orders() {
            warn!("[book] {} still open: {}", self.symbol, order);
        }
    }
}
