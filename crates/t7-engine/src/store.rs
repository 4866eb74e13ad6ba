//! Canonical order store — the last-known record for every order ID.
//!
//! The store is updated by stream echoes and by submission acknowledgments,
//! and read by everything else. Exchange echoes may race local bookkeeping,
//! so an update for an unknown ID is accepted as an insert; prior submission
//! tracking is not required.

use std::sync::Mutex;

use ahash::AHashMap;
use t7_core::types::Order;
use tracing::debug;

/// In-memory order store for one instrument.
///
/// # Thread safety
///
/// All methods take `&self`; state is guarded by an internal mutex so the
/// stream consumer and the cancel reconciler can touch the store
/// concurrently. Read methods return snapshot copies.
pub struct OrderStore {
    symbol: String,
    orders: Mutex<AHashMap<u64, Order>>,
}

impl OrderStore {
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            orders: Mutex::new(AHashMap::new()),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Record submission acknowledgments. Unconditional inserts; the
    /// acknowledgment is always the first record for a fresh order ID.
    pub fn add(&self, orders: &[Order]) {
        let mut map = self.orders.lock().expect("order store lock poisoned");
        for order in orders {
            map.insert(order.order_id, order.clone());
        }
    }

    /// Apply a stream echo, replacing the stored record unless the incoming
    /// status is logically older than the stored one.
    ///
    /// Status transitions are monotonic: a late `New` echo arriving after
    /// `Filled` must not resurrect the order. Returns `true` if the record
    /// was inserted or replaced.
    pub fn upsert(&self, order: Order) -> bool {
        let mut map = self.orders.lock().expect("order store lock poisoned");
        match map.get(&order.order_id) {
            None => {
                debug!(
                    "[store] {} inserting unseen order #{} ({})",
                    self.symbol, order.order_id, order.status,
                );
                map.insert(order.order_id, order);
                true
            }
            Some(existing) => {
                if order.status.precedence() >= existing.status.precedence() {
                    map.insert(order.order_id, order);
                    true
                } else {
                    debug!(
                        "[store] {} ignoring stale update for #{}: {} after {}",
                        self.symbol, order.order_id, order.status, existing.status,
                    );
                    false
                }
            }
        }
    }

    /// Last-known record for an order ID.
    pub fn get(&self, order_id: u64) -> Option<Order> {
        self.orders
            .lock()
            .expect("order store lock poisoned")
            .get(&order_id)
            .cloned()
    }

    pub fn exists(&self, order_id: u64) -> bool {
        self.orders
            .lock()
            .expect("order store lock poisoned")
            .contains_key(&order_id)
    }

    /// Snapshot of every stored record.
    pub fn all(&self) -> Vec<Order> {
        self.orders
            .lock()
            .expect("order store lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.orders.lock().expect("order store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::order_with_status;
    use t7_core::types::OrderStatus;

    #[test]
    fn unknown_id_is_accepted_as_insert() {
        let store = OrderStore::new("BTCUSDT");
        assert!(!store.exists(10));
        assert!(store.upsert(order_with_status(10, OrderStatus::PartiallyFilled)));
        assert!(store.exists(10));
        assert_eq!(store.get(10).unwrap().status, OrderStatus::PartiallyFilled);
    }

    #[test]
    fn stale_echo_does_not_overwrite_terminal_record() {
        let store = OrderStore::new("BTCUSDT");
        store.upsert(order_with_status(10, OrderStatus::Filled));

        // a late New echo must be ignored
        assert!(!store.upsert(order_with_status(10, OrderStatus::New)));
        assert_eq!(store.get(10).unwrap().status, OrderStatus::Filled);
    }

    #[test]
    fn same_precedence_update_refreshes_fields() {
        let store = OrderStore::new("BTCUSDT");
        store.upsert(order_with_status(10, OrderStatus::New));

        let mut updated = order_with_status(10, OrderStatus::New);
        updated.updated_ms = 99;
        assert!(store.upsert(updated));
        assert_eq!(store.get(10).unwrap().updated_ms, 99);
    }

    #[test]
    fn lifecycle_progression_is_applied() {
        let store = OrderStore::new("BTCUSDT");
        store.upsert(order_with_status(10, OrderStatus::New));
        assert!(store.upsert(order_with_status(10, OrderStatus::PartiallyFilled)));
        assert!(store.upsert(order_with_status(10, OrderStatus::Canceled)));
        assert_eq!(store.get(10).unwrap().status, OrderStatus::Canceled);
        assert_eq!(store.all().len(), 1);
    }
}
