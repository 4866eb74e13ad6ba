//! In-process paper exchange session.
//!
//! Implements [`ExchangeSession`] without any network transport: orders are
//! acknowledged immediately, held in an open-order table, and echoed back
//! through the per-instrument user-data channel the way a real exchange
//! stream would. This is the dry-run backend; real exchange sessions live
//! outside this crate and plug into the same trait.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use t7_core::error::T7Error;
use t7_core::time_util;
use t7_core::types::{Order, OrderStatus, SubmitOrder, Ticker};
use t7_engine::session::{ExchangeSession, UserDataEvent, UserDataSender};
use tracing::{debug, info};

/// Paper-trading session shared by all instrument pipelines.
pub struct PaperSession {
    next_order_id: AtomicU64,
    open: Mutex<AHashMap<u64, Order>>,
    senders: Mutex<AHashMap<String, UserDataSender>>,
}

impl PaperSession {
    pub fn new() -> Self {
        Self {
            next_order_id: AtomicU64::new(1),
            open: Mutex::new(AHashMap::new()),
            senders: Mutex::new(AHashMap::new()),
        }
    }

    /// Attach the user-data channel for one instrument and announce the
    /// stream as connected.
    pub fn attach(&self, symbol: &str, sender: UserDataSender) {
        let _ = sender.send(UserDataEvent::Connected);
        self.senders
            .lock()
            .expect("paper session lock poisoned")
            .insert(symbol.to_string(), sender);
    }

    fn emit(&self, symbol: &str, event: UserDataEvent) {
        let senders = self.senders.lock().expect("paper session lock poisoned");
        if let Some(sender) = senders.get(symbol) {
            // a closed channel means the pipeline is shutting down
            let _ = sender.send(event);
        } else {
            debug!("[paper] no stream attached for {symbol}, dropping echo");
        }
    }
}

impl Default for PaperSession {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeSession for PaperSession {
    async fn submit_orders(&self, orders: &[SubmitOrder]) -> Result<Vec<Order>> {
        let now = time_util::now_ms();
        let mut created = Vec::with_capacity(orders.len());

        for submit in orders {
            if submit.quantity <= Decimal::ZERO {
                return Err(T7Error::Trading(format!(
                    "{}: non-positive quantity {}",
                    submit.symbol, submit.quantity,
                ))
                .into());
            }
            let order = Order {
                order_id: self.next_order_id.fetch_add(1, Ordering::SeqCst),
                client_order_id: submit.client_order_id.clone(),
                symbol: submit.symbol.clone(),
                side: submit.side,
                order_type: submit.order_type,
                price: submit.price,
                quantity: submit.quantity,
                executed_quantity: Decimal::ZERO,
                status: OrderStatus::New,
                group_id: submit.group_id,
                created_ms: now,
                updated_ms: now,
            };
            info!("[paper] accepted {order}");
            self.open
                .lock()
                .expect("paper session lock poisoned")
                .insert(order.order_id, order.clone());
            self.emit(&order.symbol, UserDataEvent::OrderUpdate(order.clone()));
            created.push(order);
        }

        Ok(created)
    }

    async fn cancel_orders(&self, orders: &[Order]) -> Result<()> {
        let now = time_util::now_ms();
        for order in orders {
            let removed = self
                .open
                .lock()
                .expect("paper session lock poisoned")
                .remove(&order.order_id);
            if let Some(mut cancelled) = removed {
                cancelled.status = OrderStatus::Canceled;
                cancelled.updated_ms = now;
                info!("[paper] cancelled #{}", cancelled.order_id);
                let symbol = cancelled.symbol.clone();
                self.emit(&symbol, UserDataEvent::OrderUpdate(cancelled));
            } else {
                debug!("[paper] cancel for unknown #{}", order.order_id);
            }
        }
        Ok(())
    }

    async fn query_open_orders(&self, symbol: &str) -> Result<Vec<Order>> {
        Ok(self
            .open
            .lock()
            .expect("paper session lock poisoned")
            .values()
            .filter(|o| o.symbol == symbol)
            .cloned()
            .collect())
    }

    async fn query_ticker(&self, symbol: &str) -> Result<Ticker> {
        // flat synthetic quote; good enough for a dry run
        Ok(Ticker {
            symbol: symbol.to_string(),
            buy: Decimal::from(100),
            sell: Decimal::from(101),
            time_ms: time_util::now_ms(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use t7_core::types::{OrderType, Side};

    fn submit(symbol: &str) -> SubmitOrder {
        SubmitOrder::new(
            symbol,
            Side::Buy,
            OrderType::Limit,
            Decimal::from(100),
            Decimal::ONE,
        )
    }

    #[tokio::test]
    async fn submit_then_cancel_echoes_through_the_stream() {
        let session = PaperSession::new();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        session.attach("BTCUSDT", tx);

        assert!(matches!(rx.recv().await, Some(UserDataEvent::Connected)));

        let created = session.submit_orders(&[submit("BTCUSDT")]).await.unwrap();
        assert_eq!(created.len(), 1);
        match rx.recv().await {
            Some(UserDataEvent::OrderUpdate(o)) => assert_eq!(o.status, OrderStatus::New),
            other => panic!("expected order echo, got {other:?}"),
        }
        assert_eq!(session.query_open_orders("BTCUSDT").await.unwrap().len(), 1);

        session.cancel_orders(&created).await.unwrap();
        match rx.recv().await {
            Some(UserDataEvent::OrderUpdate(o)) => {
                assert_eq!(o.status, OrderStatus::Canceled);
            }
            other => panic!("expected cancel echo, got {other:?}"),
        }
        assert!(session.query_open_orders("BTCUSDT").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn open_orders_are_scoped_per_symbol() {
        let session = PaperSession::new();
        session.submit_orders(&[submit("BTCUSDT")]).await.unwrap();
        session.submit_orders(&[submit("ETHUSDT")]).await.unwrap();

        assert_eq!(session.query_open_orders("BTCUSDT").await.unwrap().len(), 1);
        assert_eq!(session.query_open_orders("ETHUSDT").await.unwrap().len(), 1);
        assert!(session.query_open_orders("SOLUSDT").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_non_positive_quantity() {
        let session = PaperSession::new();
        let mut bad = submit("BTCUSDT");
        bad.quantity = Decimal::ZERO;
        assert!(session.submit_orders(&[bad]).await.is_err());
    }

    #[tokio::test]
    async fn ticker_has_a_sane_spread() {
        let session = PaperSession::new();
        let ticker = session.query_ticker("BTCUSDT").await.unwrap();
        assert!(ticker.buy < ticker.sell);
    }
}
