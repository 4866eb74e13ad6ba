//! Shared fixtures for the engine's unit tests: order/trade/market
//! builders and a scriptable mock exchange session.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use anyhow::{Result, bail};
use async_trait::async_trait;
use rust_decimal::Decimal;
use t7_core::types::{Market, Order, OrderStatus, OrderType, Side, SubmitOrder, Ticker, Trade};

use crate::session::ExchangeSession;

pub fn market() -> Market {
    Market {
        symbol: "BTCUSDT".into(),
        base_currency: "BTC".into(),
        quote_currency: "USDT".into(),
        min_quantity: "0.0001".parse().unwrap(),
    }
}

pub fn order_with_status(order_id: u64, status: OrderStatus) -> Order {
    Order {
        order_id,
        client_order_id: format!("client-{order_id}"),
        symbol: "BTCUSDT".into(),
        side: Side::Buy,
        order_type: OrderType::LimitMaker,
        price: Decimal::from(100),
        quantity: Decimal::ONE,
        executed_quantity: Decimal::ZERO,
        status,
        group_id: 0,
        created_ms: 1,
        updated_ms: 1,
    }
}

pub fn trade_for_order(trade_id: u64, order_id: u64, side: Side, price: &str, qty: &str) -> Trade {
    Trade {
        trade_id,
        order_id,
        symbol: "BTCUSDT".into(),
        side,
        price: price.parse().unwrap(),
        quantity: qty.parse().unwrap(),
        quote_quantity: Decimal::ZERO,
        fee: Decimal::ZERO,
        fee_currency: "USDT".into(),
        is_maker: true,
        time_ms: 1,
    }
}

pub fn trade(trade_id: u64, side: Side, price: &str, qty: &str) -> Trade {
    trade_for_order(trade_id, 1, side, price, qty)
}

/// Scriptable exchange session.
///
/// `submit_orders` acknowledges with sequential exchange IDs;
/// `query_open_orders` returns whatever [`set_open_orders`] seeded (empty
/// by default, simulating an exchange that closed everything).
pub struct MockSession {
    next_order_id: AtomicU32,
    cancel_calls: AtomicU32,
    query_calls: AtomicU32,
    fail_cancels: AtomicBool,
    hang_cancels: AtomicBool,
    open_orders: Mutex<Vec<Order>>,
}

impl MockSession {
    pub fn new() -> Self {
        Self {
            next_order_id: AtomicU32::new(1),
            cancel_calls: AtomicU32::new(0),
            query_calls: AtomicU32::new(0),
            fail_cancels: AtomicBool::new(false),
            hang_cancels: AtomicBool::new(false),
            open_orders: Mutex::new(Vec::new()),
        }
    }

    pub fn set_open_orders(&self, orders: Vec<Order>) {
        *self.open_orders.lock().unwrap() = orders;
    }

    pub fn fail_cancels(&self, fail: bool) {
        self.fail_cancels.store(fail, Ordering::SeqCst);
    }

    /// Make `cancel_orders` never resolve, simulating a hung network call.
    pub fn hang_cancels(&self, hang: bool) {
        self.hang_cancels.store(hang, Ordering::SeqCst);
    }

    pub fn cancel_calls(&self) -> u32 {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    pub fn query_calls(&self) -> u32 {
        self.query_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExchangeSession for MockSession {
    async fn submit_orders(&self, orders: &[SubmitOrder]) -> Result<Vec<Order>> {
        Ok(orders
            .iter()
            .map(|submit| {
                let id = u64::from(self.next_order_id.fetch_add(1, Ordering::SeqCst));
                Order {
                    order_id: id,
                    client_order_id: submit.client_order_id.clone(),
                    symbol: submit.symbol.clone(),
                    side: submit.side,
                    order_type: submit.order_type,
                    price: submit.price,
                    quantity: submit.quantity,
                    executed_quantity: Decimal::ZERO,
                    status: OrderStatus::New,
                    group_id: submit.group_id,
                    created_ms: 1,
                    updated_ms: 1,
                }
            })
            .collect())
    }

    async fn cancel_orders(&self, _orders: &[Order]) -> Result<()> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang_cancels.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_cancels.load(Ordering::SeqCst) {
            bail!("simulated cancel failure");
        }
        Ok(())
    }

    async fn query_open_orders(&self, _symbol: &str) -> Result<Vec<Order>> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.open_orders.lock().unwrap().clone())
    }

    async fn query_ticker(&self, symbol: &str) -> Result<Ticker> {
        Ok(Ticker {
            symbol: symbol.to_string(),
            buy: Decimal::from(100),
            sell: Decimal::from(101),
            time_ms: 1,
        })
    }
}
