//! Exchange session contract and user-data stream events.
//!
//! The engine never talks to an exchange directly; it depends on this
//! narrow trait for outbound calls and on a per-instrument event channel
//! for the push stream. Transport (REST signing, WebSocket plumbing) lives
//! behind implementations of [`ExchangeSession`].
//!
//! Stream delivery contract: events for one instrument arrive in send
//! order, at-least-once, with no delivery-loss notification — silent gaps
//! are possible, which is exactly why the reconciler's REST fallback
//! exists.

use anyhow::Result;
use async_trait::async_trait;
use t7_core::types::{Order, SubmitOrder, Ticker, Trade};

/// Outbound exchange operations used by the reconciliation core.
///
/// All calls are network calls that may block or fail; implementations
/// must return promptly when the caller's shutdown signal fires and treat
/// failures as transient (the reconcile loop retries them).
#[async_trait]
pub trait ExchangeSession: Send + Sync {
    /// Submit orders. The synchronous acknowledgment carries
    /// exchange-assigned order IDs.
    async fn submit_orders(&self, orders: &[SubmitOrder]) -> Result<Vec<Order>>;

    /// Cancel orders, best-effort. Success does not guarantee immediate
    /// removal from the exchange's open-order list.
    async fn cancel_orders(&self, orders: &[Order]) -> Result<()>;

    /// REST snapshot of open orders, used for reconciliation fallback.
    async fn query_open_orders(&self, symbol: &str) -> Result<Vec<Order>>;

    /// Best bid/ask snapshot, used by order-placement logic.
    async fn query_ticker(&self, symbol: &str) -> Result<Ticker>;
}

/// A typed event delivered by the user-data stream for one instrument.
#[derive(Debug, Clone)]
pub enum UserDataEvent {
    /// Full order snapshot with every mutable field.
    OrderUpdate(Order),

    /// A trade execution.
    TradeUpdate(Trade),

    /// The stream connected successfully.
    Connected,

    /// The stream disconnected; events may have been lost.
    Disconnected {
        /// Human-readable reason.
        reason: String,
    },
}

/// Sender half of the per-instrument user-data channel.
pub type UserDataSender = tokio::sync::mpsc::UnboundedSender<UserDataEvent>;

/// Receiver half of the per-instrument user-data channel.
///
/// Exactly one consumer task per instrument polls this, which is what
/// preserves the strict FIFO application order.
pub type UserDataReceiver = tokio::sync::mpsc::UnboundedReceiver<UserDataEvent>;
