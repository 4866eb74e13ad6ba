//! Trade collector — applies each execution to the ledger exactly once.
//!
//! Consumes trade events from the user-data stream, deduplicates by trade
//! ID, resolves the owning order through the order store, mutates the
//! position ledger, and fans out notifications. Trades whose owning order
//! is not yet known (the trade stream and order stream have no relative
//! ordering guarantee) are queued and retried by the per-interval
//! [`process`](TradeCollector::process) flush.
//!
//! Notifications fire synchronously on the caller's path, in registration
//! order: on-trade, then on-profit (only when a close realized a non-zero
//! amount), then on-position-update.

use std::sync::{Arc, Mutex};

use t7_core::dedup::TradeIdDedup;
use t7_core::types::{Market, Trade};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::position::{Position, TradePnl};
use crate::store::OrderStore;

type TradeHandler = Box<dyn Fn(&Trade) + Send>;
type ProfitHandler = Box<dyn Fn(&Trade, Decimal, Decimal) + Send>;
type PositionHandler = Box<dyn Fn(&Position) + Send>;

/// Ledger state guarded by one lock, so a trade is deduped and applied
/// atomically with respect to the interval flush.
struct CollectorState {
    position: Position,
    dedup: TradeIdDedup,
    pending: Vec<Trade>,
}

#[derive(Default)]
struct Handlers {
    on_trade: Vec<TradeHandler>,
    on_profit: Vec<ProfitHandler>,
    on_position_update: Vec<PositionHandler>,
}

/// Per-instrument trade collector and position-ledger owner.
///
/// The ledger is mutated only here, one trade at a time, in arrival order.
pub struct TradeCollector {
    symbol: String,
    store: Arc<OrderStore>,
    state: Mutex<CollectorState>,
    handlers: Mutex<Handlers>,
}

impl TradeCollector {
    pub fn new(market: &Market, store: Arc<OrderStore>) -> Self {
        Self {
            symbol: market.symbol.clone(),
            store,
            state: Mutex::new(CollectorState {
                position: Position::new(market),
                dedup: TradeIdDedup::new(),
                pending: Vec::new(),
            }),
            handlers: Mutex::new(Handlers::default()),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    // -- observer registration ------------------------------------------------

    /// Register a handler invoked for every applied trade.
    pub fn on_trade<F: Fn(&Trade) + Send + 'static>(&self, f: F) {
        self.handlers
            .lock()
            .expect("collector handlers lock poisoned")
            .on_trade
            .push(Box::new(f));
    }

    /// Register a handler invoked with (trade, profit, net profit) when a
    /// trade closes part of a position and realizes a non-zero amount.
    pub fn on_profit<F: Fn(&Trade, Decimal, Decimal) + Send + 'static>(&self, f: F) {
        self.handlers
            .lock()
            .expect("collector handlers lock poisoned")
            .on_profit
            .push(Box::new(f));
    }

    /// Register a handler invoked with the updated position after every
    /// applied trade.
    pub fn on_position_update<F: Fn(&Position) + Send + 'static>(&self, f: F) {
        self.handlers
            .lock()
            .expect("collector handlers lock poisoned")
            .on_position_update
            .push(Box::new(f));
    }

    // -- state access ---------------------------------------------------------

    /// Snapshot of the current position.
    pub fn position(&self) -> Position {
        self.state
            .lock()
            .expect("collector state lock poisoned")
            .position
            .clone()
    }

    /// Replace the ledger, used when restoring persisted state at startup.
    pub fn restore_position(&self, position: Position) {
        let mut state = self.state.lock().expect("collector state lock poisoned");
        state.position = position;
    }

    /// Number of trades queued waiting for their owning order.
    pub fn num_pending(&self) -> usize {
        self.state
            .lock()
            .expect("collector state lock poisoned")
            .pending
            .len()
    }

    // -- processing -----------------------------------------------------------

    /// Process one trade from the stream.
    ///
    /// Duplicates are a logged no-op. A trade whose owning order is unknown
    /// is queued (not marked applied) until the order echo arrives. Returns
    /// `true` if the trade was applied to the ledger.
    pub fn process_trade(&self, trade: &Trade) -> bool {
        // malformed event: dropped without a dedup mark, so a corrected
        // retransmission under the same id can still be applied
        if trade.quantity <= Decimal::ZERO {
            warn!(
                "[collector] {} dropping {trade} — non-positive quantity",
                self.symbol,
            );
            return false;
        }

        let applied = {
            let mut state = self.state.lock().expect("collector state lock poisoned");

            if state.dedup.contains(trade.trade_id) {
                debug!("[collector] {} duplicate {trade} — skipping", self.symbol);
                return false;
            }

            if !self.store.exists(trade.order_id) {
                if state.pending.iter().any(|t| t.trade_id == trade.trade_id) {
                    debug!("[collector] {} {trade} already queued", self.symbol);
                } else {
                    warn!(
                        "[collector] {} owning order #{} unknown — queueing {trade}",
                        self.symbol, trade.order_id,
                    );
                    state.pending.push(trade.clone());
                }
                return false;
            }

            state.dedup.check_and_insert(trade.trade_id);
            let pnl = state.position.add_trade(trade);
            (pnl, state.position.clone())
        };

        let (pnl, position) = applied;
        self.emit(trade, pnl, &position);
        true
    }

    /// Flush hook invoked once per interval: retry pending trades whose
    /// owning orders have since appeared in the store. Returns how many
    /// were applied.
    pub fn process(&self) -> usize {
        let ready = {
            let mut state = self.state.lock().expect("collector state lock poisoned");
            if state.pending.is_empty() {
                return 0;
            }

            let pending = std::mem::take(&mut state.pending);
            let mut ready = Vec::new();
            for trade in pending {
                if state.dedup.contains(trade.trade_id) {
                    continue;
                }
                if self.store.exists(trade.order_id) {
                    state.dedup.check_and_insert(trade.trade_id);
                    let pnl = state.position.add_trade(&trade);
                    ready.push((trade, pnl, state.position.clone()));
                } else {
                    state.pending.push(trade);
                }
            }

            if !state.pending.is_empty() {
                warn!(
                    "[collector] {} {} trade(s) still waiting for their orders",
                    self.symbol,
                    state.pending.len(),
                );
            }
            ready
        };

        let applied = ready.len();
        for (trade, pnl, position) in &ready {
            info!("[collector] {} applied deferred {trade}", self.symbol);
            self.emit(trade, *pnl, position);
        }
        applied
    }

    /// Fan out notifications for one applied trade, in order.
    fn emit(&self, trade: &Trade, pnl: TradePnl, position: &Position) {
        let handlers = self.handlers.lock().expect("collector handlers lock poisoned");
        for h in &handlers.on_trade {
            h(trade);
        }
        if pnl.closed && !pnl.profit.is_zero() {
            for h in &handlers.on_profit {
                h(trade, pnl.profit, pnl.net_profit);
            }
        }
        for h in &handlers.on_position_update {
            h(position);
        }
    }
}
