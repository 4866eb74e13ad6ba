//! Per-instrument pipeline wiring the reconciliation components together.
//!
//! One pipeline per symbol owns the order store, active book, trade
//! collector, and cancel reconciler. Stream events are consumed by exactly
//! one task per pipeline ([`run`](InstrumentPipeline::run)), which keeps
//! order-update and trade application strictly FIFO relative to delivery.
//! The interval trigger ([`on_interval`](InstrumentPipeline::on_interval))
//! executes concurrently with the consumer; the store and book carry their
//! own locks for exactly that overlap. Pipelines for different symbols are
//! fully independent.

use std::sync::Arc;

use anyhow::{Context, Result};
use t7_core::config::ReconcileConfig;
use t7_core::persist::{self, PersistError, Persister, StateKey};
use t7_core::types::{Market, Order};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::active::ActiveOrderBook;
use crate::collector::TradeCollector;
use crate::position::Position;
use crate::reconcile::{CancelReconciler, ReconcileOutcome};
use crate::session::{ExchangeSession, UserDataEvent, UserDataReceiver};
use crate::store::OrderStore;

/// Reconciliation state and event plumbing for one instrument.
pub struct InstrumentPipeline {
    market: Market,
    store: Arc<OrderStore>,
    book: Arc<ActiveOrderBook>,
    collector: Arc<TradeCollector>,
    reconciler: CancelReconciler,
    persister: Arc<dyn Persister>,
    state_key: StateKey,
}

impl InstrumentPipeline {
    /// Assemble the pipeline for one market.
    ///
    /// `component` identifies the owning strategy in persisted-state keys.
    pub fn new(
        market: Market,
        session: Arc<dyn ExchangeSession>,
        persister: Arc<dyn Persister>,
        reconcile_config: ReconcileConfig,
        component: &str,
    ) -> Self {
        let store = Arc::new(OrderStore::new(&market.symbol));
        let book = Arc::new(ActiveOrderBook::new(&market.symbol, Arc::clone(&store)));
        let collector = Arc::new(TradeCollector::new(&market, Arc::clone(&store)));
        let reconciler = CancelReconciler::new(session, Arc::clone(&book), reconcile_config);
        let state_key = StateKey::new(component, &market.symbol);

        Self {
            market,
            store,
            book,
            collector,
            reconciler,
            persister,
            state_key,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.market.symbol
    }

    pub fn market(&self) -> &Market {
        &self.market
    }

    pub fn store(&self) -> &Arc<OrderStore> {
        &self.store
    }

    pub fn book(&self) -> &Arc<ActiveOrderBook> {
        &self.book
    }

    pub fn collector(&self) -> &Arc<TradeCollector> {
        &self.collector
    }

    // -- persistence ----------------------------------------------------------

    /// Restore the position ledger from the persistence backend.
    ///
    /// A missing snapshot is the first-run condition and leaves the fresh
    /// ledger in place; any other persistence failure is a hard error that
    /// must abort startup.
    pub fn load_state(&self) -> Result<()> {
        match persist::load::<Position>(self.persister.as_ref(), &self.state_key) {
            Ok(position) => {
                info!("[pipeline] {} state restored: {position}", self.symbol());
                self.collector.restore_position(position);
                Ok(())
            }
            Err(PersistError::NotFound) => {
                info!(
                    "[pipeline] {} no saved state — starting with an empty ledger",
                    self.symbol(),
                );
                Ok(())
            }
            Err(e) => Err(e).with_context(|| {
                format!("loading persisted state for {}", self.state_key.as_string())
            }),
        }
    }

    /// Save the position ledger snapshot.
    pub fn save_state(&self) -> Result<()> {
        let position = self.collector.position();
        persist::save(self.persister.as_ref(), &self.state_key, &position)
            .with_context(|| format!("saving state for {}", self.state_key.as_string()))?;
        info!("[pipeline] {} state saved: {position}", self.symbol());
        Ok(())
    }

    // -- event path -----------------------------------------------------------

    /// Record submission acknowledgments in the store and the active book.
    pub fn record_submissions(&self, orders: &[Order]) {
        self.store.add(orders);
        self.book.add(orders);
    }

    /// Apply one stream event. Must only be called from the single
    /// consumer path for this instrument.
    pub fn handle_event(&self, event: UserDataEvent) {
        match event {
            UserDataEvent::OrderUpdate(order) => {
                if order.symbol != self.market.symbol {
                    debug!(
                        "[pipeline] {} ignoring order update for {}",
                        self.symbol(),
                        order.symbol,
                    );
                    return;
                }
                self.store.upsert(order.clone());
                self.book.apply_update(&order);
            }
            UserDataEvent::TradeUpdate(trade) => {
                if trade.symbol != self.market.symbol {
                    debug!(
                        "[pipeline] {} ignoring trade for {}",
                        self.symbol(),
                        trade.symbol,
                    );
                    return;
                }
                self.collector.process_trade(&trade);
            }
            UserDataEvent::Connected => {
                info!("[pipeline] {} user-data stream connected", self.symbol());
            }
            UserDataEvent::Disconnected { reason } => {
                warn!(
                    "[pipeline] {} user-data stream disconnected: {reason}",
                    self.symbol(),
                );
            }
        }
    }

    /// Consumer loop: drain the user-data channel until it closes or the
    /// shutdown signal fires.
    pub async fn run(
        self: Arc<Self>,
        mut events: UserDataReceiver,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("[pipeline] {} consumer started", self.symbol());
        loop {
            tokio::select! {
                res = shutdown.changed() => {
                    // a dropped sender means the runtime is tearing down
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        warn!("[pipeline] {} user-data channel closed", self.symbol());
                        break;
                    }
                },
            }
        }
        info!("[pipeline] {} consumer stopped", self.symbol());
    }

    // -- interval path --------------------------------------------------------

    /// Per-interval hook: flush deferred trades, then drain the active
    /// book through the cancel reconciler. Runs concurrently with the
    /// consumer loop.
    pub async fn on_interval(&self, shutdown: &mut watch::Receiver<bool>) -> ReconcileOutcome {
        let flushed = self.collector.process();
        if flushed > 0 {
            info!(
                "[pipeline] {} flushed {flushed} deferred trade(s)",
                self.symbol(),
            );
        }

        let outcome = self.reconciler.cancel_all(shutdown).await;
        match outcome {
            ReconcileOutcome::Converged { attempts } => {
                debug!(
                    "[pipeline] {} reconcile converged after {attempts} retry pass(es)",
                    self.symbol(),
                );
            }
            ReconcileOutcome::Degraded { remaining } => {
                error!(
                    "[pipeline] {} reconcile degraded — {remaining} order(s) unverified, \
                     will retry next cycle",
                    self.symbol(),
                );
            }
            ReconcileOutcome::Cancelled { remaining } => {
                warn!(
                    "[pipeline] {} reconcile cancelled with {remaining} order(s) open",
                    self.symbol(),
                );
            }
        }
        outcome
    }
}
