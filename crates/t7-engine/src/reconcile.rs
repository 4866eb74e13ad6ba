//! Cancel-and-verify reconciliation.
//!
//! Guarantees that after [`cancel_all`](CancelReconciler::cancel_all)
//! returns, either the active order book is empty or the caller has been
//! told reconciliation could not complete. The push stream under-reports
//! cancellations (silent gaps), so when the book refuses to drain the loop
//! falls back to a REST open-orders snapshot and evicts everything the
//! exchange no longer lists.
//!
//! The retry loop is explicitly bounded: capped exponential backoff and a
//! maximum attempt count from [`ReconcileConfig`], so a non-converging
//! exchange produces a degraded outcome instead of an infinite loop.

use std::sync::Arc;
use std::time::Duration;

use ahash::AHashSet;
use t7_core::config::ReconcileConfig;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::active::ActiveOrderBook;
use crate::session::ExchangeSession;

/// How a reconciliation pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The book drained. `attempts` counts retry passes after the initial
    /// bulk cancel (0 = the first pass sufficed).
    Converged { attempts: u32 },

    /// Retry budget exhausted with orders still believed open. Degraded,
    /// not fatal: the caller retries at the next cycle.
    Degraded { remaining: usize },

    /// The shutdown signal fired mid-loop. No guarantee about the book.
    Cancelled { remaining: usize },
}

impl ReconcileOutcome {
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged { .. })
    }
}

/// Drains the active order book against the exchange.
pub struct CancelReconciler {
    session: Arc<dyn ExchangeSession>,
    book: Arc<ActiveOrderBook>,
    config: ReconcileConfig,
}

impl CancelReconciler {
    pub fn new(
        session: Arc<dyn ExchangeSession>,
        book: Arc<ActiveOrderBook>,
        config: ReconcileConfig,
    ) -> Self {
        Self { session, book, config }
    }

    /// Cancel every order in the active book and verify emptiness.
    ///
    /// Transient network failures are logged and retried while the retry
    /// budget lasts. The wait steps and every exchange call select against
    /// `shutdown`, so cancellation interrupts a backoff or a hung network
    /// call immediately rather than after the timeout.
    pub async fn cancel_all(&self, shutdown: &mut watch::Receiver<bool>) -> ReconcileOutcome {
        let symbol = self.book.symbol().to_string();
        let orders = self.book.orders();
        if orders.is_empty() {
            return ReconcileOutcome::Converged { attempts: 0 };
        }

        info!("[reconcile] {symbol} cancelling {} open order(s)", orders.len());
        match self.guarded(self.session.cancel_orders(&orders), shutdown).await {
            Some(Err(e)) => error!("[reconcile] {symbol} bulk cancel failed: {e:#}"),
            Some(Ok(())) => {}
            None => return self.cancelled(&symbol),
        }

        // short grace period for the stream echoes to land
        if !self.wait(self.config.initial_delay_ms, shutdown).await {
            return self.cancelled(&symbol);
        }

        let mut backoff_ms = self.config.retry_backoff_ms;
        for attempt in 0..self.config.max_attempts {
            if self.book.is_empty() {
                return ReconcileOutcome::Converged { attempts: attempt };
            }

            let remaining = self.book.orders();
            warn!(
                "[reconcile] {symbol} attempt {}/{}: {} order(s) not cancelled yet",
                attempt + 1,
                self.config.max_attempts,
                remaining.len(),
            );
            self.book.log_open_orders();

            match self.guarded(self.session.cancel_orders(&remaining), shutdown).await {
                Some(Err(e)) => error!("[reconcile] {symbol} re-cancel failed: {e:#}"),
                Some(Ok(())) => {}
                None => return self.cancelled(&symbol),
            }

            if !self.wait(backoff_ms, shutdown).await {
                return self.cancelled(&symbol);
            }
            backoff_ms = (backoff_ms.saturating_mul(2)).min(self.config.backoff_cap_ms);

            // stream echoes still missing: verify against the REST snapshot
            // and evict whatever the exchange no longer reports as open
            if !self.book.is_empty() {
                match self.guarded(self.session.query_open_orders(&symbol), shutdown).await {
                    Some(Ok(open)) => {
                        let confirmed: AHashSet<u64> =
                            open.iter().map(|o| o.order_id).collect();
                        let evicted = self.book.evict_missing(&confirmed);
                        if !evicted.is_empty() {
                            info!(
                                "[reconcile] {symbol} evicted {} order(s) via REST verification",
                                evicted.len(),
                            );
                        }
                    }
                    Some(Err(e)) => {
                        warn!("[reconcile] {symbol} open-orders query failed: {e:#}");
                    }
                    None => return self.cancelled(&symbol),
                }
            }
        }

        if self.book.is_empty() {
            return ReconcileOutcome::Converged {
                attempts: self.config.max_attempts,
            };
        }

        let remaining = self.book.num_of_orders();
        error!(
            "[reconcile] {symbol} giving up after {} attempts — {remaining} order(s) still open",
            self.config.max_attempts,
        );
        ReconcileOutcome::Degraded { remaining }
    }

    fn cancelled(&self, symbol: &str) -> ReconcileOutcome {
        let remaining = self.book.num_of_orders();
        warn!("[reconcile] {symbol} cancelled by shutdown — {remaining} order(s) unverified");
        ReconcileOutcome::Cancelled { remaining }
    }

    /// Run one exchange call, abandoning it if shutdown fires first.
    /// Dropping the future cancels the in-flight request, so a hung call
    /// cannot block reconciliation past the shutdown signal.
    async fn guarded<F, T>(&self, call: F, shutdown: &mut watch::Receiver<bool>) -> Option<T>
    where
        F: std::future::Future<Output = T>,
    {
        if *shutdown.borrow() {
            return None;
        }
        tokio::pin!(call);
        loop {
            tokio::select! {
                out = &mut call => return Some(out),
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        return None;
                    }
                }
            }
        }
    }

    /// Sleep `ms`, returning `false` immediately if shutdown fires first.
    async fn wait(&self, ms: u64, shutdown: &mut watch::Receiver<bool>) -> bool {
        if *shutdown.borrow() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(ms)) => true,
            res = shutdown.changed() => match res {
                Ok(()) => !*shutdown.borrow(),
                // sender gone means the runtime is tearing down
                Err(_) => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::OrderStore;
    use crate::testing::{MockSession, order_with_status};
    use t7_core::types::OrderStatus;

    fn fast_config(max_attempts: u32) -> ReconcileConfig {
        ReconcileConfig {
            initial_delay_ms: 1,
            retry_backoff_ms: 1,
            backoff_cap_ms: 2,
            max_attempts,
        }
    }

    fn seeded_book(ids: &[u64]) -> Arc<ActiveOrderBook> {
        let store = Arc::new(OrderStore::new("BTCUSDT"));
        let book = Arc::new(ActiveOrderBook::new("BTCUSDT", Arc::clone(&store)));
        let orders: Vec<_> = ids
            .iter()
            .map(|id| order_with_status(*id, OrderStatus::New))
            .collect();
        store.add(&orders);
        book.add(&orders);
        book
    }

    #[tokio::test]
    async fn empty_book_converges_without_network_calls() {
        let session = Arc::new(MockSession::new());
        let book = seeded_book(&[]);
        let reconciler = CancelReconciler::new(
            Arc::clone(&session) as Arc<dyn ExchangeSession>,
            book,
            fast_config(3),
        );

        let (_tx, mut rx) = watch::channel(false);
        let outcome = reconciler.cancel_all(&mut rx).await;
        assert_eq!(outcome, ReconcileOutcome::Converged { attempts: 0 });
        assert_eq!(session.cancel_calls(), 0);
    }

    #[tokio::test]
    async fn lost_stream_echoes_resolve_via_rest_snapshot() {
        // exchange acknowledges all cancels but the stream never echoes;
        // the REST snapshot comes back empty, so the book drains by eviction
        let session = Arc::new(MockSession::new());
        let book = seeded_book(&[1, 2, 3]);
        let reconciler = CancelReconciler::new(
            Arc::clone(&session) as Arc<dyn ExchangeSession>,
            Arc::clone(&book),
            fast_config(5),
        );

        let (_tx, mut rx) = watch::channel(false);
        let outcome = reconciler.cancel_all(&mut rx).await;
        assert!(outcome.is_converged(), "got {outcome:?}");
        assert!(book.is_empty());
        assert!(session.cancel_calls() >= 1);
        assert!(session.query_calls() >= 1);
    }

    #[tokio::test]
    async fn non_converging_exchange_yields_degraded_after_bounded_attempts() {
        // the exchange keeps reporting the orders as open
        let session = Arc::new(MockSession::new());
        let book = seeded_book(&[1, 2]);
        session.set_open_orders(book.orders());
        let reconciler = CancelReconciler::new(
            Arc::clone(&session) as Arc<dyn ExchangeSession>,
            Arc::clone(&book),
            fast_config(2),
        );

        let (_tx, mut rx) = watch::channel(false);
        let outcome = reconciler.cancel_all(&mut rx).await;
        assert_eq!(outcome, ReconcileOutcome::Degraded { remaining: 2 });
        assert_eq!(book.num_of_orders(), 2);
        // bounded: initial pass + one re-cancel per attempt
        assert_eq!(session.cancel_calls(), 3);
    }

    #[tokio::test]
    async fn shutdown_interrupts_the_loop_promptly() {
        let session = Arc::new(MockSession::new());
        let book = seeded_book(&[1]);
        session.set_open_orders(book.orders());
        let reconciler = CancelReconciler::new(
            Arc::clone(&session) as Arc<dyn ExchangeSession>,
            Arc::clone(&book),
            ReconcileConfig {
                initial_delay_ms: 1,
                retry_backoff_ms: 60_000,
                backoff_cap_ms: 60_000,
                max_attempts: 10,
            },
        );

        let (tx, mut rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send(true);
        });

        let outcome = reconciler.cancel_all(&mut rx).await;
        assert_eq!(outcome, ReconcileOutcome::Cancelled { remaining: 1 });
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_abandons_a_hung_exchange_call() {
        // the exchange never answers the cancel request; shutdown must
        // still unblock the loop instead of waiting on the dead call
        let session = Arc::new(MockSession::new());
        session.hang_cancels(true);
        let book = seeded_book(&[1]);
        let reconciler = CancelReconciler::new(
            Arc::clone(&session) as Arc<dyn ExchangeSession>,
            Arc::clone(&book),
            fast_config(3),
        );

        let (tx, mut rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send(true);
        });

        let outcome =
            tokio::time::timeout(Duration::from_millis(500), reconciler.cancel_all(&mut rx))
                .await
                .expect("cancel_all did not return after shutdown");
        assert_eq!(outcome, ReconcileOutcome::Cancelled { remaining: 1 });
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn network_failures_are_retried_not_escalated() {
        let session = Arc::new(MockSession::new());
        session.fail_cancels(true);
        let book = seeded_book(&[1]);
        let reconciler = CancelReconciler::new(
            Arc::clone(&session) as Arc<dyn ExchangeSession>,
            Arc::clone(&book),
            fast_config(3),
        );

        // cancels fail every time, but the empty REST snapshot still drains
        // the book
        let (_tx, mut rx) = watch::channel(false);
        let outcome = reconciler.cancel_all(&mut rx).await;
        assert!(outcome.is_converged(), "got {outcome:?}");
        assert!(book.is_empty());
    }
}
