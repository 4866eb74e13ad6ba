//! # t7-engine
//!
//! Order-state reconciliation engine. Keeps a local view of "which orders
//! are open" and "what has executed" synchronized with an exchange that
//! reports through two inconsistent channels: an asynchronous user-data
//! stream and an on-demand REST snapshot.
//!
//! ## Architecture
//!
//! ```text
//! user-data stream ──► InstrumentPipeline (one per symbol, single consumer)
//!                        ├── OrderStore         last-known order records
//!                        ├── ActiveOrderBook    ids of non-terminal orders
//!                        └── TradeCollector     dedup → Position ledger → notifications
//! interval trigger ────► CancelReconciler       bulk cancel + REST-verified eviction
//! ```
//!
//! Per instrument, stream events are applied strictly in arrival order by a
//! single consumer task. The cancel reconciler runs concurrently on the
//! interval trigger, so the store and book guard their state with per-object
//! locks. Different instruments are fully independent.

pub mod active;
pub mod collector;
pub mod notify;
pub mod pipeline;
pub mod position;
pub mod reconcile;
pub mod registry;
pub mod session;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use active::ActiveOrderBook;
pub use collector::TradeCollector;
pub use pipeline::InstrumentPipeline;
pub use position::Position;
pub use reconcile::{CancelReconciler, ReconcileOutcome};
pub use registry::Registry;
pub use session::{ExchangeSession, UserDataEvent, UserDataReceiver, UserDataSender};
pub use store::OrderStore;
