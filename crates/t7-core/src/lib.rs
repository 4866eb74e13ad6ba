//! # t7-core
//!
//! Core crate for the T7 order-state reconciliation runtime, providing:
//!
//! - **Types** (`types`) — order/trade/position enums and structs, tickers, markets
//! - **Configuration** (`config`) — JSON config deserialization
//! - **Error types** (`error`) — domain-specific `T7Error` via thiserror
//! - **Deduplication** (`dedup`) — exact trade-identifier dedup set
//! - **Persistence** (`persist`) — keyed JSON state snapshots for restart recovery
//! - **Time utilities** (`time_util`) — millisecond wall-clock timestamps
//! - **Logging** (`logging`) — tracing-based structured logging

pub mod config;
pub mod dedup;
pub mod error;
pub mod logging;
pub mod persist;
pub mod time_util;
pub mod types;

// Re-export types at crate root for convenience.
pub use types::*;
