//! Typed error definitions for the T7 runtime.
//!
//! Provides [`T7Error`] for domain-specific errors that are more informative
//! than plain `anyhow::Error` strings. All variants implement `std::error::Error`
//! via `thiserror`, so they integrate seamlessly with `anyhow::Result`.

use thiserror::Error;

/// Domain-specific errors for the T7 runtime.
#[derive(Debug, Error)]
pub enum T7Error {
    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// Exchange network call failure (submit, cancel, query). Transient;
    /// the reconcile loop retries these rather than escalating.
    #[error("exchange error: {0}")]
    Exchange(String),

    /// A numeric field on an inbound order or trade event could not be
    /// parsed. The single event is dropped and its trade ID is NOT marked
    /// applied, so a corrected retransmission can still be applied.
    #[error("parse error: {0}")]
    Parse(String),

    /// Order management error (unknown market, invalid submission, etc.).
    #[error("trading error: {0}")]
    Trading(String),
}
