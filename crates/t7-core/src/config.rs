//! Configuration parsing for the reconciliation runtime.
//!
//! The runner reads its settings from a single JSON config file: logging
//! metadata plus an `instruments` array where each entry describes one
//! traded symbol and its reconciliation bounds.
//!
//! # Example config
//!
//! ```json
//! {
//!   "module_name": "t7-runner",
//!   "log_path": "/tmp/log",
//!   "state_dir": "/var/lib/t7",
//!   "instruments": [{
//!     "symbol": "BTCUSDT",
//!     "base_currency": "BTC",
//!     "quote_currency": "USDT",
//!     "min_quantity": "0.0001",
//!     "interval_secs": 60,
//!     "reconcile": { "max_attempts": 10, "retry_backoff_ms": 3000 }
//!   }]
//! }
//! ```

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use crate::types::Market;

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Module name, used as the log file prefix.
    pub module_name: Option<String>,

    /// Optional directory for daily-rotating log files.
    pub log_path: Option<String>,

    /// Directory for persisted state snapshots.
    pub state_dir: Option<String>,

    /// One entry per traded instrument.
    pub instruments: Vec<InstrumentConfig>,
}

/// Configuration for one traded instrument.
#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentConfig {
    /// Unified symbol (e.g. `"BTCUSDT"`).
    pub symbol: String,

    /// Base currency (e.g. `"BTC"`).
    pub base_currency: String,

    /// Quote currency (e.g. `"USDT"`).
    pub quote_currency: String,

    /// Minimum order quantity in base currency.
    pub min_quantity: Decimal,

    /// Seconds between interval triggers (flush + cancel + re-evaluate).
    pub interval_secs: Option<u64>,

    /// Reconciliation bounds; defaults apply when omitted.
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

impl InstrumentConfig {
    /// Effective interval in seconds (default: 60).
    pub fn effective_interval_secs(&self) -> u64 {
        self.interval_secs.unwrap_or(60)
    }

    /// Market metadata for this instrument.
    pub fn market(&self) -> Market {
        Market {
            symbol: self.symbol.clone(),
            base_currency: self.base_currency.clone(),
            quote_currency: self.quote_currency.clone(),
            min_quantity: self.min_quantity,
        }
    }
}

/// Bounds for the cancel-and-verify loop.
///
/// The retry loop is explicitly bounded: it stops after `max_attempts`
/// passes even if the exchange never converges, reporting a degraded
/// outcome instead of spinning until the caller cancels.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Delay after the first bulk cancel, letting stream echoes arrive (ms).
    pub initial_delay_ms: u64,

    /// Base wait between retry passes (ms). Doubles each pass.
    pub retry_backoff_ms: u64,

    /// Upper bound on the per-pass backoff (ms).
    pub backoff_cap_ms: u64,

    /// Maximum number of retry passes before giving up.
    pub max_attempts: u32,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 30,
            retry_backoff_ms: 3_000,
            backoff_cap_ms: 15_000,
            max_attempts: 10,
        }
    }
}

/// Load and parse a JSON config file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    if config.instruments.is_empty() {
        return Err(crate::error::T7Error::Config("no instruments configured".into()).into());
    }
    for inst in &config.instruments {
        if inst.min_quantity <= Decimal::ZERO {
            return Err(crate::error::T7Error::Config(format!(
                "{}: min_quantity must be positive",
                inst.symbol,
            ))
            .into());
        }
    }
    info!(
        "[config] loaded {} instrument(s) from {}",
        config.instruments.len(),
        path.display(),
    );
    Ok(config)
}
