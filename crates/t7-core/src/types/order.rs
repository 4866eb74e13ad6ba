//! Order structures — submission requests and exchange-confirmed records.
//!
//! A [`SubmitOrder`] is what a strategy hands to the exchange session; the
//! synchronous acknowledgment comes back as a full [`Order`] carrying the
//! exchange-assigned identifier. Every subsequent stream echo is a complete
//! [`Order`] snapshot with all mutable fields.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::{OrderStatus, OrderType, Side, TimeInForce};

// ---------------------------------------------------------------------------
// Submission request (strategy → session)
// ---------------------------------------------------------------------------

/// An order request sent to the exchange session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitOrder {
    /// Unified symbol (e.g. `"BTCUSDT"`).
    pub symbol: String,
    /// Buy or sell.
    pub side: Side,
    /// Order type.
    pub order_type: OrderType,
    /// Limit price (ignored for market orders).
    pub price: Decimal,
    /// Order quantity in base currency.
    pub quantity: Decimal,
    /// Time-in-force.
    pub time_in_force: TimeInForce,
    /// Client-assigned order ID, locally unique. Correlates the submission
    /// with the first stream echo before the exchange ID is known.
    pub client_order_id: String,
    /// Grouping tag linking sibling orders from one placement cycle.
    pub group_id: u32,
}

impl SubmitOrder {
    /// Build a request with a fresh UUID client order ID.
    pub fn new(symbol: &str, side: Side, order_type: OrderType, price: Decimal, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            side,
            order_type,
            price,
            quantity,
            time_in_force: TimeInForce::Gtc,
            client_order_id: uuid::Uuid::new_v4().to_string(),
            group_id: 0,
        }
    }
}

/// Derive a stable grouping tag from an instance string (e.g.
/// `"pingpong-BTCUSDT"`), so sibling orders from one placement cycle can be
/// bulk-managed. xxh64 folded to 32 bits.
pub fn generate_group_id(instance_id: &str) -> u32 {
    let h = xxhash_rust::xxh64::xxh64(instance_id.as_bytes(), 0);
    (h ^ (h >> 32)) as u32
}

// ---------------------------------------------------------------------------
// Exchange-confirmed order record
// ---------------------------------------------------------------------------

/// An order as known to the exchange — returned by submission acknowledgment
/// and by every order-update stream event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Exchange-assigned order ID. Immutable once assigned.
    pub order_id: u64,
    /// Client-assigned order ID from the original submission.
    pub client_order_id: String,
    /// Unified symbol.
    pub symbol: String,
    /// Buy or sell.
    pub side: Side,
    /// Order type.
    pub order_type: OrderType,
    /// Order price.
    pub price: Decimal,
    /// Original order quantity.
    pub quantity: Decimal,
    /// Cumulative executed quantity.
    pub executed_quantity: Decimal,
    /// Current lifecycle status.
    pub status: OrderStatus,
    /// Grouping tag carried over from the submission.
    pub group_id: u32,
    /// Creation timestamp (ms since epoch).
    pub created_ms: u64,
    /// Last update timestamp (ms since epoch).
    pub updated_ms: u64,
}

impl Order {
    /// Whether this order is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

impl std::fmt::Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "#{} {} {} {} {} @ {} ({}/{} filled)",
            self.order_id,
            self.symbol,
            self.side,
            self.status,
            self.quantity,
            self.price,
            self.executed_quantity,
            self.quantity,
        )
    }
}

// ---------------------------------------------------------------------------
// Ticker / market metadata
// ---------------------------------------------------------------------------

/// A best bid/ask snapshot from the exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    /// Best bid price.
    pub buy: Decimal,
    /// Best ask price.
    pub sell: Decimal,
    /// Snapshot timestamp (ms since epoch).
    pub time_ms: u64,
}

/// Static market metadata for one instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub symbol: String,
    /// Base currency (e.g. `"BTC"`).
    pub base_currency: String,
    /// Quote currency (e.g. `"USDT"`).
    pub quote_currency: String,
    /// Minimum order quantity in base currency.
    pub min_quantity: Decimal,
}
