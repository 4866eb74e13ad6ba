//! Trade-execution structures.
//!
//! A [`Trade`] is one fill reported by the exchange's user-data stream.
//! Trade identifiers are unique per exchange but MUST NOT be assumed
//! monotonically increasing; the dedup layer therefore uses an exact set
//! rather than a high-water mark.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::Side;

/// A single trade execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    /// Exchange-assigned trade ID, unique per exchange.
    pub trade_id: u64,
    /// Exchange ID of the order this trade fills.
    pub order_id: u64,
    /// Unified symbol.
    pub symbol: String,
    /// Direction of the filled order.
    pub side: Side,
    /// Execution price.
    pub price: Decimal,
    /// Executed quantity in base currency.
    pub quantity: Decimal,
    /// Executed value in quote currency. Zero when the feed omits it; use
    /// [`quote_quantity`](Trade::quote_quantity) to read the effective value.
    pub quote_quantity: Decimal,
    /// Fee amount in `fee_currency`.
    pub fee: Decimal,
    /// Currency the fee was charged in.
    pub fee_currency: String,
    /// Whether this fill was the maker side.
    pub is_maker: bool,
    /// Execution timestamp (ms since epoch).
    pub time_ms: u64,
}

impl Trade {
    /// Executed value in quote currency, computed as price × quantity when
    /// the exchange did not report it separately.
    pub fn quote_quantity(&self) -> Decimal {
        if self.quote_quantity.is_zero() {
            self.price * self.quantity
        } else {
            self.quote_quantity
        }
    }
}

impl std::fmt::Display for Trade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "trade #{} order #{} {} {} {} @ {} ({})",
            self.trade_id,
            self.order_id,
            self.symbol,
            self.side,
            self.quantity,
            self.price,
            if self.is_maker { "maker" } else { "taker" },
        )
    }
}
