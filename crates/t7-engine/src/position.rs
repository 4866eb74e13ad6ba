//! Position ledger — average-cost accounting for one instrument.
//!
//! Pure computation, no I/O. The ledger tracks a signed base quantity and a
//! single blended entry price: position-increasing trades re-blend the
//! average cost, position-reducing trades realize PnL proportional to the
//! closed quantity. All arithmetic is `Decimal`.
//!
//! The ledger is mutated only by its owning trade collector, one trade at a
//! time, in arrival order.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use t7_core::time_util;
use t7_core::types::{Market, Side, Trade};

/// Result of applying one trade to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradePnl {
    /// Gross realized PnL in quote currency. Zero for opening trades.
    pub profit: Decimal,
    /// Gross PnL minus the trade fee (when the fee is in quote currency;
    /// converting other fee currencies is the caller's responsibility).
    pub net_profit: Decimal,
    /// Whether the trade closed all or part of an existing position.
    pub closed: bool,
}

/// Cost-basis accumulator for one instrument.
///
/// Serialized as the persisted state snapshot, so field names are part of
/// the state-v1 schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub base_currency: String,
    pub quote_currency: String,

    /// Signed base quantity: positive = net long, negative = net short.
    pub base: Decimal,

    /// Blended entry price in quote currency. Zero while flat.
    pub average_cost: Decimal,

    /// Realized PnL accumulated since `accumulated_since_ms`.
    pub accumulated_pnl: Decimal,

    /// Traded quote volume accumulated since `accumulated_since_ms`.
    pub accumulated_volume: Decimal,

    /// Start of the accumulation window (ms since epoch).
    pub accumulated_since_ms: u64,
}

impl Position {
    pub fn new(market: &Market) -> Self {
        Self {
            symbol: market.symbol.clone(),
            base_currency: market.base_currency.clone(),
            quote_currency: market.quote_currency.clone(),
            base: Decimal::ZERO,
            average_cost: Decimal::ZERO,
            accumulated_pnl: Decimal::ZERO,
            accumulated_volume: Decimal::ZERO,
            accumulated_since_ms: time_util::now_ms(),
        }
    }

    /// Whether the position is flat.
    pub fn is_flat(&self) -> bool {
        self.base.is_zero()
    }

    /// Reset quantity and cost basis, keeping the accumulation window.
    pub fn reset(&mut self) {
        self.base = Decimal::ZERO;
        self.average_cost = Decimal::ZERO;
    }

    /// Apply one trade using average-cost accounting.
    ///
    /// A trade whose direction matches the position's sign (or a trade into
    /// a flat position) only re-blends quantity and average cost. An
    /// opposing trade closes `min(quantity, |base|)` at
    /// `(price − average_cost) × overlap × sign`, and any excess beyond the
    /// overlap reverses the position at the trade price.
    pub fn add_trade(&mut self, trade: &Trade) -> TradePnl {
        let qty = trade.quantity;
        if qty.is_zero() {
            return TradePnl {
                profit: Decimal::ZERO,
                net_profit: Decimal::ZERO,
                closed: false,
            };
        }

        self.accumulated_volume += trade.quote_quantity();

        let fee_quote = if trade.fee_currency == self.quote_currency {
            trade.fee
        } else {
            Decimal::ZERO
        };

        let increasing = self.base.is_zero()
            || (self.base.is_sign_positive() == (trade.side == Side::Buy));

        if increasing {
            // re-blend the average cost over the enlarged position
            let prev_abs = self.base.abs();
            self.average_cost =
                (self.average_cost * prev_abs + trade.price * qty) / (prev_abs + qty);
            self.base += signed(trade.side, qty);
            return TradePnl {
                profit: Decimal::ZERO,
                net_profit: Decimal::ZERO,
                closed: false,
            };
        }

        // opposing trade: close the overlap, realize PnL
        let position_abs = self.base.abs();
        let overlap = qty.min(position_abs);
        let sign = Decimal::from(trade.side.opposite().sign());
        let profit = (trade.price - self.average_cost) * overlap * sign;
        self.accumulated_pnl += profit;

        let excess = qty - overlap;
        if excess.is_zero() {
            self.base += signed(trade.side, qty);
            if self.base.is_zero() {
                // no average cost while flat
                self.average_cost = Decimal::ZERO;
            }
        } else {
            // reversal: the remainder opens a new position at the trade price
            self.base = signed(trade.side, excess);
            self.average_cost = trade.price;
        }

        TradePnl {
            profit,
            net_profit: profit - fee_quote,
            closed: true,
        }
    }
}

fn signed(side: Side, qty: Decimal) -> Decimal {
    qty * Decimal::from(side.sign())
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} position: {} {} @ {} {} (pnl {} {})",
            self.symbol,
            self.base,
            self.base_currency,
            self.average_cost,
            self.quote_currency,
            self.accumulated_pnl,
            self.quote_currency,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{market, trade};

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn buy_from_flat_sets_cost_and_quantity() {
        let mut p = Position::new(&market());
        let r = p.add_trade(&trade(1, Side::Buy, "100", "2"));
        assert!(!r.closed);
        assert_eq!(p.base, dec("2"));
        assert_eq!(p.average_cost, dec("100"));
        assert_eq!(p.accumulated_volume, dec("200"));
    }

    #[test]
    fn full_close_realizes_pnl_and_flattens() {
        let mut p = Position::new(&market());
        p.add_trade(&trade(1, Side::Buy, "100", "2"));
        let r = p.add_trade(&trade(2, Side::Sell, "110", "2"));
        assert!(r.closed);
        assert_eq!(r.profit, dec("20")); // (110 - 100) * 2
        assert!(p.is_flat());
        assert_eq!(p.average_cost, Decimal::ZERO);
        assert_eq!(p.accumulated_pnl, dec("20"));
    }

    #[test]
    fn partial_close_keeps_average_cost() {
        let mut p = Position::new(&market());
        p.add_trade(&trade(1, Side::Buy, "100", "10"));
        let r = p.add_trade(&trade(2, Side::Sell, "110", "4"));
        assert_eq!(r.profit, dec("40")); // (110 - 100) * 4
        assert_eq!(p.base, dec("6"));
        assert_eq!(p.average_cost, dec("100"));
    }

    #[test]
    fn same_direction_trade_blends_average_cost() {
        let mut p = Position::new(&market());
        p.add_trade(&trade(1, Side::Buy, "100", "1"));
        let r = p.add_trade(&trade(2, Side::Buy, "200", "1"));
        assert!(!r.closed);
        assert_eq!(r.profit, Decimal::ZERO);
        assert_eq!(p.base, dec("2"));
        assert_eq!(p.average_cost, dec("150"));
    }

    #[test]
    fn reversal_opens_new_position_at_trade_price() {
        let mut p = Position::new(&market());
        p.add_trade(&trade(1, Side::Buy, "100", "2"));
        // sell 5: close 2 at +10 each, go short 3 at 110
        let r = p.add_trade(&trade(2, Side::Sell, "110", "5"));
        assert!(r.closed);
        assert_eq!(r.profit, dec("20"));
        assert_eq!(p.base, dec("-3"));
        assert_eq!(p.average_cost, dec("110"));
    }

    #[test]
    fn short_side_pnl_has_opposite_sign() {
        let mut p = Position::new(&market());
        p.add_trade(&trade(1, Side::Sell, "100", "3"));
        assert_eq!(p.base, dec("-3"));
        // buy back lower realizes a gain
        let r = p.add_trade(&trade(2, Side::Buy, "90", "3"));
        assert_eq!(r.profit, dec("30")); // (90 - 100) * 3 * (-1)
        assert!(p.is_flat());
    }

    #[test]
    fn quote_fee_reduces_net_profit_only() {
        let mut p = Position::new(&market());
        p.add_trade(&trade(1, Side::Buy, "100", "1"));
        let mut t = trade(2, Side::Sell, "110", "1");
        t.fee = dec("0.5");
        t.fee_currency = "USDT".into();
        let r = p.add_trade(&t);
        assert_eq!(r.profit, dec("10"));
        assert_eq!(r.net_profit, dec("9.5"));
        // gross pnl is what accumulates
        assert_eq!(p.accumulated_pnl, dec("10"));
    }

    #[test]
    fn non_quote_fee_is_not_subtracted() {
        let mut p = Position::new(&market());
        p.add_trade(&trade(1, Side::Buy, "100", "1"));
        let mut t = trade(2, Side::Sell, "110", "1");
        t.fee = dec("0.001");
        t.fee_currency = "BNB".into();
        let r = p.add_trade(&t);
        assert_eq!(r.net_profit, r.profit);
    }

    #[test]
    fn alternating_trades_never_corrupt_the_ledger() {
        let mut p = Position::new(&market());
        for i in 0..50u64 {
            let side = if i % 2 == 0 { Side::Buy } else { Side::Sell };
            p.add_trade(&trade(i, side, "100", "1"));
            // invariant: average cost is defined only while holding
            if p.base.is_zero() {
                assert_eq!(p.average_cost, Decimal::ZERO);
            } else {
                assert!(p.average_cost > Decimal::ZERO);
            }
        }
        assert!(p.is_flat());
    }
}
