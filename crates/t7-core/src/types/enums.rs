//! Enumerations used throughout the reconciliation runtime.
//!
//! Order lifecycle states form a monotonic machine: `New` →
//! `PartiallyFilled` → one of the terminal states. An order never re-enters
//! an earlier state; the order store enforces this via [`OrderStatus::precedence`].

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// Buy or sell direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The opposite direction.
    pub fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// Signed multiplier: +1 for buy, -1 for sell.
    pub fn sign(self) -> i64 {
        match self {
            Self::Buy => 1,
            Self::Sell => -1,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

// ---------------------------------------------------------------------------
// Order type / time-in-force
// ---------------------------------------------------------------------------

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
    Market,
    /// Post-only limit order, rejected if it would take liquidity.
    LimitMaker,
    StopLimit,
    StopMarket,
}

/// Time-in-force for limit orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TimeInForce {
    #[default]
    Gtc,
    Ioc,
    Fok,
}

// ---------------------------------------------------------------------------
// Order status
// ---------------------------------------------------------------------------

/// Order lifecycle status — unified across exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
}

impl OrderStatus {
    /// Whether this status is terminal — no further transitions occur.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Canceled | Self::Rejected | Self::Expired
        )
    }

    /// Lifecycle ordinal used by the order store's staleness guard.
    ///
    /// An incoming update whose precedence is lower than the stored one is
    /// logically older (e.g. a late `New` echo arriving after `Filled`) and
    /// must not overwrite the stored record.
    pub fn precedence(self) -> u8 {
        match self {
            Self::New => 0,
            Self::PartiallyFilled => 1,
            Self::Filled | Self::Canceled | Self::Rejected | Self::Expired => 2,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f, "NEW"),
            Self::PartiallyFilled => write!(f, "PARTIALLY_FILLED"),
            Self::Filled => write!(f, "FILLED"),
            Self::Canceled => write!(f, "CANCELED"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Expired => write!(f, "EXPIRED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_sign_matches_direction() {
        assert_eq!(Side::Buy.sign(), 1);
        assert_eq!(Side::Sell.sign(), -1);
        assert_eq!(Side::Buy.opposite(), Side::Sell);
    }

    #[test]
    fn terminal_statuses() {
        assert!(!OrderStatus::New.is_terminal());
        assert!(!OrderStatus::PartiallyFilled.is_terminal());
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Canceled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
        assert!(OrderStatus::Expired.is_terminal());
    }

    #[test]
    fn precedence_is_monotonic_along_lifecycle() {
        assert!(OrderStatus::New.precedence() < OrderStatus::PartiallyFilled.precedence());
        assert!(OrderStatus::PartiallyFilled.precedence() < OrderStatus::Filled.precedence());
        assert_eq!(
            OrderStatus::Canceled.precedence(),
            OrderStatus::Expired.precedence()
        );
    }
}
