//! Data model shared across the runtime.
//!
//! All prices, quantities, and fee amounts are [`rust_decimal::Decimal`] —
//! never binary floating point — so PnL and quantity-threshold comparisons
//! are deterministic.

pub mod enums;
pub mod order;
pub mod trade;

pub use enums::*;
pub use order::*;
pub use trade::*;
