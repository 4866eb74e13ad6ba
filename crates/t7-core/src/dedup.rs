//! Trade-execution deduplication.
//!
//! The user-data stream delivers trade events at-least-once, and a
//! reconnect may replay fills that were already applied to the position
//! ledger. [`TradeIdDedup`] records every applied trade identifier so each
//! fill mutates the ledger exactly once for the lifetime of the process.
//!
//! Trade IDs are unique per exchange but not necessarily monotonic, so a
//! high-water mark is not sufficient; an exact set is required. Lossy
//! structures (Bloom-style tables) are ruled out for the same reason: a
//! false positive here would silently drop a real fill.

use ahash::AHashSet;

/// Exact-set deduplicator for applied trade identifiers.
///
/// # Thread safety
///
/// Not thread-safe. Owned by the single trade collector per instrument,
/// which is the only writer on that instrument's event path.
pub struct TradeIdDedup {
    applied: AHashSet<u64>,
}

impl TradeIdDedup {
    pub fn new() -> Self {
        Self {
            applied: AHashSet::new(),
        }
    }

    /// Check whether `trade_id` is new, recording it if so.
    ///
    /// Returns `true` if this is the first time the ID has been seen,
    /// `false` if it was already applied.
    #[inline]
    pub fn check_and_insert(&mut self, trade_id: u64) -> bool {
        self.applied.insert(trade_id)
    }

    /// Whether `trade_id` has already been applied.
    #[inline]
    pub fn contains(&self, trade_id: u64) -> bool {
        self.applied.contains(&trade_id)
    }

    /// Number of recorded trade IDs.
    pub fn len(&self) -> usize {
        self.applied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }

    /// Clear all state.
    pub fn clear(&mut self) {
        self.applied.clear();
    }
}

impl Default for TradeIdDedup {
    fn default() -> Self {
        Self::new()
    }
}
