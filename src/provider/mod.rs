//! Snapshot-sequence abstraction.
//!
//! This module defines the `SnapshotSequence` trait the cycle driver pulls
//! data through, so reports can run over any source of archived cycles.

mod history;

pub use history::HistorySequence;

use std::sync::Arc;

use crate::model::{Cycle, MetricKey, Snapshot};

/// Ordered, forward-only source of cycles.
///
/// A sequence always has a current cycle; implementations reject empty
/// input at construction time.
pub trait SnapshotSequence {
    /// Returns the current cycle.
    fn current(&self) -> &Cycle;

    /// Moves to the next cycle.
    ///
    /// Returns `false` when the sequence is exhausted; the current cycle is
    /// then left unchanged.
    fn advance(&mut self) -> bool;

    /// Wall-clock time of the current cycle in milliseconds.
    fn wall_clock_millis(&self) -> i64 {
        self.current().timestamp
    }

    /// Snapshots of the current cycle, sorted by key.
    fn snapshots(&self) -> &[Arc<Snapshot>] {
        &self.current().snapshots
    }

    /// Looks up one well-known metric set in the current cycle.
    fn lookup(&self, key: &MetricKey) -> Option<&Arc<Snapshot>> {
        self.current().lookup(key)
    }
}
