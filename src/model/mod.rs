//! Data model for archived counter snapshots.

mod key;
mod snapshot;

pub use key::MetricKey;
pub use snapshot::{Cycle, Snapshot, SnapshotKind, Value};
