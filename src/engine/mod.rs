//! Replay engine: restart tracking, previous-cycle store and the cycle loop.

mod driver;
mod epoch;
mod store;

pub use driver::{
    BOOT_TIME_FIELD, CycleDriver, CycleHandler, CycleView, DriverState, RunSummary, boot_marker,
};
pub use epoch::{EpochChange, EpochTracker};
pub use store::SnapshotStore;
