//! kar - replay archived kernel statistics as classic system reports.
//!
//! An archive is a time-ordered sequence of cycles, each holding snapshots
//! of named metric sets. The library provides:
//! - `engine` - the cycle driver with restart detection and prior lookup
//! - `rates` - delta and rate computation shared by every report
//! - `report` - iostat, mpstat, fsstat, cpustat, sar, load, print, heat, info
//! - `provider` - archive loading behind the `SnapshotSequence` trait

pub mod engine;
pub mod error;
pub mod fmt;
pub mod model;
pub mod provider;
pub mod rates;
pub mod report;
pub mod util;
