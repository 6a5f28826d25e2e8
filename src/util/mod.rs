//! Utility modules for kar.

mod time_window;

pub use time_window::{TimeSpec, Window, resolve_window};
