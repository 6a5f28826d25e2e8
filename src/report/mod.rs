//! Concrete reports built on the cycle driver.
//!
//! Each report is a `CycleHandler` that turns snapshots into typed rows via
//! [`crate::rates`], plus a `render` step that prints the rows as a table or
//! as Graphite lines. Rows whose rate cannot be computed (zero elapsed
//! capture time) are skipped and logged at debug level.

pub mod cpustat;
pub mod fsstat;
pub mod heat;
pub mod info;
pub mod iostat;
pub mod load;
pub mod mpstat;
pub mod print;
pub mod sar;

use std::io::{self, Write};

use crate::engine::{CycleDriver, CycleHandler, CycleView, RunSummary};
use crate::error::KarError;
use crate::model::{MetricKey, Snapshot};
use crate::provider::SnapshotSequence;
use crate::util::Window;

pub use cpustat::CpustatReport;
pub use fsstat::{FsstatOptions, FsstatReport};
pub use heat::{HeatReport, HeatSource};
pub use info::ArchiveInfo;
pub use iostat::{IostatOptions, IostatReport, PartitionMode};
pub use load::LoadReport;
pub use mpstat::MpstatReport;
pub use print::{PrintPattern, PrintReport, TimeStyle};
pub use sar::SarReport;

/// A report: collects rows while the driver runs, then prints them.
pub trait Report: CycleHandler {
    fn render(&self, out: &mut dyn Write) -> io::Result<()>;
}

/// Runs `report` over `sequence` inside `window`.
pub fn run_report<S, R>(
    sequence: &mut S,
    window: Window,
    report: &mut R,
) -> Result<RunSummary, KarError>
where
    S: SnapshotSequence + ?Sized,
    R: Report + ?Sized,
{
    let mut driver = CycleDriver::new(window);
    driver.run(sequence, report)
}

/// `true` for a first-cycle key whose delta would span the whole uptime.
///
/// Graphite output drops these: without a prior the delta runs from counter
/// creation, which is only meaningful when the host booted inside the
/// reported day. After a restart the absence of a prior is expected and the
/// since-boot value is emitted.
pub(crate) fn spans_uptime(view: &CycleView<'_>, prior: Option<&Snapshot>) -> bool {
    view.first && prior.is_none() && view.boot_millis() < view.window.midnight
}

/// `true` if `snapshot` is the per-CPU `cpu:N:sys` set.
pub(crate) fn is_cpu_sys(snapshot: &Snapshot) -> bool {
    snapshot.key.module == "cpu" && snapshot.key.name == "sys"
}

/// Load averages from `unix:0:system_misc` (fixed point, scaled by 256).
pub(crate) fn load_averages(view: &CycleView<'_>) -> [f64; 3] {
    let Some(misc) = view.current(&MetricKey::system_misc()) else {
        return [0.0; 3];
    };
    [
        misc.long("avenrun_1min") as f64 / 256.0,
        misc.long("avenrun_5min") as f64 / 256.0,
        misc.long("avenrun_15min") as f64 / 256.0,
    ]
}

/// Time printed in the header of sar and load: boot time if the host came
/// up inside the window, otherwise the window start.
pub(crate) fn header_time(view: &CycleView<'_>) -> i64 {
    let start = if view.window.start == i64::MIN {
        view.timestamp
    } else {
        view.window.start
    };
    view.boot_millis().max(start)
}
