//! Utilization heatmaps.
//!
//! Every cycle becomes one column; each CPU or disk lands in the row of
//! its busy fraction (row 0 is 100%). Cells count how many sources fell
//! into that row during the cycle.

use std::io::{self, Write};

use tracing::debug;

use crate::engine::{CycleHandler, CycleView};
use crate::model::{Snapshot, SnapshotKind};
use crate::rates::{elapsed, offset_bucket, raw_delta};

use super::{Report, is_cpu_sys};

pub const DEFAULT_BUCKETS: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeatSource {
    /// Busy fraction `(usr + sys) / (usr + sys + idl)` of each `cpu::sys`.
    Cpu,
    /// Busy fraction of the run queue of each physical disk.
    Io,
}

pub struct HeatReport {
    source: HeatSource,
    buckets: usize,
    /// `counts[bucket][column]`
    counts: Vec<Vec<u32>>,
    columns: usize,
}

impl HeatReport {
    pub fn new(source: HeatSource) -> Self {
        Self::with_buckets(source, DEFAULT_BUCKETS)
    }

    pub fn with_buckets(source: HeatSource, buckets: usize) -> Self {
        Self {
            source,
            buckets,
            counts: vec![Vec::new(); buckets],
            columns: 0,
        }
    }

    pub fn counts(&self) -> &[Vec<u32>] {
        &self.counts
    }

    fn title(&self) -> &'static str {
        match self.source {
            HeatSource::Cpu => "CPU utilization",
            HeatSource::Io => "Disk utilization",
        }
    }

    fn busy_fraction(&self, current: &Snapshot, prior: Option<&Snapshot>) -> Option<f64> {
        match self.source {
            HeatSource::Cpu => {
                let busy = raw_delta(current, prior, "cpu_nsec_user")
                    + raw_delta(current, prior, "cpu_nsec_kernel");
                let total = busy + raw_delta(current, prior, "cpu_nsec_idle");
                // 0/0 gives NaN, which lands in the idle row.
                Some(busy as f64 / total as f64)
            }
            HeatSource::Io => {
                let el = elapsed(current, prior);
                if el == 0 {
                    return None;
                }
                Some(raw_delta(current, prior, "rtime") as f64 / el as f64)
            }
        }
    }
}

fn cell(count: u32) -> char {
    match count {
        0 => ' ',
        1..=9 => char::from_digit(count, 10).unwrap_or('+'),
        _ => '+',
    }
}

impl CycleHandler for HeatReport {
    fn accepts(&self, snapshot: &Snapshot) -> bool {
        match self.source {
            HeatSource::Cpu => is_cpu_sys(snapshot),
            HeatSource::Io => {
                snapshot.kind == SnapshotKind::Io
                    && snapshot.class == "disk"
                    && snapshot.key.module != "md"
            }
        }
    }

    fn begin_cycle(&mut self, _view: &CycleView<'_>) {
        for row in &mut self.counts {
            row.push(0);
        }
        self.columns += 1;
    }

    fn on_snapshot(&mut self, _view: &CycleView<'_>, current: &Snapshot, prior: Option<&Snapshot>) {
        let Some(fraction) = self.busy_fraction(current, prior) else {
            debug!("heat: skipping {}: zero elapsed", current.key);
            return;
        };
        let bucket = offset_bucket(fraction, self.buckets);
        if let Some(c) = self.counts.get_mut(bucket).and_then(|row| row.last_mut()) {
            *c += 1;
        }
    }
}

impl Report for HeatReport {
    fn render(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "{}", self.title())?;
        let step = if self.buckets == 0 {
            0.0
        } else {
            100.0 / self.buckets as f64
        };
        for (i, row) in self.counts.iter().enumerate() {
            let label = 100.0 - step * i as f64;
            let line: String = row.iter().map(|c| cell(*c)).collect();
            writeln!(out, "{:>4.0}% |{}", label, line.trim_end())?;
        }
        writeln!(out, "      +{}", "-".repeat(self.columns))?;
        Ok(())
    }
}
