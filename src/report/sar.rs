//! CPU utilization in the classic `sar -u` layout.
//!
//! Shares are computed from the CPU-time deltas summed over every
//! `cpu::sys` set, so they always add up to roughly 100. `%wio` is always
//! zero on systems that no longer account I/O wait separately.

use std::io::{self, Write};

use tracing::{debug, warn};

use crate::engine::{CycleHandler, CycleView};
use crate::fmt::{self, OutputFormat};
use crate::model::Snapshot;
use crate::rates::{raw_delta, regressed, round_half_up, share};

use super::{Report, header_time, is_cpu_sys};

/// CPU-time deltas of one interval, summed over all processors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub user: i64,
    pub kernel: i64,
    pub idle: i64,
}

impl CpuTimes {
    fn total(&self) -> i64 {
        self.user + self.kernel + self.idle
    }

    fn accumulate(&mut self, other: &CpuTimes) {
        self.user += other.user;
        self.kernel += other.kernel;
        self.idle += other.idle;
    }

    /// `(%usr, %sys, %idle)` as floats, `None` for an empty interval.
    fn shares(&self) -> Option<(f64, f64, f64)> {
        let total = self.total();
        Some((
            share(self.user, total).ok()?,
            share(self.kernel, total).ok()?,
            share(self.idle, total).ok()?,
        ))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SarLine {
    /// The host booted at this time (milliseconds).
    Restart(i64),
    Sample { timestamp: i64, times: CpuTimes },
}

pub struct SarReport {
    format: OutputFormat,
    header_time: Option<i64>,
    interval: CpuTimes,
    /// A CPU counter went backwards in this cycle without a boot-marker change.
    counters_reset: bool,
    lines: Vec<SarLine>,
}

impl SarReport {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            header_time: None,
            interval: CpuTimes::default(),
            counters_reset: false,
            lines: Vec::new(),
        }
    }

    pub fn lines(&self) -> &[SarLine] {
        &self.lines
    }

    /// Totals over every emitted interval.
    pub fn totals(&self) -> CpuTimes {
        let mut totals = CpuTimes::default();
        for line in &self.lines {
            if let SarLine::Sample { times, .. } = line {
                totals.accumulate(times);
            }
        }
        totals
    }

    fn render_table(&self, out: &mut dyn Write) -> io::Result<()> {
        let Some(header) = self.header_time else {
            return Ok(());
        };
        writeln!(
            out,
            "{}{:>8}{:>8}{:>8}{:>8}",
            fmt::clock(header),
            "%usr",
            "%sys",
            "%wio",
            "%idle"
        )?;
        for line in &self.lines {
            match line {
                SarLine::Restart(boot) => writeln!(out, "{}        unix restarts", fmt::clock(*boot))?,
                SarLine::Sample { timestamp, times } => {
                    if let Some((usr, sys, idl)) = times.shares() {
                        writeln!(
                            out,
                            "{}{:8}{:8}{:8}{:8}",
                            fmt::clock(*timestamp),
                            round_half_up(usr),
                            round_half_up(sys),
                            0,
                            round_half_up(idl)
                        )?;
                    }
                }
            }
        }
        writeln!(out)?;
        if let Some((usr, sys, idl)) = self.totals().shares() {
            writeln!(
                out,
                "Average {:8}{:8}{:8}{:8}",
                round_half_up(usr),
                round_half_up(sys),
                0,
                round_half_up(idl)
            )?;
        }
        Ok(())
    }

    fn render_graphite(&self, out: &mut dyn Write) -> io::Result<()> {
        for line in &self.lines {
            let SarLine::Sample { timestamp, times } = line else {
                continue;
            };
            let Some((usr, sys, idl)) = times.shares() else {
                continue;
            };
            let secs = timestamp.div_euclid(1000);
            fmt::graphite_f64(out, "user", usr, secs)?;
            fmt::graphite_f64(out, "kernel", sys, secs)?;
            fmt::graphite_f64(out, "idle", idl, secs)?;
        }
        Ok(())
    }
}

impl CycleHandler for SarReport {
    fn accepts(&self, snapshot: &Snapshot) -> bool {
        is_cpu_sys(snapshot)
    }

    fn begin_cycle(&mut self, view: &CycleView<'_>) {
        self.interval = CpuTimes::default();
        self.counters_reset = false;
        if view.first {
            self.header_time = Some(header_time(view));
        }
    }

    fn on_restart(&mut self, view: &CycleView<'_>) {
        self.lines.push(SarLine::Restart(view.boot_millis()));
    }

    fn on_snapshot(&mut self, _view: &CycleView<'_>, current: &Snapshot, prior: Option<&Snapshot>) {
        let mut times = CpuTimes {
            user: raw_delta(current, prior, "cpu_nsec_user"),
            kernel: raw_delta(current, prior, "cpu_nsec_kernel"),
            idle: raw_delta(current, prior, "cpu_nsec_idle"),
        };
        if regressed(times.user) || regressed(times.kernel) || regressed(times.idle) {
            warn!("sar: {} went backwards, counting from zero", current.key);
            times = CpuTimes {
                user: raw_delta(current, None, "cpu_nsec_user"),
                kernel: raw_delta(current, None, "cpu_nsec_kernel"),
                idle: raw_delta(current, None, "cpu_nsec_idle"),
            };
            self.counters_reset = true;
        }
        self.interval.accumulate(&times);
    }

    fn end_cycle(&mut self, view: &CycleView<'_>) {
        if view.first {
            let booted_inside = view.boot_millis() > view.window.start;
            if !booted_inside {
                debug!("sar: {} is the baseline", view.timestamp);
                return;
            }
            if !view.restarted {
                self.lines.push(SarLine::Restart(view.boot_millis()));
            }
        } else if self.counters_reset && !view.restarted {
            self.lines.push(SarLine::Restart(view.boot_millis()));
        }
        if self.interval.total() == 0 {
            debug!("sar: no cpu time elapsed at {}", view.timestamp);
            return;
        }
        self.lines.push(SarLine::Sample {
            timestamp: view.timestamp,
            times: self.interval,
        });
    }
}

impl Report for SarReport {
    fn render(&self, out: &mut dyn Write) -> io::Result<()> {
        match self.format {
            OutputFormat::Table => self.render_table(out),
            OutputFormat::Graphite => self.render_graphite(out),
        }
    }
}
