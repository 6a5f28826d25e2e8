//! Extended device statistics.

use std::io::{self, Write};

use tracing::debug;

use crate::engine::{CycleHandler, CycleView};
use crate::error::KarError;
use crate::fmt::{self, OutputFormat};
use crate::model::{Snapshot, SnapshotKind};
use crate::rates::{NANOS_PER_SEC, elapsed, percentage, rate_per_second, raw_delta, round_half_up};

use super::{Report, spans_uptime};

/// Which I/O sets are shown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PartitionMode {
    /// Disks only (class `partition` hidden).
    #[default]
    HidePartitions,
    /// Everything.
    ShowAll,
    /// Partitions and other non-disk sets (class `disk` hidden).
    HideDisks,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct IostatOptions {
    pub format: OutputFormat,
    pub partitions: PartitionMode,
    /// Hide rows where every counter is unchanged.
    pub zero_hide: bool,
    /// Report throughput in MB/s instead of kB/s.
    pub megabytes: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IostatRow {
    pub device: String,
    pub reads: f64,
    pub writes: f64,
    pub kread: f64,
    pub kwrite: f64,
    pub wait: f64,
    pub actv: f64,
    pub wsvc_t: f64,
    pub asvc_t: f64,
    pub pct_wait: i64,
    pub pct_busy: i64,
    /// Graphite timestamp (interval midpoint, seconds).
    pub midpoint: i64,
}

const COUNTERS: [&str; 8] = [
    "reads", "writes", "nread", "nwritten", "rtime", "wtime", "rlentime", "wlentime",
];

pub struct IostatReport {
    options: IostatOptions,
    cycles: Vec<(i64, Vec<IostatRow>)>,
}

impl IostatReport {
    pub fn new(options: IostatOptions) -> Self {
        Self {
            options,
            cycles: Vec::new(),
        }
    }

    /// Rows per cycle timestamp.
    pub fn cycles(&self) -> &[(i64, Vec<IostatRow>)] {
        &self.cycles
    }

    fn compute(
        &self,
        timestamp: i64,
        current: &Snapshot,
        prior: Option<&Snapshot>,
    ) -> Result<Option<IostatRow>, KarError> {
        let [nr, nw, nkr, nkw, nrtime, nwtime, nrlentime, nwlentime] =
            COUNTERS.map(|f| raw_delta(current, prior, f));

        if self.options.zero_hide && [nr, nw, nkr, nkw, nrtime, nwtime, nrlentime, nwlentime]
            .iter()
            .all(|d| *d == 0)
        {
            return Ok(None);
        }

        let el = elapsed(current, prior);
        let kscale = if self.options.megabytes {
            1024.0 * 1024.0
        } else {
            1024.0
        };
        let wait = rate_per_second(nwlentime, el, 1.0)?;
        let actv = rate_per_second(nrlentime, el, 1.0)?;
        let ops = (nr + nw) as f64;
        let (wsvc_t, asvc_t) = if nr + nw == 0 {
            (0.0, 0.0)
        } else {
            (wait / (1000.0 * ops), actv / (1000.0 * ops))
        };

        Ok(Some(IostatRow {
            device: current.key.name.clone(),
            reads: rate_per_second(nr, el, NANOS_PER_SEC)?,
            writes: rate_per_second(nw, el, NANOS_PER_SEC)?,
            kread: rate_per_second(nkr, el, NANOS_PER_SEC / kscale)?,
            kwrite: rate_per_second(nkw, el, NANOS_PER_SEC / kscale)?,
            wait,
            actv,
            wsvc_t,
            asvc_t,
            pct_wait: round_half_up(percentage(nwtime, el, NANOS_PER_SEC)?),
            pct_busy: round_half_up(percentage(nrtime, el, NANOS_PER_SEC)?),
            midpoint: fmt::midpoint_secs(timestamp, el),
        }))
    }

    fn render_table(&self, out: &mut dyn Write) -> io::Result<()> {
        let unit = if self.options.megabytes { "M" } else { "k" };
        for (timestamp, rows) in &self.cycles {
            writeln!(out, "{}    extended device statistics", fmt::clock(*timestamp))?;
            writeln!(
                out,
                "    r/s    w/s   {u}r/s   {u}w/s wait actv wsvc_t asvc_t  %w  %b device",
                u = unit
            )?;
            for r in rows {
                writeln!(
                    out,
                    "{:7.1} {:6.1} {:6.1} {:6.1} {:4.1} {:4.1} {:6.1} {:6.1} {:3} {:3} {}",
                    r.reads,
                    r.writes,
                    r.kread,
                    r.kwrite,
                    r.wait,
                    r.actv,
                    r.wsvc_t,
                    r.asvc_t,
                    r.pct_wait,
                    r.pct_busy,
                    r.device
                )?;
            }
        }
        Ok(())
    }

    fn render_graphite(&self, out: &mut dyn Write) -> io::Result<()> {
        for r in self.cycles.iter().flat_map(|(_, rows)| rows) {
            let path = |field: &str| format!("iostat.{}.{}", r.device, field);
            let secs = r.midpoint;
            fmt::graphite_f64(out, &path("reads"), r.reads, secs)?;
            fmt::graphite_f64(out, &path("writes"), r.writes, secs)?;
            fmt::graphite_f64(out, &path("kread"), r.kread, secs)?;
            fmt::graphite_f64(out, &path("kwrite"), r.kwrite, secs)?;
            fmt::graphite_f64(out, &path("wait"), r.wait, secs)?;
            fmt::graphite_f64(out, &path("actv"), r.actv, secs)?;
            fmt::graphite_f64(out, &path("wsvc_t"), r.wsvc_t, secs)?;
            fmt::graphite_f64(out, &path("asvc_t"), r.asvc_t, secs)?;
            fmt::graphite_i64(out, &path("pcwait"), r.pct_wait, secs)?;
            fmt::graphite_i64(out, &path("pcbusy"), r.pct_busy, secs)?;
        }
        Ok(())
    }
}

impl CycleHandler for IostatReport {
    fn accepts(&self, snapshot: &Snapshot) -> bool {
        if snapshot.kind != SnapshotKind::Io || snapshot.key.module == "usba" {
            return false;
        }
        match self.options.partitions {
            PartitionMode::ShowAll => true,
            PartitionMode::HideDisks => snapshot.class != "disk",
            PartitionMode::HidePartitions => snapshot.class != "partition",
        }
    }

    fn begin_cycle(&mut self, view: &CycleView<'_>) {
        self.cycles.push((view.timestamp, Vec::new()));
    }

    fn on_snapshot(&mut self, view: &CycleView<'_>, current: &Snapshot, prior: Option<&Snapshot>) {
        if self.options.format == OutputFormat::Graphite && spans_uptime(view, prior) {
            return;
        }
        match self.compute(view.timestamp, current, prior) {
            Ok(Some(row)) => {
                if let Some((_, rows)) = self.cycles.last_mut() {
                    rows.push(row);
                }
            }
            Ok(None) => {}
            Err(e) => debug!("iostat: skipping {}: {}", current.key, e),
        }
    }
}

impl Report for IostatReport {
    fn render(&self, out: &mut dyn Write) -> io::Result<()> {
        match self.options.format {
            OutputFormat::Table => self.render_table(out),
            OutputFormat::Graphite => self.render_graphite(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::HistorySequence;
    use crate::report::run_report;
    use crate::report::testdata::{OLD_BOOT, SEC, cycle, day_window, disk};
    use crate::util::Window;

    fn archive() -> HistorySequence {
        HistorySequence::from_cycles(vec![
            cycle(
                10_000,
                OLD_BOOT,
                10 * SEC,
                vec![
                    disk("sd0", 0, "disk", 10 * SEC, &[("reads", 100), ("nread", 0)]),
                    disk("sd0,a", 0, "partition", 10 * SEC, &[("reads", 100)]),
                    disk("sd1", 1, "disk", 10 * SEC, &[("reads", 7)]),
                ],
            ),
            cycle(
                20_000,
                OLD_BOOT,
                20 * SEC,
                vec![
                    disk(
                        "sd0",
                        0,
                        "disk",
                        20 * SEC,
                        &[("reads", 200), ("nread", 10 * 1024 * 1024), ("rtime", 5 * SEC)],
                    ),
                    disk("sd0,a", 0, "partition", 20 * SEC, &[("reads", 200)]),
                    disk("sd1", 1, "disk", 20 * SEC, &[("reads", 7)]),
                ],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_rates_and_partition_policy() {
        let mut report = IostatReport::new(IostatOptions::default());
        run_report(&mut archive(), Window::unbounded(), &mut report).unwrap();

        let (_, rows) = &report.cycles()[1];
        let names: Vec<&str> = rows.iter().map(|r| r.device.as_str()).collect();
        assert_eq!(names, vec!["sd0", "sd1"]);

        let sd0 = &rows[0];
        assert_eq!(sd0.reads, 10.0);
        assert_eq!(sd0.kread, 1024.0);
        assert_eq!(sd0.pct_busy, 50);
        assert_eq!(sd0.midpoint, 15);
    }

    #[test]
    fn test_zero_hide_and_megabytes() {
        let options = IostatOptions {
            zero_hide: true,
            megabytes: true,
            partitions: PartitionMode::HideDisks,
            ..Default::default()
        };
        let mut report = IostatReport::new(options);
        run_report(&mut archive(), Window::unbounded(), &mut report).unwrap();

        let (_, rows) = &report.cycles()[1];
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].device, "sd0,a");

        let options = IostatOptions {
            zero_hide: true,
            megabytes: true,
            ..Default::default()
        };
        let mut report = IostatReport::new(options);
        run_report(&mut archive(), Window::unbounded(), &mut report).unwrap();
        let (_, rows) = &report.cycles()[1];
        // sd1 did nothing during the interval.
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].kread, 1.0);
    }

    #[test]
    fn test_graphite_skips_uptime_spanning_rows() {
        let options = IostatOptions {
            format: OutputFormat::Graphite,
            ..Default::default()
        };
        let mut report = IostatReport::new(options);
        run_report(&mut archive(), day_window(), &mut report).unwrap();
        assert!(report.cycles()[0].1.is_empty());

        let mut out = Vec::new();
        report.render(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("iostat.sd0.reads 10.00 15\n"));
        assert!(text.contains("iostat.sd0.pcbusy 50 15\n"));
        assert_eq!(text.lines().count(), 20);
    }

    #[test]
    fn test_table_layout() {
        let mut report = IostatReport::new(IostatOptions::default());
        run_report(&mut archive(), Window::unbounded(), &mut report).unwrap();

        let mut out = Vec::new();
        report.render(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].ends_with("    extended device statistics"));
        assert!(lines[1].starts_with("    r/s    w/s   kr/s   kw/s"));
        assert!(lines.iter().any(|l| l.ends_with(" 50 sd0")));
    }
}
