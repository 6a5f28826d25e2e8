//! File system operation statistics.
//!
//! Per-filesystem sets have no common naming scheme; they are recognised by
//! carrying the `nsetsecattr` statistic.

use std::io::{self, Write};

use tracing::debug;

use crate::engine::{CycleHandler, CycleView};
use crate::error::KarError;
use crate::fmt::{self, OutputFormat, memscale};
use crate::model::Snapshot;
use crate::rates::{NANOS_PER_SEC, elapsed, rate_per_second, raw_delta};

use super::{Report, spans_uptime};

const MARKER: &str = "nsetsecattr";

/// Reported statistics, in column order.
pub const FIELDS: [&str; 11] = [
    "ncreate",
    "nremove",
    "nrename",
    "ngetattr",
    "nsetattr",
    "nlookup",
    "nreaddir",
    "nread",
    "read_bytes",
    "nwrite",
    "write_bytes",
];

#[derive(Clone, Copy, Debug, Default)]
pub struct FsstatOptions {
    pub format: OutputFormat,
    pub zero_hide: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FsstatRow {
    pub name: String,
    pub deltas: [i64; 11],
    pub elapsed: i64,
    pub midpoint: i64,
}

impl FsstatRow {
    fn rates(&self) -> Result<[f64; 11], KarError> {
        let mut rates = [0.0; 11];
        for (rate, delta) in rates.iter_mut().zip(self.deltas) {
            *rate = rate_per_second(delta, self.elapsed, NANOS_PER_SEC)?;
        }
        Ok(rates)
    }
}

pub struct FsstatReport {
    options: FsstatOptions,
    cycles: Vec<(i64, Vec<FsstatRow>)>,
}

impl FsstatReport {
    pub fn new(options: FsstatOptions) -> Self {
        Self {
            options,
            cycles: Vec::new(),
        }
    }

    pub fn cycles(&self) -> &[(i64, Vec<FsstatRow>)] {
        &self.cycles
    }

    fn render_table(&self, out: &mut dyn Write) -> io::Result<()> {
        for (timestamp, rows) in &self.cycles {
            writeln!(out, "{}    file system statistics", fmt::clock(*timestamp))?;
            writeln!(out, " new  name   name  attr  attr lookup rddir  read read  write write")?;
            writeln!(out, " file remov  chng   get   set    ops   ops   ops bytes   ops bytes")?;
            for r in rows {
                for delta in r.deltas {
                    write!(out, "{:>5} ", memscale(delta as f64))?;
                }
                writeln!(out, "{}", r.name)?;
            }
        }
        Ok(())
    }

    fn render_graphite(&self, out: &mut dyn Write) -> io::Result<()> {
        for r in self.cycles.iter().flat_map(|(_, rows)| rows) {
            let rates = match r.rates() {
                Ok(rates) => rates,
                Err(e) => {
                    debug!("fsstat: skipping {}: {}", r.name, e);
                    continue;
                }
            };
            for (field, rate) in FIELDS.iter().zip(rates) {
                fmt::graphite_f64(out, &format!("fsstat.{}.{}", r.name, field), rate, r.midpoint)?;
            }
        }
        Ok(())
    }
}

impl CycleHandler for FsstatReport {
    fn accepts(&self, snapshot: &Snapshot) -> bool {
        snapshot.has(MARKER)
    }

    fn begin_cycle(&mut self, view: &CycleView<'_>) {
        self.cycles.push((view.timestamp, Vec::new()));
    }

    fn on_snapshot(&mut self, view: &CycleView<'_>, current: &Snapshot, prior: Option<&Snapshot>) {
        let graphite = self.options.format == OutputFormat::Graphite;
        if graphite && spans_uptime(view, prior) {
            return;
        }
        let deltas = FIELDS.map(|f| raw_delta(current, prior, f));
        if !graphite && self.options.zero_hide && deltas.iter().all(|d| *d == 0) {
            return;
        }
        let el = elapsed(current, prior);
        let row = FsstatRow {
            name: current.key.name.clone(),
            deltas,
            elapsed: el,
            midpoint: fmt::midpoint_secs(view.timestamp, el),
        };
        if let Some((_, rows)) = self.cycles.last_mut() {
            rows.push(row);
        }
    }
}

impl Report for FsstatReport {
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
    use crate::model::MetricKey;
    use crate::provider::HistorySequence;
    use crate::report::run_report;
    use crate::report::testdata::{OLD_BOOT, SEC, cycle, day_window};

    fn fs(name: &str, snaptime: i64, reads: i64, bytes: i64) -> Snapshot {
        Snapshot::new(MetricKey::new("unix", 0, name), snaptime, 0)
            .with_value(MARKER, 0)
            .with_value("nread", reads)
            .with_value("read_bytes", bytes)
    }

    fn archive() -> HistorySequence {
        HistorySequence::from_cycles(vec![
            cycle(
                10_000,
                OLD_BOOT,
                10 * SEC,
                vec![fs("vopstats_zfs", 10 * SEC, 100, 0), fs("vopstats_tmpfs", 10 * SEC, 5, 0)],
            ),
            cycle(
                20_000,
                OLD_BOOT,
                20 * SEC,
                vec![
                    fs("vopstats_zfs", 20 * SEC, 600, 20 * 1024 * 1024),
                    fs("vopstats_tmpfs", 20 * SEC, 5, 0),
                ],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_table_prints_scaled_deltas() {
        let options = FsstatOptions {
            zero_hide: true,
            ..Default::default()
        };
        let mut report = FsstatReport::new(options);
        run_report(&mut archive(), day_window(), &mut report).unwrap();

        let (_, rows) = &report.cycles()[1];
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "vopstats_zfs");

        let mut out = Vec::new();
        report.render(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let last = text.lines().last().unwrap();
        assert!(last.contains("  500   20M "));
        assert!(last.ends_with("vopstats_zfs"));
    }

    #[test]
    fn test_graphite_rates() {
        let options = FsstatOptions {
            format: OutputFormat::Graphite,
            ..Default::default()
        };
        let mut report = FsstatReport::new(options);
        run_report(&mut archive(), day_window(), &mut report).unwrap();

        let mut out = Vec::new();
        report.render(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 22);
        assert!(text.contains("fsstat.vopstats_zfs.nread 50.00 15\n"));
        assert!(text.contains("fsstat.vopstats_tmpfs.nread 0.00 15\n"));
    }
}
