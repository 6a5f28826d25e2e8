//! Load averages per cycle.

use std::io::{self, Write};

use crate::engine::{CycleHandler, CycleView};
use crate::fmt::{self, OutputFormat};
use crate::model::Snapshot;

use super::{Report, header_time, load_averages};

pub struct LoadReport {
    format: OutputFormat,
    header_time: Option<i64>,
    rows: Vec<(i64, [f64; 3])>,
}

impl LoadReport {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            header_time: None,
            rows: Vec::new(),
        }
    }

    pub fn rows(&self) -> &[(i64, [f64; 3])] {
        &self.rows
    }
}

impl CycleHandler for LoadReport {
    // Everything comes from `unix:0:system_misc` via the view.
    fn accepts(&self, _snapshot: &Snapshot) -> bool {
        false
    }

    fn begin_cycle(&mut self, view: &CycleView<'_>) {
        if view.first {
            self.header_time = Some(header_time(view));
        }
        self.rows.push((view.timestamp, load_averages(view)));
    }

    fn on_snapshot(&mut self, _view: &CycleView<'_>, _current: &Snapshot, _prior: Option<&Snapshot>) {}
}

impl Report for LoadReport {
    fn render(&self, out: &mut dyn Write) -> io::Result<()> {
        match self.format {
            OutputFormat::Table => {
                if let Some(header) = self.header_time {
                    writeln!(out, "{}{:>8}{:>8}{:>8}", fmt::clock(header), "1min", "5min", "15min")?;
                }
                for (timestamp, load) in &self.rows {
                    writeln!(
                        out,
                        "{}{:8.2}{:8.2}{:8.2}",
                        fmt::clock(*timestamp),
                        load[0],
                        load[1],
                        load[2]
                    )?;
                }
            }
            OutputFormat::Graphite => {
                for (timestamp, load) in &self.rows {
                    let secs = timestamp.div_euclid(1000);
                    writeln!(out, "load.1min {:.6} {}", load[0], secs)?;
                    writeln!(out, "load.5min {:.6} {}", load[1], secs)?;
                    writeln!(out, "load.15min {:.6} {}", load[2], secs)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::HistorySequence;
    use crate::report::run_report;
    use crate::report::testdata::{OLD_BOOT, SEC, cycle, day_window};

    fn archive() -> HistorySequence {
        HistorySequence::from_cycles(vec![
            cycle(10_000, OLD_BOOT, 10 * SEC, vec![]),
            cycle(20_000, OLD_BOOT, 20 * SEC, vec![]),
        ])
        .unwrap()
    }

    #[test]
    fn test_load_rows() {
        let mut report = LoadReport::new(OutputFormat::Table);
        run_report(&mut archive(), day_window(), &mut report).unwrap();
        assert_eq!(
            report.rows(),
            &[(10_000, [1.0, 0.5, 0.25]), (20_000, [1.0, 0.5, 0.25])]
        );

        let mut out = Vec::new();
        report.render(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("    1min    5min   15min"));
        assert!(lines[1].ends_with("    1.00    0.50    0.25"));
    }

    #[test]
    fn test_graphite() {
        let mut report = LoadReport::new(OutputFormat::Graphite);
        run_report(&mut archive(), day_window(), &mut report).unwrap();

        let mut out = Vec::new();
        report.render(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("load.1min 1.000000 10\nload.5min 0.500000 10\n"));
        assert_eq!(text.lines().count(), 6);
    }
}
