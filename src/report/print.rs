//! Raw statistic dump selected by `module:instance:name[:statistic]` patterns.

use std::fmt::Display;
use std::io::{self, Write};
use std::str::FromStr;

use crate::engine::{CycleHandler, CycleView};
use crate::error::KarError;
use crate::fmt::{self, OutputFormat};
use crate::model::{MetricKey, Snapshot, Value};

use super::Report;

/// One selection pattern. `None` components match anything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrintPattern {
    pub module: Option<String>,
    pub instance: Option<u32>,
    pub name: Option<String>,
    pub statistic: Option<String>,
}

fn component(part: Option<&str>) -> Option<String> {
    part.filter(|p| !p.is_empty()).map(str::to_string)
}

impl PrintPattern {
    /// Builds a pattern from separate module/instance/name/statistic values.
    pub fn from_parts(
        module: Option<&str>,
        instance: Option<&str>,
        name: Option<&str>,
        statistic: Option<&str>,
    ) -> Result<Self, KarError> {
        let instance = match instance.filter(|i| !i.is_empty()) {
            Some(i) => Some(
                i.parse()
                    .map_err(|_| KarError::Parse(format!("invalid instance '{}'", i)))?,
            ),
            None => None,
        };
        Ok(Self {
            module: component(module),
            instance,
            name: component(name),
            statistic: component(statistic),
        })
    }

    pub fn matches_key(&self, key: &MetricKey) -> bool {
        self.module.as_ref().is_none_or(|m| *m == key.module)
            && self.instance.is_none_or(|i| i == key.instance)
            && self.name.as_ref().is_none_or(|n| *n == key.name)
    }

    pub fn matches_statistic(&self, statistic: &str) -> bool {
        self.statistic.as_ref().is_none_or(|s| s == statistic)
    }
}

impl FromStr for PrintPattern {
    type Err = KarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(4, ':');
        Self::from_parts(parts.next(), parts.next(), parts.next(), parts.next())
    }
}

/// Time column style (`-T d` or `-T u`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimeStyle {
    /// Local `HH:MM:SS`.
    #[default]
    Clock,
    /// Seconds since the epoch.
    Epoch,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PrintRow {
    pub timestamp: i64,
    pub key: MetricKey,
    pub statistic: String,
    pub value: Value,
}

pub struct PrintReport {
    format: OutputFormat,
    time_style: TimeStyle,
    patterns: Vec<PrintPattern>,
    rows: Vec<PrintRow>,
}

impl PrintReport {
    pub fn new(format: OutputFormat, time_style: TimeStyle, patterns: Vec<PrintPattern>) -> Self {
        Self {
            format,
            time_style,
            patterns,
            rows: Vec::new(),
        }
    }

    pub fn rows(&self) -> &[PrintRow] {
        &self.rows
    }

    fn time(&self, timestamp: i64) -> Box<dyn Display> {
        match self.time_style {
            TimeStyle::Clock => Box::new(fmt::clock(timestamp)),
            TimeStyle::Epoch => Box::new(timestamp.div_euclid(1000)),
        }
    }
}

impl CycleHandler for PrintReport {
    fn accepts(&self, snapshot: &Snapshot) -> bool {
        self.patterns.iter().any(|p| p.matches_key(&snapshot.key))
    }

    fn on_snapshot(&mut self, view: &CycleView<'_>, current: &Snapshot, _prior: Option<&Snapshot>) {
        let patterns: Vec<&PrintPattern> = self
            .patterns
            .iter()
            .filter(|p| p.matches_key(&current.key))
            .collect();
        for (statistic, value) in &current.data {
            if patterns.iter().any(|p| p.matches_statistic(statistic)) {
                self.rows.push(PrintRow {
                    timestamp: view.timestamp,
                    key: current.key.clone(),
                    statistic: statistic.clone(),
                    value: value.clone(),
                });
            }
        }
    }
}

impl Report for PrintReport {
    fn render(&self, out: &mut dyn Write) -> io::Result<()> {
        for r in &self.rows {
            match (self.format, &r.value) {
                (OutputFormat::Table, Value::Str(s)) => {
                    writeln!(out, "{}\t{}:{}\t{}", self.time(r.timestamp), r.key, r.statistic, s)?
                }
                (OutputFormat::Table, v) => writeln!(
                    out,
                    "{}\t{}:{}\t{:>8}",
                    self.time(r.timestamp),
                    r.key,
                    r.statistic,
                    v.to_string()
                )?,
                (OutputFormat::Graphite, Value::Str(_)) => {}
                (OutputFormat::Graphite, v) => writeln!(
                    out,
                    "{}:{} {} {}",
                    r.key,
                    r.statistic,
                    v,
                    r.timestamp.div_euclid(1000)
                )?,
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
    use crate::report::testdata::{OLD_BOOT, SEC, cycle, day_window, disk};

    #[test]
    fn test_pattern_parsing() {
        let p: PrintPattern = "sd::sd0".parse().unwrap();
        assert_eq!(p.module.as_deref(), Some("sd"));
        assert_eq!(p.instance, None);
        assert_eq!(p.name.as_deref(), Some("sd0"));
        assert_eq!(p.statistic, None);

        let p: PrintPattern = "cpu".parse().unwrap();
        assert!(p.matches_key(&MetricKey::new("cpu", 3, "sys")));
        assert!(!p.matches_key(&MetricKey::new("sd", 0, "sd0")));

        let p: PrintPattern = ":::reads".parse().unwrap();
        assert!(p.matches_key(&MetricKey::new("sd", 0, "sd0")));
        assert!(p.matches_statistic("reads"));
        assert!(!p.matches_statistic("writes"));

        assert!(matches!("sd:x:sd0".parse::<PrintPattern>(), Err(KarError::Parse(_))));
    }

    fn archive() -> HistorySequence {
        HistorySequence::from_cycles(vec![cycle(
            10_000,
            OLD_BOOT,
            10 * SEC,
            vec![
                disk("sd0", 0, "disk", 10 * SEC, &[("reads", 42), ("writes", 7)])
                    .with_text("vendor", "ACME"),
                disk("sd1", 1, "disk", 10 * SEC, &[("reads", 1)]),
            ],
        )])
        .unwrap()
    }

    #[test]
    fn test_selects_statistics() {
        let patterns = vec!["sd:0:sd0".parse().unwrap(), ":1::writes".parse().unwrap()];
        let mut report = PrintReport::new(OutputFormat::Table, TimeStyle::Epoch, patterns);
        run_report(&mut archive(), day_window(), &mut report).unwrap();

        let names: Vec<String> = report
            .rows()
            .iter()
            .map(|r| format!("{}:{}", r.key, r.statistic))
            .collect();
        assert_eq!(names, vec!["sd:0:sd0:reads", "sd:0:sd0:vendor", "sd:0:sd0:writes"]);

        let mut out = Vec::new();
        report.render(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "10\tsd:0:sd0:reads\t      42\n10\tsd:0:sd0:vendor\tACME\n10\tsd:0:sd0:writes\t       7\n"
        );
    }

    #[test]
    fn test_graphite_numeric_only() {
        let patterns = vec!["sd:0:sd0".parse().unwrap()];
        let mut report = PrintReport::new(OutputFormat::Graphite, TimeStyle::Clock, patterns);
        run_report(&mut archive(), day_window(), &mut report).unwrap();

        let mut out = Vec::new();
        report.render(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "sd:0:sd0:reads 42 10\nsd:0:sd0:writes 7 10\n"
        );
    }
}
