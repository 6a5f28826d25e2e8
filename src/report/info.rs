//! Archive summary.

use std::collections::HashMap;
use std::io::{self, Write};

use crate::fmt;
use crate::model::{Cycle, MetricKey, Snapshot};

/// Counts over an entire archive, comparing each set's first and last
/// sighting.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArchiveInfo {
    pub cycles: usize,
    pub first_timestamp: Option<i64>,
    pub last_timestamp: Option<i64>,
    pub sets: usize,
    pub numeric: usize,
    pub strings: usize,
    /// Numeric statistics that are zero at their last sighting.
    pub zero: usize,
    /// Numeric statistics whose last value differs from the first.
    pub changed: usize,
    /// Sets with at least one changed statistic.
    pub sets_changed: usize,
}

impl ArchiveInfo {
    pub fn from_cycles(cycles: &[Cycle]) -> Self {
        let mut seen: HashMap<&MetricKey, (&Snapshot, &Snapshot)> = HashMap::new();
        for cycle in cycles {
            for s in cycle.snapshots.iter().map(|s| &**s) {
                seen.entry(&s.key)
                    .and_modify(|(_, last)| *last = s)
                    .or_insert((s, s));
            }
        }

        let mut info = ArchiveInfo {
            cycles: cycles.len(),
            first_timestamp: cycles.first().map(|c| c.timestamp),
            last_timestamp: cycles.last().map(|c| c.timestamp),
            sets: seen.len(),
            ..Default::default()
        };
        for (first, last) in seen.values() {
            let mut set_changed = false;
            for (stat, value) in &first.data {
                if !value.is_numeric() {
                    info.strings += 1;
                    continue;
                }
                info.numeric += 1;
                let (v1, v2) = (first.long(stat), last.long(stat));
                if v2 == 0 {
                    info.zero += 1;
                }
                if v1 != v2 {
                    info.changed += 1;
                    set_changed = true;
                }
            }
            if set_changed {
                info.sets_changed += 1;
            }
        }
        info
    }

    pub fn statistics(&self) -> usize {
        self.numeric + self.strings
    }

    pub fn render(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "Cycles: {}", self.cycles)?;
        if let (Some(first), Some(last)) = (self.first_timestamp, self.last_timestamp) {
            writeln!(out, "Time range: {} - {}", fmt::clock(first), fmt::clock(last))?;
        }
        writeln!(out, "Total sets: {}", self.sets)?;
        writeln!(out, "Total statistics: {}", self.statistics())?;
        writeln!(out, "Numeric statistics: {}", self.numeric)?;
        writeln!(out, "String statistics: {}", self.strings)?;
        writeln!(out, "Statistics zero: {}", self.zero)?;
        writeln!(out, "Statistics changed: {}", self.changed)?;
        writeln!(out, "Sets changed: {}", self.sets_changed)?;
        Ok(())
    }
}
