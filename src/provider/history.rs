//! Archived cycle sequence loaded into memory.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::KarError;
use crate::model::{Cycle, Snapshot};

use super::SnapshotSequence;

/// One archive line: a cycle timestamp and all snapshots taken at it.
#[derive(Deserialize)]
struct ArchiveLine {
    timestamp: i64,
    #[serde(default)]
    kstats: Vec<Snapshot>,
}

/// Sequence over cycles held in memory.
///
/// Loads every cycle from a newline-delimited JSON archive (optionally
/// zstd-compressed) and walks them forward in timestamp order.
#[derive(Debug)]
pub struct HistorySequence {
    cycles: Vec<Cycle>,
    cursor: usize,
}

impl HistorySequence {
    /// Loads an archive from `path`.
    ///
    /// Files ending in `.zst` are decompressed on the fly.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, KarError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| KarError::Io(format!("{}: {}", path.display(), e)))?;

        let reader: Box<dyn Read> = if path.extension().is_some_and(|ext| ext == "zst") {
            Box::new(zstd::Decoder::new(file)?)
        } else {
            Box::new(file)
        };

        let cycles = Self::read_cycles(BufReader::new(reader))?;
        debug!("loaded {} cycles from {}", cycles.len(), path.display());
        Self::from_cycles(cycles)
    }

    /// Parses newline-delimited archive lines. Blank lines are skipped.
    pub fn read_cycles(reader: impl BufRead) -> Result<Vec<Cycle>, KarError> {
        let mut cycles = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let parsed: ArchiveLine = serde_json::from_str(&line)
                .map_err(|e| KarError::Parse(format!("line {}: {}", idx + 1, e)))?;
            cycles.push(Cycle::new(parsed.timestamp, parsed.kstats));
        }
        Ok(cycles)
    }

    /// Creates a sequence from pre-built cycles.
    ///
    /// Cycles are ordered by timestamp (stable for equal timestamps) and
    /// snapshots within each cycle by key. An archive without cycles has
    /// nothing to report and fails with `EmptyWindow`.
    pub fn from_cycles(mut cycles: Vec<Cycle>) -> Result<Self, KarError> {
        if cycles.is_empty() {
            return Err(KarError::EmptyWindow);
        }
        cycles.sort_by_key(|c| c.timestamp);
        for cycle in &mut cycles {
            cycle.sort();
        }
        Ok(Self { cycles, cursor: 0 })
    }

    /// Returns the total number of cycles.
    pub fn len(&self) -> usize {
        self.cycles.len()
    }

    /// Returns true if there are no cycles (never, once constructed).
    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
    }

    /// Returns the current cursor position (0-indexed).
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Moves the cursor back to the first cycle.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// All cycles, in order.
    pub fn cycles(&self) -> &[Cycle] {
        &self.cycles
    }
}

impl SnapshotSequence for HistorySequence {
    fn current(&self) -> &Cycle {
        &self.cycles[self.cursor]
    }

    fn advance(&mut self) -> bool {
        if self.cursor + 1 < self.cycles.len() {
            self.cursor += 1;
            true
        } else {
            false
        }
    }
}
