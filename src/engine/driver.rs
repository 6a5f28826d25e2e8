//! One pass over a snapshot sequence within a reporting window.
//!
//! The driver owns the per-run state (restart tracking and the previous
//! cycle's snapshots) and hands each accepted snapshot, together with its
//! prior, to a report supplied by the caller. Every report uses the same
//! loop; only the handler differs.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::KarError;
use crate::model::{Cycle, MetricKey, Snapshot};
use crate::provider::SnapshotSequence;
use crate::util::Window;

use super::epoch::{EpochChange, EpochTracker};
use super::store::SnapshotStore;

/// Field of `unix:0:system_misc` holding the boot time in seconds.
pub const BOOT_TIME_FIELD: &str = "boot_time";

/// Driver progress through the sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverState {
    BeforeWindow,
    InWindow,
    Done,
}

/// What a handler can see of the cycle being processed.
pub struct CycleView<'a> {
    /// Wall-clock time of the cycle in milliseconds.
    pub timestamp: i64,
    /// Boot marker of the cycle, seconds since the epoch.
    pub boot_time: i64,
    /// First cycle inside the window.
    pub first: bool,
    /// A restart was detected at this cycle (the prior store was cleared).
    pub restarted: bool,
    pub window: &'a Window,
    cycle: &'a Cycle,
    store: &'a SnapshotStore,
}

impl<'a> CycleView<'a> {
    /// Snapshot of `key` in the current cycle.
    pub fn current(&self, key: &MetricKey) -> Option<&'a Snapshot> {
        self.cycle.lookup(key).map(Arc::as_ref)
    }

    /// Snapshot of `key` from the previous cycle, if any.
    pub fn prior(&self, key: &MetricKey) -> Option<&'a Snapshot> {
        self.store.lookup(key).map(Arc::as_ref)
    }

    /// All snapshots of the current cycle, sorted by key.
    pub fn snapshots(&self) -> &'a [Arc<Snapshot>] {
        &self.cycle.snapshots
    }

    /// Boot time in milliseconds.
    pub fn boot_millis(&self) -> i64 {
        self.boot_time.saturating_mul(1000)
    }
}

/// A report plugged into the driver.
pub trait CycleHandler {
    /// Whether `on_snapshot` should be called for this snapshot.
    fn accepts(&self, _snapshot: &Snapshot) -> bool {
        true
    }

    /// Called once per cycle before any snapshot.
    fn begin_cycle(&mut self, _view: &CycleView<'_>) {}

    /// Called after a restart was detected, before any snapshot of the cycle.
    fn on_restart(&mut self, _view: &CycleView<'_>) {}

    /// Called for every accepted snapshot with its previous-cycle reading.
    fn on_snapshot(&mut self, view: &CycleView<'_>, current: &Snapshot, prior: Option<&Snapshot>);

    /// Called once per cycle after all snapshots.
    fn end_cycle(&mut self, _view: &CycleView<'_>) {}
}

/// Totals of one driver run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: usize,
    pub restarts: usize,
    pub first_timestamp: Option<i64>,
    pub last_timestamp: Option<i64>,
}

/// Walks a sequence through `BeforeWindow -> InWindow -> Done`.
pub struct CycleDriver {
    window: Window,
    state: DriverState,
    epoch: EpochTracker,
    store: SnapshotStore,
}

impl CycleDriver {
    pub fn new(window: Window) -> Self {
        Self {
            window,
            state: DriverState::BeforeWindow,
            epoch: EpochTracker::new(),
            store: SnapshotStore::new(),
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Boot-marker regressions seen during the last run.
    pub fn boot_regressions(&self) -> u64 {
        self.epoch.regressions()
    }

    /// Runs `handler` over every cycle of `sequence` inside the window.
    ///
    /// Fails with `EmptyWindow` if no cycle falls inside the window and with
    /// `MissingWellKnownMetricSet` if a cycle has no boot marker.
    pub fn run<S, H>(&mut self, sequence: &mut S, handler: &mut H) -> Result<RunSummary, KarError>
    where
        S: SnapshotSequence + ?Sized,
        H: CycleHandler + ?Sized,
    {
        self.state = DriverState::BeforeWindow;
        self.epoch = EpochTracker::new();
        self.store.clear();

        let result = self.run_inner(sequence, handler);
        self.state = DriverState::Done;
        result
    }

    fn run_inner<S, H>(&mut self, sequence: &mut S, handler: &mut H) -> Result<RunSummary, KarError>
    where
        S: SnapshotSequence + ?Sized,
        H: CycleHandler + ?Sized,
    {
        if self.window.is_empty() {
            return Err(KarError::EmptyWindow);
        }

        while sequence.wall_clock_millis() < self.window.start {
            if !sequence.advance() {
                return Err(KarError::EmptyWindow);
            }
        }
        if sequence.wall_clock_millis() >= self.window.end {
            return Err(KarError::EmptyWindow);
        }
        self.state = DriverState::InWindow;

        let mut summary = RunSummary::default();
        loop {
            let boot_time = boot_marker(sequence)?;
            let restarted = self.epoch.observe(boot_time) == EpochChange::RestartDetected;
            if restarted {
                info!(
                    "host restart detected at {} (boot_time {})",
                    sequence.wall_clock_millis(),
                    boot_time
                );
                self.store.clear();
                summary.restarts += 1;
            }

            let cycle = sequence.current();
            let view = CycleView {
                timestamp: cycle.timestamp,
                boot_time,
                first: summary.cycles == 0,
                restarted,
                window: &self.window,
                cycle,
                store: &self.store,
            };

            handler.begin_cycle(&view);
            if restarted {
                handler.on_restart(&view);
            }
            for snapshot in &cycle.snapshots {
                if handler.accepts(snapshot) {
                    let prior = self.store.lookup(&snapshot.key).map(Arc::as_ref);
                    handler.on_snapshot(&view, snapshot, prior);
                }
            }
            handler.end_cycle(&view);

            debug!(
                "cycle {} at {}: {} snapshots",
                summary.cycles,
                cycle.timestamp,
                cycle.snapshots.len()
            );
            summary.first_timestamp.get_or_insert(cycle.timestamp);
            summary.last_timestamp = Some(cycle.timestamp);
            summary.cycles += 1;

            self.store.commit(&cycle.snapshots);

            if !sequence.advance() || sequence.wall_clock_millis() >= self.window.end {
                break;
            }
        }

        Ok(summary)
    }
}

/// Reads the boot marker of the current cycle.
pub fn boot_marker<S>(sequence: &S) -> Result<i64, KarError>
where
    S: SnapshotSequence + ?Sized,
{
    let key = MetricKey::system_misc();
    sequence
        .lookup(&key)
        .and_then(|s| s.value(BOOT_TIME_FIELD))
        .and_then(|v| v.as_i64())
        .ok_or_else(|| KarError::MissingWellKnownMetricSet(format!("{}:{}", key, BOOT_TIME_FIELD)))
}
