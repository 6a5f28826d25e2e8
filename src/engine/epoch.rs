//! Host restart detection from the boot-time marker.

use tracing::warn;

/// Result of observing one cycle's boot marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EpochChange {
    /// The marker advanced: the host restarted since the last cycle.
    RestartDetected,
    NoChange,
}

/// Tracks the boot marker across cycles.
///
/// The held marker only ever moves forward. A smaller marker than the one
/// held (stale or out-of-order data) is ignored for detection and counted as
/// a regression.
#[derive(Debug)]
pub struct EpochTracker {
    last_boot: i64,
    regressions: u64,
}

impl Default for EpochTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl EpochTracker {
    pub fn new() -> Self {
        Self {
            last_boot: i64::MIN,
            regressions: 0,
        }
    }

    /// Compares `boot_marker` with the held marker.
    ///
    /// The first real observation reports `NoChange`: the sentinel is not a
    /// boot, so there is no prior state to invalidate yet.
    pub fn observe(&mut self, boot_marker: i64) -> EpochChange {
        if self.last_boot == i64::MIN {
            self.last_boot = boot_marker;
            return EpochChange::NoChange;
        }

        if boot_marker > self.last_boot {
            self.last_boot = boot_marker;
            EpochChange::RestartDetected
        } else {
            if boot_marker < self.last_boot {
                self.regressions += 1;
                warn!(
                    "boot marker went backwards ({} < {}), ignoring",
                    boot_marker, self.last_boot
                );
            }
            EpochChange::NoChange
        }
    }

    /// Last boot marker seen, if any.
    pub fn last_boot(&self) -> Option<i64> {
        (self.last_boot != i64::MIN).then_some(self.last_boot)
    }

    /// Number of observations whose marker was smaller than the held one.
    pub fn regressions(&self) -> u64 {
        self.regressions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restart_ratchet() {
        let mut tracker = EpochTracker::new();
        let seen: Vec<EpochChange> = [100, 100, 150, 150, 90, 90, 200]
            .into_iter()
            .map(|m| tracker.observe(m))
            .collect();

        let restarts: Vec<usize> = seen
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == EpochChange::RestartDetected)
            .map(|(i, _)| i + 1)
            .collect();
        assert_eq!(restarts, vec![3, 7]);
        assert_eq!(tracker.regressions(), 2);
        assert_eq!(tracker.last_boot(), Some(200));
    }

    #[test]
    fn test_first_observation_is_not_restart() {
        let mut tracker = EpochTracker::new();
        assert_eq!(tracker.last_boot(), None);
        assert_eq!(tracker.observe(1_700_000_000), EpochChange::NoChange);
        assert_eq!(tracker.observe(0), EpochChange::NoChange);
        assert_eq!(tracker.last_boot(), Some(1_700_000_000));
    }
}
