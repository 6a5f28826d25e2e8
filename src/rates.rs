//! Shared delta and rate computation for every report.
//!
//! This module is the single place where counter deltas are turned into
//! rates. All functions are pure: they take the current snapshot and the
//! prior one (if the key was seen in the previous cycle) and return values
//! for the caller to format.

use crate::error::KarError;
use crate::model::Snapshot;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Capture times are in nanoseconds.
pub const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Keeps the top bucket reachable only at full utilization (`19.99` for
/// 20 buckets).
pub const BUCKET_EPSILON: f64 = 0.01;

// ---------------------------------------------------------------------------
// Delta helpers
// ---------------------------------------------------------------------------

/// Counter delta against an optional prior reading.
///
/// Without a prior the whole current value is returned, i.e. everything
/// accumulated since the counter was created. A negative result (counter
/// wrap, stats reset without a detected restart) is returned unchanged.
pub fn counter_delta(current: i64, prior: Option<i64>) -> i64 {
    match prior {
        Some(prior) => current.wrapping_sub(prior),
        None => current,
    }
}

/// Delta of `field` between `current` and `prior`.
pub fn raw_delta(current: &Snapshot, prior: Option<&Snapshot>, field: &str) -> i64 {
    counter_delta(current.long(field), prior.map(|p| p.long(field)))
}

/// Sum of the deltas of several fields (e.g. `rw_rdfails + rw_wrfails`).
pub fn raw_delta_sum(current: &Snapshot, prior: Option<&Snapshot>, fields: &[&str]) -> i64 {
    fields
        .iter()
        .map(|f| raw_delta(current, prior, f))
        .fold(0i64, i64::wrapping_add)
}

/// Delta for values that are already running averages.
pub fn average_delta(current: f64, prior: Option<f64>) -> f64 {
    match prior {
        Some(prior) => current - prior,
        None => current,
    }
}

/// `true` when a delta went backwards; callers decide how to report it.
pub fn regressed(delta: i64) -> bool {
    delta < 0
}

/// Capture-time interval between the two readings.
///
/// Falls back to the counter creation time when there is no prior reading.
pub fn elapsed(current: &Snapshot, prior: Option<&Snapshot>) -> i64 {
    let since = prior.map_or(current.crtime, |p| p.snaptime);
    current.snaptime - since
}

// ---------------------------------------------------------------------------
// Rates
// ---------------------------------------------------------------------------

/// Converts a delta into events per second.
pub fn rate_per_second(
    raw_delta: i64,
    elapsed: i64,
    units_per_second: f64,
) -> Result<f64, KarError> {
    if elapsed == 0 {
        return Err(KarError::DivisionByZero);
    }
    Ok(raw_delta as f64 * units_per_second / elapsed as f64)
}

/// Same as [`rate_per_second`] for floating-point deltas.
pub fn rate_per_second_f64(
    raw_delta: f64,
    elapsed: i64,
    units_per_second: f64,
) -> Result<f64, KarError> {
    if elapsed == 0 {
        return Err(KarError::DivisionByZero);
    }
    Ok(raw_delta * units_per_second / elapsed as f64)
}

/// Share of the interval spent in a state, as a percentage.
///
/// Not clamped: clock skew can push the result past 100 and that must stay
/// visible.
pub fn percentage(raw_delta: i64, elapsed: i64, units_per_second: f64) -> Result<f64, KarError> {
    Ok(rate_per_second(raw_delta, elapsed, units_per_second)? * 100.0 / units_per_second)
}

/// Same as [`percentage`] for floating-point deltas.
pub fn percentage_f64(raw_delta: f64, elapsed: i64, units_per_second: f64) -> Result<f64, KarError> {
    Ok(rate_per_second_f64(raw_delta, elapsed, units_per_second)? * 100.0 / units_per_second)
}

/// `part` as a percentage of `total` (sar-style CPU shares).
pub fn share(part: i64, total: i64) -> Result<f64, KarError> {
    if total == 0 {
        return Err(KarError::DivisionByZero);
    }
    Ok(100.0 * part as f64 / total as f64)
}

/// Rounds half up to an integer, the way the report columns do.
pub fn round_half_up(v: f64) -> i64 {
    (v + 0.5).floor() as i64
}

// ---------------------------------------------------------------------------
// Heatmap bucketing
// ---------------------------------------------------------------------------

/// Maps a utilization fraction in `[0, 1]` to a heatmap row.
///
/// Row 0 is the highest utilization. Out-of-range input is clamped; NaN
/// (no activity at all) lands in the idle row.
pub fn offset_bucket(fraction: f64, bucket_count: usize) -> usize {
    if bucket_count == 0 {
        return 0;
    }
    let top = (bucket_count - 1) as i64;
    if fraction.is_nan() {
        return top as usize;
    }
    let scaled = (fraction * (bucket_count as f64 - BUCKET_EPSILON)).floor() as i64;
    (top - scaled).clamp(0, top) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MetricKey;

    fn disk(snaptime: i64, reads: i64) -> Snapshot {
        Snapshot::new(MetricKey::new("sd", 0, "sd0"), snaptime, 0).with_value("reads", reads)
    }

    #[test]
    fn test_first_sample_delta_is_absolute() {
        let cur = disk(1_000, 123);
        assert_eq!(raw_delta(&cur, None, "reads"), 123);
    }

    #[test]
    fn test_delta_against_prior() {
        let prev = disk(1_000, 100);
        let cur = disk(2_000, 250);
        assert_eq!(raw_delta(&cur, Some(&prev), "reads"), 150);
        assert_eq!(raw_delta(&cur, Some(&prev), "missing"), 0);
    }

    #[test]
    fn test_negative_delta_is_surfaced() {
        let prev = disk(1_000, 500);
        let cur = disk(2_000, 20);
        let d = raw_delta(&cur, Some(&prev), "reads");
        assert_eq!(d, -480);
        assert!(regressed(d));
    }

    #[test]
    fn test_delta_sum() {
        let prev = disk(0, 0).with_value("a", 1).with_value("b", 2);
        let cur = disk(1, 0).with_value("a", 5).with_value("b", 10);
        assert_eq!(raw_delta_sum(&cur, Some(&prev), &["a", "b"]), 12);
    }

    #[test]
    fn test_elapsed_uses_crtime_without_prior() {
        let cur = Snapshot::new(MetricKey::new("sd", 0, "sd0"), 5_000, 1_000);
        assert_eq!(elapsed(&cur, None), 4_000);

        let prev = Snapshot::new(MetricKey::new("sd", 0, "sd0"), 3_000, 1_000);
        assert_eq!(elapsed(&cur, Some(&prev)), 2_000);
    }

    #[test]
    fn test_rate_one_second() {
        let prev = disk(1_000_000_000, 0);
        let cur = disk(2_000_000_000, 500);
        let rate = rate_per_second(
            raw_delta(&cur, Some(&prev), "reads"),
            elapsed(&cur, Some(&prev)),
            NANOS_PER_SEC,
        )
        .unwrap();
        assert_eq!(rate, 500.0);
    }

    #[test]
    fn test_zero_elapsed_is_error() {
        assert_eq!(
            rate_per_second(10, 0, NANOS_PER_SEC),
            Err(KarError::DivisionByZero)
        );
        assert_eq!(percentage(10, 0, NANOS_PER_SEC), Err(KarError::DivisionByZero));
        assert_eq!(share(1, 0), Err(KarError::DivisionByZero));
    }

    #[test]
    fn test_percentage_not_clamped() {
        // Half of a one-second interval busy.
        assert_eq!(percentage(500_000_000, 1_000_000_000, NANOS_PER_SEC).unwrap(), 50.0);
        // Busy time larger than the interval (clock skew) stays visible.
        let p = percentage(1_500_000_000, 1_000_000_000, NANOS_PER_SEC).unwrap();
        assert_eq!(p, 150.0);
    }

    #[test]
    fn test_average_delta() {
        assert_eq!(average_delta(7.5, None), 7.5);
        assert_eq!(average_delta(7.5, Some(2.5)), 5.0);
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(2.5), 3);
        assert_eq!(round_half_up(2.49), 2);
        assert_eq!(round_half_up(0.0), 0);
    }

    #[test]
    fn test_offset_bucket_inversion() {
        assert_eq!(offset_bucket(0.0, 20), 19);
        assert_eq!(offset_bucket(1.0, 20), 0);
        assert_eq!(offset_bucket(0.5, 20), 10);
        assert_eq!(offset_bucket(0.95, 20), 1);
    }

    #[test]
    fn test_offset_bucket_monotonic_and_clamped() {
        let mut last = usize::MAX;
        for i in 0..=100 {
            let b = offset_bucket(i as f64 / 100.0, 20);
            assert!(b <= last);
            last = b;
        }
        assert_eq!(offset_bucket(-0.5, 20), 19);
        assert_eq!(offset_bucket(3.0, 20), 0);
        assert_eq!(offset_bucket(f64::NAN, 20), 19);
        assert_eq!(offset_bucket(0.7, 0), 0);
        assert_eq!(offset_bucket(0.7, 1), 0);
    }
}
