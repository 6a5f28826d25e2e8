//! Shared formatting helpers for report output.
//!
//! All pure formatting functions (no report state) live here. Reports
//! either print sar-style tables or Graphite plaintext lines, selected via
//! [`OutputFormat`].

use std::io::{self, Write};

use chrono::{Local, TimeZone};

/// Output flavour of a report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Column tables in the style of the classic tools.
    #[default]
    Table,
    /// `<path> <value> <epoch-seconds>` lines for a Graphite collector.
    Graphite,
}

const KSCALE: f64 = 1024.0;
const KMAX: f64 = 8000.0;
const SCALE_NAMES: [&str; 6] = ["", "K", "M", "G", "T", "P"];

/// Scales a count into a short `K`/`M`/`G` string (`"8000"`, `"10K"`).
///
/// Values are divided by 1024 while they exceed 8000, up to `P`.
pub fn memscale(value: f64) -> String {
    let mut v = value;
    let mut i = 0;
    while v > KMAX && i < SCALE_NAMES.len() - 1 {
        v /= KSCALE;
        i += 1;
    }
    format!("{:.0}{}", v, SCALE_NAMES[i])
}

/// Formats a wall-clock millisecond timestamp as local `HH:MM:SS`.
pub fn clock(millis: i64) -> String {
    Local
        .timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}

/// Graphite timestamp for a rate: the middle of the sampled interval.
///
/// `elapsed_nanos` is the capture-time interval the rate was computed over.
pub fn midpoint_secs(timestamp_millis: i64, elapsed_nanos: i64) -> i64 {
    (timestamp_millis - elapsed_nanos / 2_000_000).div_euclid(1000)
}

/// Writes one Graphite line with a two-decimal value.
pub fn graphite_f64(out: &mut dyn Write, path: &str, value: f64, secs: i64) -> io::Result<()> {
    writeln!(out, "{} {:.2} {}", path, value, secs)
}

/// Writes one Graphite line with an integer value.
pub fn graphite_i64(out: &mut dyn Write, path: &str, value: i64, secs: i64) -> io::Result<()> {
    writeln!(out, "{} {} {}", path, value, secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memscale() {
        assert_eq!(memscale(0.0), "0");
        assert_eq!(memscale(100.0), "100");
        assert_eq!(memscale(8000.0), "8000");
        assert_eq!(memscale(10_000.0), "10K");
        assert_eq!(memscale(20.0 * 1024.0 * 1024.0), "20M");
        assert_eq!(memscale(-42.0), "-42");
    }

    #[test]
    fn test_midpoint() {
        // 10s interval ending at t=100s: midpoint 95s.
        assert_eq!(midpoint_secs(100_000, 10_000_000_000), 95);
        assert_eq!(midpoint_secs(100_999, 0), 100);
    }

    #[test]
    fn test_graphite_lines() {
        let mut out = Vec::new();
        graphite_f64(&mut out, "iostat.sd0.reads", 1.0 / 3.0, 60).unwrap();
        graphite_i64(&mut out, "mpstat.0.usr", 12, 60).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "iostat.sd0.reads 0.33 60\nmpstat.0.usr 12 60\n"
        );
    }

    #[test]
    fn test_clock_format() {
        let s = clock(1_700_000_000_000);
        assert_eq!(s.len(), 8);
        assert_eq!(&s[2..3], ":");
    }
}
