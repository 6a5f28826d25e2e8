//! Reporting window resolution for the `-s`/`-e` flags.
//!
//! Supported formats for each bound:
//! - Hour only: `7`
//! - Hour and minute: `7:30`
//! - Hour, minute and second: `07:30:15`
//!
//! The bound is placed on the local calendar day of the anchor timestamp
//! (the first cycle of the archive). Milliseconds within the second are
//! taken from the anchor for both bounds, as the original tools did.

use chrono::{Local, NaiveTime, TimeZone};

use crate::error::KarError;

/// A parsed time of day.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeSpec {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl TimeSpec {
    /// Midnight, the default start bound.
    pub const START_OF_DAY: TimeSpec = TimeSpec {
        hour: 0,
        minute: 0,
        second: 0,
    };

    /// One second before midnight, the default end bound.
    pub const END_OF_DAY: TimeSpec = TimeSpec {
        hour: 23,
        minute: 59,
        second: 59,
    };

    /// Parses `H`, `H:M` or `H:M:S`. Missing trailing fields are zero.
    pub fn parse(input: &str) -> Result<Self, KarError> {
        let input = input.trim();
        let err = |message: &str| KarError::InvalidTimeSpec {
            input: input.to_string(),
            message: message.to_string(),
        };

        let parts: Vec<&str> = input.split(':').collect();
        if parts.len() > 3 {
            return Err(err("expected H, H:M or H:M:S"));
        }

        let mut fields = [0u32; 3];
        for (slot, part) in fields.iter_mut().zip(&parts) {
            *slot = part
                .parse::<u32>()
                .map_err(|_| err(&format!("'{}' is not a number", part)))?;
        }

        let [hour, minute, second] = fields;
        if hour > 23 || minute > 59 || second > 59 {
            return Err(err("time of day out of range"));
        }

        Ok(Self {
            hour,
            minute,
            second,
        })
    }

    fn parse_or(input: Option<&str>, default: TimeSpec) -> Result<Self, KarError> {
        input.map_or(Ok(default), Self::parse)
    }
}

/// Absolute reporting bounds in milliseconds since the epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    pub start: i64,
    pub end: i64,
    /// Local midnight of the anchor day (same millisecond offset as the bounds).
    pub midnight: i64,
}

impl Window {
    /// A window that admits every timestamp.
    pub fn unbounded() -> Self {
        Self {
            start: i64::MIN,
            end: i64::MAX,
            midnight: i64::MIN,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }
}

/// Resolves optional `start`/`end` specs against the day of `anchor_millis`.
///
/// # Examples
///
/// ```
/// use kar::util::resolve_window;
///
/// let w = resolve_window(1_700_000_000_000, Some("9:30"), None).unwrap();
/// assert!(w.start < w.end);
/// ```
pub fn resolve_window(
    anchor_millis: i64,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<Window, KarError> {
    let start_spec = TimeSpec::parse_or(start, TimeSpec::START_OF_DAY)?;
    let end_spec = TimeSpec::parse_or(end, TimeSpec::END_OF_DAY)?;

    Ok(Window {
        start: on_anchor_day(anchor_millis, start_spec, start)?,
        end: on_anchor_day(anchor_millis, end_spec, end)?,
        midnight: on_anchor_day(anchor_millis, TimeSpec::START_OF_DAY, None)?,
    })
}

/// Places `spec` on the local calendar day of `anchor_millis`.
fn on_anchor_day(
    anchor_millis: i64,
    spec: TimeSpec,
    input: Option<&str>,
) -> Result<i64, KarError> {
    let err = |message: &str| KarError::InvalidTimeSpec {
        input: input.unwrap_or("").to_string(),
        message: message.to_string(),
    };

    let anchor = Local
        .timestamp_millis_opt(anchor_millis)
        .single()
        .ok_or_else(|| err("anchor timestamp out of range"))?;
    let millis = anchor.timestamp_subsec_millis();

    let time = NaiveTime::from_hms_milli_opt(spec.hour, spec.minute, spec.second, millis)
        .ok_or_else(|| err("time of day out of range"))?;
    let naive = anchor.date_naive().and_time(time);

    // A time inside a DST gap has no local representation; an ambiguous one
    // (DST fall-back) resolves to its first occurrence.
    let resolved = Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| err("time does not exist on the archive day"))?;

    Ok(resolved.timestamp_millis())
}
