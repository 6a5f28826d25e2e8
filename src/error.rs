//! Error type shared by the replay engine and the reports.

use std::fmt;

/// Errors that can occur while resolving a window or replaying an archive.
///
/// Setup errors (`InvalidTimeSpec`, `MissingWellKnownMetricSet`, `Io`,
/// `Parse`) abort a run. `DivisionByZero` is per key and per cycle: reports
/// skip the affected row and carry on. `EmptyWindow` means there is nothing
/// to report, which the binary surfaces as a message rather than a crash.
#[derive(Debug, Clone, PartialEq)]
pub enum KarError {
    /// Malformed `-s`/`-e` time-of-day argument.
    InvalidTimeSpec { input: String, message: String },
    /// The requested window contains no cycles.
    EmptyWindow,
    /// Two samples of the same key share a capture time.
    DivisionByZero,
    /// A required metric set (e.g. `unix:0:system_misc`) is absent.
    MissingWellKnownMetricSet(String),
    /// I/O error while reading an archive.
    Io(String),
    /// Error parsing archive contents or a key.
    Parse(String),
}

impl fmt::Display for KarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KarError::InvalidTimeSpec { input, message } => {
                write!(f, "invalid time '{}': {}", input, message)
            }
            KarError::EmptyWindow => write!(f, "no data in the requested time window"),
            KarError::DivisionByZero => write!(f, "zero elapsed capture time between samples"),
            KarError::MissingWellKnownMetricSet(key) => {
                write!(f, "required metric set {} missing from archive", key)
            }
            KarError::Io(msg) => write!(f, "I/O error: {}", msg),
            KarError::Parse(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for KarError {}

impl From<std::io::Error> for KarError {
    fn from(e: std::io::Error) -> Self {
        KarError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for KarError {
    fn from(e: serde_json::Error) -> Self {
        KarError::Parse(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let e = KarError::InvalidTimeSpec {
            input: "1:2:3:4".to_string(),
            message: "too many fields".to_string(),
        };
        assert_eq!(e.to_string(), "invalid time '1:2:3:4': too many fields");

        let e = KarError::MissingWellKnownMetricSet("unix:0:system_misc".to_string());
        assert!(e.to_string().contains("unix:0:system_misc"));
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let e: KarError = io.into();
        assert!(matches!(e, KarError::Io(ref m) if m.contains("gone")));
    }
}
