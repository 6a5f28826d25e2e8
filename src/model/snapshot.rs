//! Snapshot and cycle structures.
//!
//! A `Snapshot` is one reading of every statistic of one metric set. A
//! `Cycle` is one step of the archive: the wall-clock time of the step plus
//! the snapshots of all metric sets active at that instant.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::key::MetricKey;

/// A single statistic value.
///
/// Variants are tried in order, so any integer that fits an `i64` lands in
/// `Int`; only counters past `i64::MAX` become `UInt`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
}

impl Value {
    /// Integer reading of the value. `None` for strings, floats and
    /// unsigned counters that do not fit an `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::UInt(v) => i64::try_from(*v).ok(),
            Value::Float(_) | Value::Str(_) => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, Value::Str(_))
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

/// Type of the counter source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotKind {
    /// Named statistics (the common case).
    #[default]
    Named,
    /// Disk-style I/O counters (reads, writes, nread, rtime, ...).
    Io,
}

/// One immutable reading of one metric set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(flatten)]
    pub key: MetricKey,
    #[serde(default)]
    pub kind: SnapshotKind,
    /// Source class, e.g. `disk`, `partition`, `misc`.
    #[serde(default)]
    pub class: String,
    /// Capture time in nanoseconds (rate denominator).
    pub snaptime: i64,
    /// Creation time of the counter source in nanoseconds.
    #[serde(default)]
    pub crtime: i64,
    #[serde(default)]
    pub data: BTreeMap<String, Value>,
}

impl Snapshot {
    pub fn new(key: MetricKey, snaptime: i64, crtime: i64) -> Self {
        Self {
            key,
            kind: SnapshotKind::Named,
            class: String::new(),
            snaptime,
            crtime,
            data: BTreeMap::new(),
        }
    }

    pub fn with_kind(mut self, kind: SnapshotKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = class.into();
        self
    }

    pub fn with_value(mut self, field: impl Into<String>, value: i64) -> Self {
        self.data.insert(field.into(), Value::Int(value));
        self
    }

    pub fn with_text(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(field.into(), Value::Str(value.into()));
        self
    }

    /// Numeric value of `field`, `0` if absent or not numeric.
    pub fn long(&self, field: &str) -> i64 {
        self.data.get(field).and_then(Value::as_i64).unwrap_or(0)
    }

    pub fn value(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    pub fn has(&self, field: &str) -> bool {
        self.data.contains_key(field)
    }
}

/// One step of the archived sequence.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Cycle {
    /// Wall-clock time of the step, milliseconds since the epoch.
    pub timestamp: i64,
    pub snapshots: Vec<Arc<Snapshot>>,
}

impl Cycle {
    /// Builds a cycle with its snapshots sorted by key.
    pub fn new(timestamp: i64, snapshots: Vec<Snapshot>) -> Self {
        let mut snapshots: Vec<Arc<Snapshot>> = snapshots.into_iter().map(Arc::new).collect();
        snapshots.sort_by(|a, b| a.key.cmp(&b.key));
        Self {
            timestamp,
            snapshots,
        }
    }

    /// Finds the snapshot for `key` (binary search; snapshots are sorted).
    pub fn lookup(&self, key: &MetricKey) -> Option<&Arc<Snapshot>> {
        self.snapshots
            .binary_search_by(|s| s.key.cmp(key))
            .ok()
            .map(|idx| &self.snapshots[idx])
    }

    pub(crate) fn sort(&mut self) {
        self.snapshots.sort_by(|a, b| a.key.cmp(&b.key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_defaults_to_zero() {
        let s = Snapshot::new(MetricKey::new("sd", 0, "sd0"), 10, 0)
            .with_value("reads", 42)
            .with_text("vendor", "ACME");
        assert_eq!(s.long("reads"), 42);
        assert_eq!(s.long("writes"), 0);
        assert_eq!(s.long("vendor"), 0);
        assert!(s.has("vendor"));
    }

    #[test]
    fn test_cycle_lookup_sorted() {
        let cycle = Cycle::new(
            1000,
            vec![
                Snapshot::new(MetricKey::new("sd", 1, "sd1"), 1, 0),
                Snapshot::new(MetricKey::new("cpu", 0, "sys"), 1, 0),
                Snapshot::new(MetricKey::system_misc(), 1, 0),
            ],
        );
        assert_eq!(cycle.snapshots[0].key, MetricKey::new("cpu", 0, "sys"));
        assert!(cycle.lookup(&MetricKey::system_misc()).is_some());
        assert!(cycle.lookup(&MetricKey::new("sd", 2, "sd2")).is_none());
    }

    #[test]
    fn test_snapshot_deserializes_flat_key() {
        let json = r#"{"module":"sd","instance":0,"name":"sd0","kind":"io","class":"disk",
            "snaptime":1000,"crtime":5,"data":{"reads":7,"vendor":"ACME"}}"#;
        let s: Snapshot = serde_json::from_str(json).unwrap();
        assert_eq!(s.key, MetricKey::new("sd", 0, "sd0"));
        assert_eq!(s.kind, SnapshotKind::Io);
        assert_eq!(s.long("reads"), 7);
        assert_eq!(s.value("vendor"), Some(&Value::Str("ACME".to_string())));
    }

    #[test]
    fn test_wide_and_fractional_values() {
        let json = r#"{"module":"zfs","instance":0,"name":"arcstats","snaptime":1,
            "data":{"hits":18446744073709551615,"ratio":0.75,"size":42}}"#;
        let s: Snapshot = serde_json::from_str(json).unwrap();
        assert_eq!(s.value("hits"), Some(&Value::UInt(u64::MAX)));
        assert_eq!(s.value("ratio"), Some(&Value::Float(0.75)));
        assert_eq!(s.value("size"), Some(&Value::Int(42)));
        assert!(s.value("hits").is_some_and(Value::is_numeric));
        // Values an i64 cannot hold read as zero, like strings do.
        assert_eq!(s.long("hits"), 0);
        assert_eq!(s.long("ratio"), 0);
        assert_eq!(s.long("size"), 42);
        assert_eq!(s.value("ratio").map(|v| v.to_string()), Some("0.75".to_string()));
    }
}
