//! Previous-cycle snapshots, keyed by metric set.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{MetricKey, Snapshot};

/// Holds the last cycle's snapshot for every key.
///
/// Only one prior cycle is ever retained: `commit` replaces the contents
/// outright, so keys that disappear from the archive (an unplugged disk, an
/// offlined CPU) stop having a prior.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    entries: HashMap<MetricKey, Arc<Snapshot>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, key: &MetricKey) -> Option<&Arc<Snapshot>> {
        self.entries.get(key)
    }

    /// Replaces the whole store with `snapshots` (not a merge).
    pub fn commit<'a, I>(&mut self, snapshots: I)
    where
        I: IntoIterator<Item = &'a Arc<Snapshot>>,
    {
        self.entries.clear();
        for s in snapshots {
            self.entries.insert(s.key.clone(), Arc::clone(s));
        }
    }

    /// Drops every entry (used after a host restart).
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(name: &str, snaptime: i64) -> Arc<Snapshot> {
        Arc::new(Snapshot::new(MetricKey::new("sd", 0, name), snaptime, 0))
    }

    #[test]
    fn test_commit_replaces_not_merges() {
        let mut store = SnapshotStore::new();
        store.commit(&[snap("a", 1), snap("b", 1)]);
        assert_eq!(store.len(), 2);

        store.commit(&[snap("a", 2), snap("c", 2)]);
        assert_eq!(store.len(), 2);
        assert!(store.lookup(&MetricKey::new("sd", 0, "b")).is_none());
        assert!(store.lookup(&MetricKey::new("sd", 0, "c")).is_some());
        assert_eq!(
            store.lookup(&MetricKey::new("sd", 0, "a")).unwrap().snaptime,
            2
        );
    }

    #[test]
    fn test_clear() {
        let mut store = SnapshotStore::new();
        store.commit(&[snap("a", 1)]);
        store.clear();
        assert!(store.is_empty());
        assert!(store.lookup(&MetricKey::new("sd", 0, "a")).is_none());
    }
}
