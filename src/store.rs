//! Directory snapshot store.
//!
//! Thin holder of the current directory version. Mutations (snapshot merge,
//! ping batch) are serialized behind a single write lock and swap in a fresh
//! immutable version; readers grab an `Arc` atomically and can never observe
//! a partially merged directory.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::directory::{Directory, RawSnapshot};
use crate::ping::{self, PingMeasurement};

#[derive(Debug, Default)]
pub struct DirectoryStore {
    current: RwLock<Arc<Directory>>,
}

impl DirectoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current directory version.
    pub fn snapshot(&self) -> Arc<Directory> {
        self.current.read().clone()
    }

    /// Merge an incoming snapshot and publish the result.
    pub fn merge_snapshot(&self, incoming: RawSnapshot) -> Arc<Directory> {
        let mut guard = self.current.write();
        let merged = Arc::new(Directory::merge(&guard, incoming));
        *guard = Arc::clone(&merged);
        merged
    }

    /// Apply a latency probe batch and publish the result.
    pub fn apply_pings(&self, measurements: &[PingMeasurement]) -> Arc<Directory> {
        let mut guard = self.current.write();
        let mut next = Directory::clone(&guard);
        ping::apply(&mut next, measurements);
        let next = Arc::new(next);
        *guard = Arc::clone(&next);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot() -> RawSnapshot {
        serde_json::from_value(json!({
            "wireguard": [{
                "gateway": "nl.wg.skyhop.net",
                "country_code": "NL",
                "city": "Amsterdam",
                "hosts": [{"hostname": "nl1.wg.skyhop.net", "host": "10.5.0.1"}]
            }]
        }))
        .expect("valid snapshot")
    }

    #[test]
    fn merge_replaces_the_published_version() {
        let store = DirectoryStore::new();
        assert!(store.snapshot().is_empty());

        store.merge_snapshot(snapshot());
        assert_eq!(store.snapshot().wireguard.len(), 1);
    }

    #[test]
    fn readers_keep_their_version_across_mutations() {
        let store = DirectoryStore::new();
        store.merge_snapshot(snapshot());

        let before = store.snapshot();
        store.apply_pings(&[PingMeasurement {
            address: "10.5.0.1".to_string(),
            ms: 25,
        }]);

        // the old version is untouched, the new one carries the measurement
        assert_eq!(before.wireguard[0].ping, None);
        assert_eq!(store.snapshot().wireguard[0].ping, Some(25));
    }
}
