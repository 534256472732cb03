//! Trusted-device registry.
//!
//! The registry is the authoritative set of device identifiers that may submit
//! the gated action. It is seeded from configuration at startup and only
//! changes through the administrative operations below; request handling only
//! ever calls [`TrustedDeviceRegistry::contains`].

pub mod seed;

use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fmt,
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

/// Opaque device identifier. Equality is exact string match.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Outcome of swapping the whole trusted set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReloadSummary {
    pub added: usize,
    pub removed: usize,
    pub total: usize,
}

/// Set of pre-authorized devices, safe to share across request tasks.
///
/// Reads and writes go through a single `RwLock`, so a concurrent reader sees
/// the set either before or after an administrative change, never halfway.
#[derive(Debug, Default)]
pub struct TrustedDeviceRegistry {
    devices: RwLock<HashSet<DeviceId>>,
}

impl TrustedDeviceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry pre-seeded with `ids`. Duplicates collapse.
    pub fn from_ids<I, T>(ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<DeviceId>,
    {
        Self {
            devices: RwLock::new(ids.into_iter().map(Into::into).collect()),
        }
    }

    /// Is `id` currently trusted?
    #[must_use]
    pub fn contains(&self, id: &DeviceId) -> bool {
        self.read().contains(id)
    }

    /// Trust `id`. Returns `false` when it was already trusted.
    pub fn add(&self, id: impl Into<DeviceId>) -> bool {
        self.write().insert(id.into())
    }

    /// Stop trusting `id`. Returns `false` when it was not trusted.
    pub fn remove(&self, id: &DeviceId) -> bool {
        self.write().remove(id)
    }

    /// Atomically replace the trusted set with `ids`.
    pub fn replace<I, T>(&self, ids: I) -> ReloadSummary
    where
        I: IntoIterator<Item = T>,
        T: Into<DeviceId>,
    {
        let next: HashSet<DeviceId> = ids.into_iter().map(Into::into).collect();
        let mut devices = self.write();

        let summary = ReloadSummary {
            added: next.difference(&devices).count(),
            removed: devices.difference(&next).count(),
            total: next.len(),
        };
        *devices = next;

        summary
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Sorted copy of the trusted identifiers.
    #[must_use]
    pub fn snapshot(&self) -> Vec<DeviceId> {
        let mut ids: Vec<DeviceId> = self.read().iter().cloned().collect();
        ids.sort();
        ids
    }

    // A panicking writer cannot leave a HashSet half-updated, so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, HashSet<DeviceId>> {
        self.devices.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashSet<DeviceId>> {
        self.devices.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread};

    #[test]
    fn contains_is_exact_match() {
        let registry = TrustedDeviceRegistry::from_ids(["my-laptop-123"]);
        assert!(registry.contains(&DeviceId::from("my-laptop-123")));
        assert!(!registry.contains(&DeviceId::from("my-laptop-12")));
        assert!(!registry.contains(&DeviceId::from("MY-LAPTOP-123")));
        assert!(!registry.contains(&DeviceId::from(" my-laptop-123")));
    }

    #[test]
    fn add_is_idempotent() {
        let registry = TrustedDeviceRegistry::new();
        assert!(registry.add("dev-A"));
        assert!(!registry.add("dev-A"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_absent_is_noop() {
        let registry = TrustedDeviceRegistry::from_ids(["dev-A"]);
        assert!(!registry.remove(&DeviceId::from("dev-B")));
        assert!(registry.remove(&DeviceId::from("dev-A")));
        assert!(!registry.remove(&DeviceId::from("dev-A")));
        assert!(registry.is_empty());
    }

    #[test]
    fn from_ids_collapses_duplicates() {
        let registry = TrustedDeviceRegistry::from_ids(["dev-B", "dev-A", "dev-B"]);
        assert_eq!(
            registry.snapshot(),
            vec![DeviceId::from("dev-A"), DeviceId::from("dev-B")]
        );
    }

    #[test]
    fn replace_reports_changes() {
        let registry = TrustedDeviceRegistry::from_ids(["dev-A", "dev-B"]);
        let summary = registry.replace(["dev-B", "dev-C", "dev-D"]);
        assert_eq!(
            summary,
            ReloadSummary {
                added: 2,
                removed: 1,
                total: 3
            }
        );
        assert!(!registry.contains(&DeviceId::from("dev-A")));
        assert!(registry.contains(&DeviceId::from("dev-D")));
    }

    #[test]
    fn concurrent_reads_see_whole_sets() {
        let old = ["a-1", "a-2"];
        let new = ["b-1", "b-2"];
        let registry = Arc::new(TrustedDeviceRegistry::from_ids(old));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let snapshot = registry.snapshot();
                        let ids: Vec<&str> = snapshot.iter().map(DeviceId::as_str).collect();
                        assert!(ids == old || ids == new, "partial set observed: {ids:?}");
                    }
                })
            })
            .collect();

        for i in 0..200 {
            if i % 2 == 0 {
                registry.replace(new);
            } else {
                registry.replace(old);
            }
        }

        for reader in readers {
            assert!(reader.join().is_ok());
        }
    }
}
