//! Per-location writer locks.
//!
//! Readers never lock: they rely on the atomic pointer swap in
//! [`super::disk::save`]. Writers targeting the same location (build and
//! save, promote, delete) take the location's lock for the whole
//! read-modify-write sequence. The lock is in-process only.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

#[derive(Default)]
pub struct LocationLocks {
    inner: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl LocationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive write access to `location`.
    pub async fn lock(&self, location: &Path) -> OwnedMutexGuard<()> {
        let slot = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            retain_held(&mut map);
            map.entry(location.to_path_buf())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        slot.lock_owned().await
    }

    /// Drop entries nobody holds or waits on.
    pub fn prune(&self) {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        retain_held(&mut map);
    }

    /// Number of tracked locations.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A slot referenced only by the map has no holder and no waiter.
fn retain_held(map: &mut HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>) {
    map.retain(|_, slot| Arc::strong_count(slot) > 1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_location_is_exclusive() {
        let locks = Arc::new(LocationLocks::new());
        let guard = locks.lock(Path::new("idx/a")).await;

        let locks2 = locks.clone();
        let waiter = tokio::spawn(async move {
            let _g = locks2.lock(Path::new("idx/a")).await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_released_locations_are_dropped() {
        let locks = LocationLocks::new();
        for name in ["idx/a", "idx/b", "idx/c"] {
            let _g = locks.lock(Path::new(name)).await;
        }
        assert!(locks.len() <= 1);

        let held = locks.lock(Path::new("idx/d")).await;
        locks.prune();
        assert_eq!(locks.len(), 1);
        drop(held);
        locks.prune();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_distinct_locations_do_not_block() {
        let locks = LocationLocks::new();
        let _a = locks.lock(Path::new("idx/a")).await;
        let b = tokio::time::timeout(Duration::from_millis(200), locks.lock(Path::new("idx/b"))).await;
        assert!(b.is_ok());
    }
}
