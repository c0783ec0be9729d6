//! Persistent cooldown store gating repeated analyses.
//!
//! Maps resource identity to its last-analysis time and refuses re-analysis
//! inside the cooldown window. The check is check-and-mark: a gate pass
//! records "now" immediately, so a failed downstream analysis still consumes
//! the slot rather than hammering a persistently failing backend.
//!
//! The backing file is a flat JSON map rewritten in full on every update;
//! an absent file reads as an empty map.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::types::ResourceRef;

/// Source of "now" in unix seconds, injectable for deterministic tests.
pub trait Clock: Send + Sync {
    fn now_unix(&self) -> u64;
}

/// Wall-clock implementation used in production.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> u64 {
        chrono::Utc::now().timestamp().max(0) as u64
    }
}

/// File-persisted cooldown store shared by the watchers and (optionally)
/// the cluster scanner.
pub struct CooldownStore {
    path: PathBuf,
    window_secs: u64,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, u64>>,
}

impl CooldownStore {
    /// Open the store, loading any previously persisted entries.
    pub fn open(path: impl AsRef<Path>, window_secs: u64, clock: Arc<dyn Clock>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = load_entries(&path);
        debug!(
            entries = entries.len(),
            path = %path.display(),
            "Loaded cooldown cache"
        );
        Self {
            path,
            window_secs,
            clock,
            entries: Mutex::new(entries),
        }
    }

    /// Check-and-mark: returns `true` (skip) when the resource was analyzed
    /// within the cooldown window. Otherwise records "now" as the
    /// last-analysis time and returns `false`.
    pub async fn check_and_mark(&self, resource: &ResourceRef) -> bool {
        let key = resource.cache_key();
        let now = self.clock.now_unix();

        let mut entries = self.entries.lock().await;
        if let Some(last) = entries.get(&key) {
            if now.saturating_sub(*last) < self.window_secs {
                debug!(%resource, "Skipping duplicate RCA (cooldown active)");
                return true;
            }
        }

        entries.insert(key, now);
        self.persist(&entries);
        false
    }

    /// Rewrite the backing file wholesale. Failure is logged, never fatal.
    fn persist(&self, entries: &HashMap<String, u64>) {
        match serde_json::to_string(entries) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.path, json) {
                    warn!(path = %self.path.display(), error = %e, "Failed to save cooldown cache");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize cooldown cache"),
        }
    }
}

fn load_entries(path: &Path) -> HashMap<String, u64> {
    match std::fs::read_to_string(path) {
        Ok(json) => serde_json::from_str(&json).unwrap_or_default(),
        Err(_) => HashMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct ManualClock(AtomicU64);

    impl ManualClock {
        fn at(secs: u64) -> Arc<Self> {
            Arc::new(Self(AtomicU64::new(secs)))
        }

        fn advance(&self, secs: u64) {
            self.0.fetch_add(secs, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now_unix(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn pod(name: &str) -> ResourceRef {
        ResourceRef::new("Pod", name, Some("default".to_string()))
    }

    #[tokio::test]
    async fn test_check_and_mark_within_window() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::at(1_000);
        let store = CooldownStore::open(dir.path().join("cache.json"), 300, clock.clone());

        // First call passes and marks; second call inside the window skips.
        assert!(!store.check_and_mark(&pod("web")).await);
        assert!(store.check_and_mark(&pod("web")).await);

        // After the window elapses the gate opens again.
        clock.advance(301);
        assert!(!store.check_and_mark(&pod("web")).await);
    }

    #[tokio::test]
    async fn test_distinct_resources_do_not_share_slots() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            CooldownStore::open(dir.path().join("cache.json"), 300, ManualClock::at(1_000));

        assert!(!store.check_and_mark(&pod("web")).await);
        assert!(!store.check_and_mark(&pod("db")).await);
        assert!(!store
            .check_and_mark(&ResourceRef::new("Node", "web", None))
            .await);
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let clock = ManualClock::at(1_000);

        {
            let store = CooldownStore::open(&path, 300, clock.clone());
            assert!(!store.check_and_mark(&pod("web")).await);
        }

        // A fresh store over the same file still honors the mark.
        let reopened = CooldownStore::open(&path, 300, clock);
        assert!(reopened.check_and_mark(&pod("web")).await);
    }

    #[tokio::test]
    async fn test_absent_file_is_empty_map() {
        let dir = tempfile::tempdir().unwrap();
        let store = CooldownStore::open(
            dir.path().join("does-not-exist.json"),
            300,
            ManualClock::at(0),
        );
        assert!(!store.check_and_mark(&pod("web")).await);
    }
}
