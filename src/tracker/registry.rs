//! Per-user tracker registry used by the web handlers

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use super::clock::{Clock, SystemClock};
use super::storage::{NamespacedStorage, TrackerStorage};
use super::visibility::{TrackerSettings, VisibilityTracker};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TrackerKey {
    user_id: Uuid,
    test_type: String,
    test_id: String,
}

pub type SharedStorage = Arc<dyn TrackerStorage>;
pub type RegistryTracker = VisibilityTracker<NamespacedStorage<SharedStorage>, Arc<dyn Clock>>;

/// Lazily creates and hands out one tracker per (user, test type, test id).
///
/// Every tracker persists into the same backing store, namespaced by user.
#[derive(Clone)]
pub struct TrackerRegistry {
    storage: SharedStorage,
    clock: Arc<dyn Clock>,
    settings: TrackerSettings,
    trackers: Arc<Mutex<HashMap<TrackerKey, Arc<RegistryTracker>>>>,
}

impl TrackerRegistry {
    pub fn new(storage: SharedStorage, settings: TrackerSettings) -> Self {
        Self::with_clock(storage, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(
        storage: SharedStorage,
        settings: TrackerSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            storage,
            clock,
            settings,
            trackers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Get the tracker for a test attempt, creating it if needed.
    pub fn tracker(&self, user_id: Uuid, test_type: &str, test_id: &str) -> Arc<RegistryTracker> {
        let key = TrackerKey {
            user_id,
            test_type: test_type.to_string(),
            test_id: test_id.to_string(),
        };

        self.trackers
            .lock()
            .entry(key)
            .or_insert_with(|| {
                let storage =
                    NamespacedStorage::new(self.storage.clone(), format!("user:{}", user_id));
                Arc::new(
                    VisibilityTracker::with_clock(test_type, test_id, storage, self.clock.clone())
                        .with_settings(self.settings),
                )
            })
            .clone()
    }

    /// Get the tracker for a test attempt only if one was created.
    pub fn existing(
        &self,
        user_id: Uuid,
        test_type: &str,
        test_id: &str,
    ) -> Option<Arc<RegistryTracker>> {
        let key = TrackerKey {
            user_id,
            test_type: test_type.to_string(),
            test_id: test_id.to_string(),
        };
        self.trackers.lock().get(&key).cloned()
    }

    /// Drop the tracker for one attempt, stopping it first.
    pub fn remove(
        &self,
        user_id: Uuid,
        test_type: &str,
        test_id: &str,
    ) -> Option<Arc<RegistryTracker>> {
        let key = TrackerKey {
            user_id,
            test_type: test_type.to_string(),
            test_id: test_id.to_string(),
        };
        let removed = self.trackers.lock().remove(&key);
        if let Some(tracker) = &removed {
            tracker.stop_tracking();
        }
        removed
    }

    /// Drop every user's tracker for a test. Returns how many were removed.
    pub fn remove_test(&self, test_type: &str, test_id: &str) -> usize {
        let removed: Vec<_> = {
            let mut trackers = self.trackers.lock();
            let keys: Vec<_> = trackers
                .keys()
                .filter(|k| k.test_type == test_type && k.test_id == test_id)
                .cloned()
                .collect();
            keys.iter().filter_map(|k| trackers.remove(k)).collect()
        };
        for tracker in &removed {
            tracker.stop_tracking();
        }
        removed.len()
    }

    pub fn len(&self) -> usize {
        self.trackers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.trackers.lock().is_empty()
    }
}

impl std::fmt::Debug for TrackerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerRegistry")
            .field("settings", &self.settings)
            .field("trackers", &self.len())
            .finish()
    }
}
