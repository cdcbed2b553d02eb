//! Key-value persistence behind the visibility tracker

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::data::AppStateStore;

/// Durable string key-value store used to persist tracking records.
///
/// Failures are reported to the caller, which logs them and carries on.
pub trait TrackerStorage: Send + Sync {
    fn load(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn save(&self, key: &str, value: &str) -> anyhow::Result<()>;
    fn remove(&self, key: &str) -> anyhow::Result<()>;
}

impl<T: TrackerStorage + ?Sized> TrackerStorage for Arc<T> {
    fn load(&self, key: &str) -> anyhow::Result<Option<String>> {
        (**self).load(key)
    }

    fn save(&self, key: &str, value: &str) -> anyhow::Result<()> {
        (**self).save(key, value)
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        (**self).remove(key)
    }
}

/// In-memory storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw stored value, for inspection.
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    /// Store a raw value directly, bypassing the tracker.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.lock().insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl TrackerStorage for MemoryStorage {
    fn load(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

impl TrackerStorage for AppStateStore {
    fn load(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.get(key)?)
    }

    fn save(&self, key: &str, value: &str) -> anyhow::Result<()> {
        Ok(self.set(key, value)?)
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        Ok(self.delete(key)?)
    }
}

/// Prefixes every key with a namespace, so several users can share one
/// backing store.
#[derive(Debug, Clone)]
pub struct NamespacedStorage<S> {
    inner: S,
    prefix: String,
}

impl<S: TrackerStorage> NamespacedStorage<S> {
    pub fn new(inner: S, namespace: impl AsRef<str>) -> Self {
        Self {
            inner,
            prefix: format!("{}:", namespace.as_ref()),
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

impl<S: TrackerStorage> TrackerStorage for NamespacedStorage<S> {
    fn load(&self, key: &str) -> anyhow::Result<Option<String>> {
        self.inner.load(&self.key(key))
    }

    fn save(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.inner.save(&self.key(key), value)
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.inner.remove(&self.key(key))
    }
}
