//! Anti-cheating tab visibility tracker.
//!
//! One tracker exists per test attempt, keyed by `(test_type, test_id)`. It
//! counts hide-then-show intervals that last at least
//! [`TrackerSettings::hidden_threshold`] and flags the attempt once the count
//! reaches [`TrackerSettings::cheating_threshold`]. The flag is sticky until
//! [`VisibilityTracker::clear_data`].
//!
//! A hidden interval that is still open when tracking stops is never counted.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::clock::{Clock, SystemClock};
use super::storage::TrackerStorage;

/// Thresholds governing what counts as suspicious.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerSettings {
    /// Minimum hidden duration that counts as a tab switch.
    pub hidden_threshold: Duration,
    /// Counted tab switches at which the attempt is flagged.
    pub cheating_threshold: u32,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            hidden_threshold: Duration::from_millis(10_000),
            cheating_threshold: 2,
        }
    }
}

/// Page visibility as reported by the host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Hidden,
    Visible,
}

/// Snapshot returned by [`VisibilityTracker::cheating_data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CheatingData {
    pub visibility_change_count: u32,
    pub is_cheating: bool,
    pub is_test_active: bool,
}

/// What a single visibility transition did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityOutcome {
    /// Tracker inactive, or a show without a preceding hide.
    Ignored,
    /// Hide recorded; the interval is now open.
    HiddenStarted,
    /// Interval closed but shorter than the threshold.
    ReturnedQuickly { elapsed: Duration },
    /// Interval closed and counted.
    Counted { elapsed: Duration, count: u32 },
}

/// Record persisted after every counted interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheatingRecord {
    pub visibility_change_times: u32,
    pub caught_cheating: bool,
    #[serde(default)]
    pub test_type: String,
    #[serde(default)]
    pub test_id: String,
    pub last_updated: DateTime<Utc>,
}

/// Storage key for a test attempt.
pub fn storage_key(test_type: &str, test_id: &str) -> String {
    format!("cheating_{}_{}", test_type, test_id)
}

#[derive(Debug, Default)]
struct TrackerState {
    visibility_change_count: u32,
    is_cheating: bool,
    is_test_active: bool,
    hidden_start_time: Option<DateTime<Utc>>,
}

pub struct VisibilityTracker<S, C = SystemClock> {
    test_type: String,
    test_id: String,
    storage_key: String,
    settings: TrackerSettings,
    storage: S,
    clock: C,
    state: Mutex<TrackerState>,
    /// Task pumping visibility events into the tracker, if any
    subscription: Mutex<Option<JoinHandle<()>>>,
}

impl<S: TrackerStorage> VisibilityTracker<S, SystemClock> {
    pub fn new(test_type: impl Into<String>, test_id: impl Into<String>, storage: S) -> Self {
        Self::with_clock(test_type, test_id, storage, SystemClock)
    }
}

impl<S: TrackerStorage, C: Clock> VisibilityTracker<S, C> {
    pub fn with_clock(
        test_type: impl Into<String>,
        test_id: impl Into<String>,
        storage: S,
        clock: C,
    ) -> Self {
        let test_type = test_type.into();
        let test_id = test_id.into();
        let storage_key = storage_key(&test_type, &test_id);
        Self {
            test_type,
            test_id,
            storage_key,
            settings: TrackerSettings::default(),
            storage,
            clock,
            state: Mutex::new(TrackerState::default()),
            subscription: Mutex::new(None),
        }
    }

    pub fn with_settings(mut self, settings: TrackerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn test_type(&self) -> &str {
        &self.test_type
    }

    pub fn test_id(&self) -> &str {
        &self.test_id
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Activate tracking, restoring any persisted record first.
    ///
    /// Calling this while already active does nothing.
    pub fn start_tracking(&self) {
        let mut state = self.state.lock();
        if state.is_test_active {
            return;
        }

        // A stored record can lag behind memory when a save failed.
        if let Some(record) = self.load_record() {
            state.visibility_change_count = state
                .visibility_change_count
                .max(record.visibility_change_times);
            state.is_cheating |= record.caught_cheating;
        }
        state.is_test_active = true;
        state.hidden_start_time = None;

        tracing::debug!(
            test_type = %self.test_type,
            test_id = %self.test_id,
            count = state.visibility_change_count,
            "Visibility tracking started"
        );
    }

    /// Deactivate tracking and drop the event subscription. Counters are kept.
    pub fn stop_tracking(&self) {
        self.unsubscribe();

        let mut state = self.state.lock();
        state.is_test_active = false;
        state.hidden_start_time = None;

        tracing::debug!(
            test_type = %self.test_type,
            test_id = %self.test_id,
            count = state.visibility_change_count,
            "Visibility tracking stopped"
        );
    }

    /// Apply one visibility transition.
    pub fn handle_visibility(&self, visibility: Visibility) -> VisibilityOutcome {
        let now = self.clock.now();

        let (outcome, record) = {
            let mut state = self.state.lock();
            if !state.is_test_active {
                return VisibilityOutcome::Ignored;
            }

            match visibility {
                Visibility::Hidden => {
                    state.hidden_start_time = Some(now);
                    (VisibilityOutcome::HiddenStarted, None)
                }
                Visibility::Visible => {
                    let Some(started) = state.hidden_start_time.take() else {
                        return VisibilityOutcome::Ignored;
                    };
                    let elapsed = (now - started).to_std().unwrap_or_default();

                    if elapsed >= self.settings.hidden_threshold {
                        state.visibility_change_count += 1;
                        if state.visibility_change_count >= self.settings.cheating_threshold {
                            state.is_cheating = true;
                        }
                        let record = CheatingRecord {
                            visibility_change_times: state.visibility_change_count,
                            caught_cheating: state.is_cheating,
                            test_type: self.test_type.clone(),
                            test_id: self.test_id.clone(),
                            last_updated: now,
                        };
                        (
                            VisibilityOutcome::Counted {
                                elapsed,
                                count: state.visibility_change_count,
                            },
                            Some(record),
                        )
                    } else {
                        (VisibilityOutcome::ReturnedQuickly { elapsed }, None)
                    }
                }
            }
        };

        if let Some(record) = record {
            if record.caught_cheating {
                tracing::info!(
                    test_type = %self.test_type,
                    test_id = %self.test_id,
                    count = record.visibility_change_times,
                    "Test attempt flagged for leaving the page"
                );
            }
            self.save_record(&record);
        }

        outcome
    }

    pub fn cheating_data(&self) -> CheatingData {
        let state = self.state.lock();
        CheatingData {
            visibility_change_count: state.visibility_change_count,
            is_cheating: state.is_cheating,
            is_test_active: state.is_test_active,
        }
    }

    /// Whether a hidden interval is currently open.
    pub fn is_hidden(&self) -> bool {
        self.state.lock().hidden_start_time.is_some()
    }

    /// Remove the persisted record and reset every counter and flag.
    pub fn clear_data(&self) {
        self.unsubscribe();

        if let Err(e) = self.storage.remove(&self.storage_key) {
            tracing::warn!(
                key = %self.storage_key,
                error = %e,
                "Failed to remove cheating record"
            );
        }

        *self.state.lock() = TrackerState::default();
    }

    fn load_record(&self) -> Option<CheatingRecord> {
        let raw = match self.storage.load(&self.storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(
                    key = %self.storage_key,
                    error = %e,
                    "Failed to load cheating record"
                );
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(
                    key = %self.storage_key,
                    error = %e,
                    "Ignoring malformed cheating record"
                );
                None
            }
        }
    }

    fn save_record(&self, record: &CheatingRecord) {
        let result = serde_json::to_string(record)
            .map_err(anyhow::Error::from)
            .and_then(|json| self.storage.save(&self.storage_key, &json));

        if let Err(e) = result {
            tracing::warn!(
                key = %self.storage_key,
                error = %e,
                "Failed to persist cheating record"
            );
        }
    }

    fn unsubscribe(&self) {
        if let Some(handle) = self.subscription.lock().take() {
            handle.abort();
        }
    }
}

impl<S, C> VisibilityTracker<S, C>
where
    S: TrackerStorage + 'static,
    C: Clock + 'static,
{
    /// Start tracking and feed transitions from `events` into the tracker
    /// until [`stop_tracking`](Self::stop_tracking) or
    /// [`clear_data`](Self::clear_data). Replaces any earlier subscription.
    pub fn listen(self: &Arc<Self>, mut events: mpsc::Receiver<Visibility>) {
        self.start_tracking();

        let tracker: Weak<Self> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            while let Some(visibility) = events.recv().await {
                let Some(tracker) = tracker.upgrade() else {
                    break;
                };
                tracker.handle_visibility(visibility);
            }
        });

        if let Some(previous) = self.subscription.lock().replace(handle) {
            previous.abort();
        }
    }
}

impl<S, C> Drop for VisibilityTracker<S, C> {
    fn drop(&mut self) {
        if let Some(handle) = self.subscription.get_mut().take() {
            handle.abort();
        }
    }
}

impl<S, C> std::fmt::Debug for VisibilityTracker<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisibilityTracker")
            .field("test_type", &self.test_type)
            .field("test_id", &self.test_id)
            .field("settings", &self.settings)
            .finish()
    }
}
