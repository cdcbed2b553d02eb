//! Request deduplication.
//!
//! [`RequestDeduplicator`] guarantees at most one outstanding call per logical
//! request and serves recent successful results from a small cache:
//!
//! 1. A call whose key is already in flight joins the pending call.
//! 2. Otherwise a completed result younger than the TTL is returned as-is.
//! 3. Otherwise the thunk runs. Success is cached (oldest entry evicted at
//!    capacity); failure is shared with every waiter and never cached.
//!
//! Thunks are spawned onto the tokio runtime and always run to completion,
//! even if every caller stops waiting.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::Instant;

mod key;

pub use key::{canonical_params, request_key};

/// Cache bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupSettings {
    /// Maximum number of completed results kept.
    pub capacity: usize,
    /// How long a completed result may be served.
    pub ttl: Duration,
}

impl Default for DedupSettings {
    fn default() -> Self {
        Self {
            capacity: 100,
            ttl: Duration::from_secs(30),
        }
    }
}

/// A failure shared by every caller waiting on the same request.
#[derive(Debug, Clone)]
pub struct SharedError(Arc<anyhow::Error>);

impl SharedError {
    pub fn new(err: anyhow::Error) -> Self {
        Self(Arc::new(err))
    }

    pub fn inner(&self) -> &anyhow::Error {
        &self.0
    }

    /// Downcast the original error.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        self.0.downcast_ref::<E>()
    }
}

impl std::fmt::Display for SharedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.0)
    }
}

impl std::error::Error for SharedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

/// Counts for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupStats {
    pub in_flight: usize,
    pub cached: usize,
}

type PendingCall<T> = Shared<BoxFuture<'static, Result<T, SharedError>>>;

struct CachedResult<T> {
    value: T,
    completed_at: Instant,
}

struct DedupState<T> {
    in_flight: HashMap<String, PendingCall<T>>,
    completed: HashMap<String, CachedResult<T>>,
    /// Completed keys, oldest first
    order: VecDeque<String>,
}

impl<T: Clone> DedupState<T> {
    fn new() -> Self {
        Self {
            in_flight: HashMap::new(),
            completed: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn fresh(&self, key: &str, ttl: Duration) -> Option<&T> {
        self.completed
            .get(key)
            .filter(|entry| entry.completed_at.elapsed() < ttl)
            .map(|entry| &entry.value)
    }

    fn remove_completed(&mut self, key: &str) {
        if self.completed.remove(key).is_some() {
            self.order.retain(|k| k != key);
        }
    }

    fn store(&mut self, key: String, value: T, capacity: usize) {
        if self.completed.contains_key(&key) {
            self.order.retain(|k| k != &key);
        } else {
            while self.completed.len() >= capacity.max(1) {
                let Some(oldest) = self.order.pop_front() else {
                    break;
                };
                self.completed.remove(&oldest);
            }
        }

        self.completed.insert(
            key.clone(),
            CachedResult {
                value,
                completed_at: Instant::now(),
            },
        );
        self.order.push_back(key);
    }
}

/// Shares in-flight calls and caches recent results, keyed by
/// [`request_key`].
pub struct RequestDeduplicator<T = Value> {
    settings: DedupSettings,
    state: Arc<Mutex<DedupState<T>>>,
}

impl<T> Clone for RequestDeduplicator<T> {
    fn clone(&self) -> Self {
        Self {
            settings: self.settings,
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> Default for RequestDeduplicator<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(DedupSettings::default())
    }
}

impl<T> RequestDeduplicator<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(settings: DedupSettings) -> Self {
        Self {
            settings,
            state: Arc::new(Mutex::new(DedupState::new())),
        }
    }

    pub fn settings(&self) -> DedupSettings {
        self.settings
    }

    /// Run `thunk` unless an identical request is in flight or cached.
    ///
    /// `thunk` is only invoked when a new call is needed. It is invoked while
    /// the deduplicator's bookkeeping is locked, so it must not call back
    /// into the same deduplicator before returning its future.
    pub async fn call<F, Fut>(
        &self,
        method: &str,
        url: &str,
        params: Option<&Value>,
        thunk: F,
    ) -> Result<T, SharedError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let key = request_key(method, url, params);

        let pending = {
            let mut state = self.state.lock();

            if let Some(pending) = state.in_flight.get(&key) {
                tracing::trace!(key = %key, "Joining in-flight request");
                pending.clone()
            } else if let Some(value) = state.fresh(&key, self.settings.ttl) {
                tracing::trace!(key = %key, "Serving cached result");
                return Ok(value.clone());
            } else {
                state.remove_completed(&key);
                let pending = self.spawn_call(key.clone(), thunk());
                state.in_flight.insert(key, pending.clone());
                pending
            }
        };

        pending.await
    }

    /// Spawn the call and settle its bookkeeping once it finishes.
    ///
    /// The caller holds the state lock until the returned future is
    /// registered, so settlement cannot overtake registration.
    fn spawn_call<Fut>(&self, key: String, fut: Fut) -> PendingCall<T>
    where
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let capacity = self.settings.capacity;

        let handle = tokio::spawn(async move {
            let result = match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(result) => result,
                Err(_) => Err(anyhow::anyhow!("request panicked")),
            };

            let mut state = state.lock();
            state.in_flight.remove(&key);
            match result {
                Ok(value) => {
                    state.store(key, value.clone(), capacity);
                    Ok(value)
                }
                Err(e) => {
                    tracing::debug!(key = %key, error = %e, "Request failed, not caching");
                    Err(SharedError::new(e))
                }
            }
        });

        async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(SharedError::new(anyhow::anyhow!("request task failed: {}", e))),
            }
        }
        .boxed()
        .shared()
    }

    /// Whether an identical request is currently outstanding.
    pub fn is_request_in_progress(&self, method: &str, url: &str, params: Option<&Value>) -> bool {
        let key = request_key(method, url, params);
        self.state.lock().in_flight.contains_key(&key)
    }

    /// The cached result for a request, if present and not expired.
    pub fn cached_result(&self, method: &str, url: &str, params: Option<&Value>) -> Option<T> {
        let key = request_key(method, url, params);
        self.state.lock().fresh(&key, self.settings.ttl).cloned()
    }

    /// Drop every completed result. In-flight calls are unaffected.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.completed.clear();
        state.order.clear();
    }

    pub fn stats(&self) -> DedupStats {
        let state = self.state.lock();
        DedupStats {
            in_flight: state.in_flight.len(),
            cached: state.completed.len(),
        }
    }
}

impl<T> std::fmt::Debug for RequestDeduplicator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDeduplicator")
            .field("settings", &self.settings)
            .finish()
    }
}
