//! Shared state for the web server.

use std::sync::Arc;

use crate::auth::TokenSigner;
use crate::config::Config;
use crate::data::{AppStateStore, Database, ExamStore, SubmissionStore, UserStore};
use crate::tracker::{Clock, SystemClock, TrackerRegistry};

/// Shared application state for all web handlers.
///
/// Cheap to clone; every handler gets its own handle.
#[derive(Clone)]
pub struct WebAppState {
    inner: Arc<Inner>,
}

struct Inner {
    config: Config,
    signer: TokenSigner,
    users: UserStore,
    exams: ExamStore,
    submissions: SubmissionStore,
    app_state: AppStateStore,
    trackers: TrackerRegistry,
}

impl WebAppState {
    /// Create a new web app state over an initialized database.
    pub fn new(config: Config, db: Database) -> Self {
        Self::with_clock(config, db, Arc::new(SystemClock))
    }

    /// Like [`new`](Self::new), with the clock trackers measure hidden time by.
    pub fn with_clock(config: Config, db: Database, clock: Arc<dyn Clock>) -> Self {
        if !config.token_secret_configured {
            tracing::warn!(
                "No [auth] token_secret configured; tokens will not survive a restart"
            );
        }

        let signer = TokenSigner::new(&config.token_secret, config.token_ttl);
        let app_state = AppStateStore::new(db.clone());
        let trackers =
            TrackerRegistry::with_clock(Arc::new(app_state.clone()), config.tracker, clock);

        Self {
            inner: Arc::new(Inner {
                signer,
                users: UserStore::new(db.clone()),
                exams: ExamStore::new(db.clone()),
                submissions: SubmissionStore::new(db),
                app_state,
                trackers,
                config,
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.inner.signer
    }

    pub fn users(&self) -> &UserStore {
        &self.inner.users
    }

    pub fn exams(&self) -> &ExamStore {
        &self.inner.exams
    }

    pub fn submissions(&self) -> &SubmissionStore {
        &self.inner.submissions
    }

    /// Key-value store backing persisted cheating records.
    pub fn app_state(&self) -> &AppStateStore {
        &self.inner.app_state
    }

    pub fn trackers(&self) -> &TrackerRegistry {
        &self.inner.trackers
    }
}
