pub mod auth;
pub mod client;
pub mod config;
pub mod data;
pub mod dedup;
pub mod scoring;
pub mod tracker;
pub mod util;
pub mod web;

pub use client::{ApiClient, ClientError};
pub use config::Config;
pub use data::{Database, Exam, Question, Role, Submission, User};
pub use dedup::{DedupSettings, RequestDeduplicator, SharedError};
pub use tracker::{
    CheatingData, MemoryStorage, TrackerRegistry, TrackerSettings, TrackerStorage, Visibility,
    VisibilityTracker,
};
pub use web::{build_router, WebAppState};
