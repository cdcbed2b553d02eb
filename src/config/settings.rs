use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::dedup::DedupSettings;
use crate::tracker::TrackerSettings;
use crate::util::paths::config_path;

/// Example configuration file contents (bundled with the binary)
pub const EXAMPLE_CONFIG: &str = include_str!("config.toml.example");

/// Default bearer token lifetime (8 hours)
const DEFAULT_TOKEN_TTL_MINUTES: i64 = 8 * 60;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Allow any origin in CORS (development)
    pub cors_permissive: bool,
    /// Secret used to sign bearer tokens
    pub token_secret: String,
    /// Whether `token_secret` came from the config file
    pub token_secret_configured: bool,
    /// Bearer token lifetime
    pub token_ttl: chrono::Duration,
    /// Anti-cheating tracker thresholds
    pub tracker: TrackerSettings,
    /// Client-side request deduplication
    pub dedup: DedupSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            cors_permissive: true,
            token_secret: uuid::Uuid::new_v4().simple().to_string(),
            token_secret_configured: false,
            token_ttl: chrono::Duration::minutes(DEFAULT_TOKEN_TTL_MINUTES),
            tracker: TrackerSettings::default(),
            dedup: DedupSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub cors_permissive: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlAuthConfig {
    pub token_secret: Option<String>,
    pub token_ttl_minutes: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlTrackerConfig {
    pub hidden_threshold_ms: Option<u64>,
    pub cheating_threshold: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlDedupConfig {
    pub cache_capacity: Option<usize>,
    pub cache_ttl_secs: Option<u64>,
}

/// TOML representation of the config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub server: Option<TomlServerConfig>,
    pub auth: Option<TomlAuthConfig>,
    pub tracker: Option<TomlTrackerConfig>,
    pub dedup: Option<TomlDedupConfig>,
}

impl Config {
    /// Load configuration from the default config file, merging with defaults
    pub fn load() -> Self {
        let config_file = config_path();

        // Create example config on first run
        if !config_file.exists() {
            Self::create_default_config(&config_file);
        }

        Self::load_from(&config_file)
    }

    /// Load configuration from a specific file, merging with defaults.
    ///
    /// A missing or unparsable file yields the defaults.
    pub fn load_from(path: &Path) -> Self {
        let mut config = Config::default();

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "No config file, using defaults");
                return config;
            }
        };

        match toml::from_str::<TomlConfig>(&contents) {
            Ok(toml_config) => config.merge(toml_config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Invalid config file, using defaults");
            }
        }

        config
    }

    fn merge(&mut self, toml_config: TomlConfig) {
        if let Some(server) = toml_config.server {
            if let Some(host) = server.host {
                self.host = host;
            }
            if let Some(port) = server.port {
                self.port = port;
            }
            if let Some(cors_permissive) = server.cors_permissive {
                self.cors_permissive = cors_permissive;
            }
        }

        if let Some(auth) = toml_config.auth {
            if let Some(secret) = auth.token_secret.filter(|s| !s.is_empty()) {
                self.token_secret = secret;
                self.token_secret_configured = true;
            }
            if let Some(minutes) = auth.token_ttl_minutes.filter(|m| *m > 0) {
                self.token_ttl = chrono::Duration::minutes(minutes);
            }
        }

        if let Some(tracker) = toml_config.tracker {
            if let Some(ms) = tracker.hidden_threshold_ms {
                self.tracker.hidden_threshold = Duration::from_millis(ms);
            }
            if let Some(threshold) = tracker.cheating_threshold.filter(|t| *t > 0) {
                self.tracker.cheating_threshold = threshold;
            }
        }

        if let Some(dedup) = toml_config.dedup {
            if let Some(capacity) = dedup.cache_capacity.filter(|c| *c > 0) {
                self.dedup.capacity = capacity;
            }
            if let Some(secs) = dedup.cache_ttl_secs {
                self.dedup.ttl = Duration::from_secs(secs);
            }
        }
    }

    /// Create the default config file from the bundled example
    fn create_default_config(path: &PathBuf) {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                if let Err(e) = fs::create_dir_all(parent) {
                    tracing::warn!(error = %e, "Failed to create config directory");
                    return;
                }
            }
        }

        if let Err(e) = fs::write(path, EXAMPLE_CONFIG) {
            tracing::warn!(error = %e, "Failed to write default config");
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_token_secret(mut self, secret: impl Into<String>) -> Self {
        self.token_secret = secret.into();
        self.token_secret_configured = true;
        self
    }
}
