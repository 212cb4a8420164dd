//! Server configuration.

use chrono::TimeDelta;
use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Which session store backs the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StoreBackend {
    /// SQLite file at `database_url`.
    #[default]
    Sqlite,
    /// Process memory; sessions vanish on restart.
    Memory,
}

/// Configuration for the session server.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Setters, Serialize, Deserialize)]
#[setters(prefix = "with_")]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    #[setters(into)]
    host: String,

    /// Port to bind.
    port: u16,

    /// Seconds a session lives after its last mutation.
    session_ttl_secs: u32,

    /// Session store backend.
    store: StoreBackend,

    /// SQLite database path (ignored for the memory backend).
    #[setters(into)]
    database_url: String,

    /// Seconds between sweeps that drop expired sessions.
    purge_interval_secs: u64,

    /// Polling cadence suggested to watchers, in milliseconds.
    poll_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8099,
            session_ttl_secs: 10_800,
            store: StoreBackend::default(),
            database_url: "strictly_chess.db".to_string(),
            purge_interval_secs: 300,
            poll_interval_ms: 3_000,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a TOML file. Missing keys take defaults.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;

        info!(port = config.port, store = %config.store, "Config loaded successfully");
        Ok(config)
    }

    /// Applies `PORT`, `SESSION_TIMEOUT`, `DATABASE_URL`, `SESSION_STORE` and
    /// `POLL_INTERVAL_MS` from the environment.
    #[instrument(skip(self))]
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_vars(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable lookup.
    #[instrument(skip(self, lookup))]
    pub fn with_vars(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(port) = lookup("PORT") {
            self.port = port
                .parse()
                .map_err(|_| ConfigError::new(format!("Invalid PORT: '{}'", port)))?;
        }
        if let Some(ttl) = lookup("SESSION_TIMEOUT") {
            self.session_ttl_secs = ttl
                .parse()
                .map_err(|_| ConfigError::new(format!("Invalid SESSION_TIMEOUT: '{}'", ttl)))?;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(store) = lookup("SESSION_STORE") {
            self.store = store
                .parse()
                .map_err(|_| ConfigError::new(format!("Invalid SESSION_STORE: '{}'", store)))?;
        }
        if let Some(interval) = lookup("POLL_INTERVAL_MS") {
            self.poll_interval_ms = interval
                .parse()
                .map_err(|_| ConfigError::new(format!("Invalid POLL_INTERVAL_MS: '{}'", interval)))?;
        }
        debug!(config = ?self, "Environment overrides applied");
        Ok(self)
    }

    /// Session lifetime after each mutation.
    pub fn session_ttl(&self) -> TimeDelta {
        TimeDelta::seconds(i64::from(self.session_ttl_secs))
    }

    /// Interval between expiry sweeps.
    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs)
    }

    /// Polling cadence for `watch` when no interval is given on the command line.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
