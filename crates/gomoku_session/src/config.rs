//! Client configuration loaded from TOML.

use std::path::Path;
use std::time::Duration;

use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::autoplay::AutoPlaySpeed;
use crate::selfplay::{MAX_LEVEL, MIN_LEVEL, SelfPlayRequest};

/// Environment variable overriding [`ClientConfig::engine_url`].
pub const ENGINE_URL_ENV: &str = "GOMOKU_ENGINE_URL";

/// Defaults for new self-play runs.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct SelfPlayDefaults {
    /// Games per profile pairing.
    #[serde(default = "default_games_per_pair")]
    games_per_pair: u32,

    /// Concurrent games on the engine.
    #[serde(default = "default_parallelism")]
    parallelism: u32,

    /// Lowest heuristic level.
    #[serde(default = "default_min_level")]
    min_level: u8,

    /// Highest heuristic level.
    #[serde(default = "default_max_level")]
    max_level: u8,
}

impl Default for SelfPlayDefaults {
    fn default() -> Self {
        Self {
            games_per_pair: default_games_per_pair(),
            parallelism: default_parallelism(),
            min_level: default_min_level(),
            max_level: default_max_level(),
        }
    }
}

/// Configuration of a client session.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the engine host.
    #[serde(default = "default_engine_url")]
    engine_url: String,

    /// Per-call timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    request_timeout_ms: u64,

    /// Initial auto-play speed.
    #[serde(default)]
    autoplay_speed: AutoPlaySpeed,

    /// Self-play defaults.
    #[serde(default)]
    self_play: SelfPlayDefaults,

    /// Tracing filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    log_filter: String,
}

fn default_engine_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_games_per_pair() -> u32 {
    4
}

fn default_parallelism() -> u32 {
    4
}

fn default_min_level() -> u8 {
    MIN_LEVEL
}

fn default_max_level() -> u8 {
    MAX_LEVEL
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            engine_url: default_engine_url(),
            request_timeout_ms: default_request_timeout_ms(),
            autoplay_speed: AutoPlaySpeed::default(),
            self_play: SelfPlayDefaults::default(),
            log_filter: default_log_filter(),
        }
    }
}

impl ClientConfig {
    /// Loads configuration from TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config = Self::from_toml(&content)?;
        info!(engine_url = %config.engine_url, "Config loaded successfully");
        Ok(config)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        if config.request_timeout_ms == 0 {
            return Err(ConfigError::new(
                "request_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(config)
    }

    /// Applies environment overrides.
    #[instrument(skip(self))]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(ENGINE_URL_ENV)
            && !url.trim().is_empty()
        {
            debug!(%url, "Engine URL overridden from environment");
            self.engine_url = url;
        }
        self
    }

    /// Replaces the engine URL.
    pub fn with_engine_url(mut self, url: impl Into<String>) -> Self {
        self.engine_url = url.into();
        self
    }

    /// Per-call timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// A self-play request seeded from the configured defaults.
    pub fn self_play_request(&self) -> SelfPlayRequest {
        SelfPlayRequest {
            games_per_pair: self.self_play.games_per_pair,
            parallelism: self.self_play.parallelism,
            min_level: self.self_play.min_level,
            max_level: self.self_play.max_level,
            ..SelfPlayRequest::default()
        }
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
