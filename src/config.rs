//! Configuration file parser for ~/.config/studymode/config.toml.
//!
//! The config file is optional — a missing file yields
//! `Config::default()`. Unknown keys are accepted (serde default
//! behavior) but logged as probable typos.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::engine::EngineConfig;
use crate::store::DEFAULT_DETAILS_TTL_HOURS;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds the maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be
/// specified; missing keys fall back to the built-in defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Quiet window for the placement/navigation pass, in milliseconds.
    pub placement_debounce_ms: u64,

    /// Quiet window for the filtering pass, in milliseconds.
    pub filter_debounce_ms: u64,

    /// How long add-control feedback lingers before the control
    /// retires itself, in milliseconds.
    pub feedback_linger_ms: u64,

    /// Freshness window for cached channel details, in hours.
    pub details_cache_ttl_hours: i64,

    /// Override for the metadata lookup base URL (testing against a
    /// local fixture server). Absent = the real site.
    pub lookup_base_url: Option<String>,

    /// HTTP client timeout for metadata fetches, in seconds.
    pub fetch_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            placement_debounce_ms: 500,
            filter_debounce_ms: 200,
            feedback_linger_ms: 1_000,
            details_cache_ttl_hours: DEFAULT_DETAILS_TTL_HOURS,
            lookup_base_url: None,
            fetch_timeout_secs: 20,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with position info
    /// - Unknown keys → accepted, logged as warnings
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check the size before reading so a corrupted or maliciously
        // large file cannot exhaust memory.
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File deleted between metadata and read.
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        // Surface probable typos: parse once as a raw table and warn on
        // keys we do not know.
        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = [
                "placement_debounce_ms",
                "filter_debounce_ms",
                "feedback_linger_ms",
                "details_cache_ttl_hours",
                "lookup_base_url",
                "fetch_timeout_secs",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Project the file config into engine tunables.
    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            placement_debounce: Duration::from_millis(self.placement_debounce_ms),
            filter_debounce: Duration::from_millis(self.filter_debounce_ms),
            feedback_linger: Duration::from_millis(self.feedback_linger_ms),
            details_ttl_hours: self.details_cache_ttl_hours,
            lookup_base_url: self.lookup_base_url.clone(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
