//! Configuration loading, validation, and management for Periscope.
//!
//! Loads configuration from `~/.periscope/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.periscope/config.toml`.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Search tool configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Researcher agent configuration
    #[serde(default)]
    pub agent: AgentConfig,

    /// Runtime configuration
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("storage", &self.storage)
            .field("search", &self.search)
            .field("agent", &self.agent)
            .field("runtime", &self.runtime)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path. `":memory:"` for an ephemeral database.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "~/.periscope/periscope.db".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Name of the default search provider.
    #[serde(default = "default_search_provider")]
    pub default_provider: String,

    /// Endpoint of the generic HTTP search provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// API key for the search provider. Overridable via PERISCOPE_SEARCH_API_KEY.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Per-call timeout in seconds.
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,

    /// Result cache time-to-live in seconds.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Maximum number of cached result sets.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_search_provider() -> String {
    "default".into()
}
fn default_search_timeout() -> u64 {
    15
}
fn default_cache_ttl() -> u64 {
    300
}
fn default_cache_capacity() -> usize {
    100
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_provider: default_search_provider(),
            endpoint: None,
            api_key: None,
            timeout_secs: default_search_timeout(),
            cache_ttl_secs: default_cache_ttl(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("default_provider", &self.default_provider)
            .field("endpoint", &self.endpoint)
            .field("api_key", &redact(&self.api_key))
            .field("timeout_secs", &self.timeout_secs)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("cache_capacity", &self.cache_capacity)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Default search mode: "quick", "planning", or "adaptive".
    #[serde(default = "default_mode")]
    pub default_mode: String,

    /// Model identifier handed to the model runtime.
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_mode() -> String {
    "adaptive".into()
}
fn default_model() -> String {
    "anthropic/claude-sonnet-4".into()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            default_mode: default_mode(),
            model: default_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Default log level when RUST_LOG is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Errors from configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config I/O error: {e}"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::Invalid(e) => write!(f, "invalid config: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl AppConfig {
    /// Default config file location: `~/.periscope/config.toml`.
    pub fn default_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
        Path::new(&home).join(".periscope").join("config.toml")
    }

    /// Load from the default path, falling back to defaults when the file
    /// does not exist. Environment overrides are applied afterwards.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            let mut config = Self::default();
            config.apply_env_overrides();
            config.validate()?;
            Ok(config)
        }
    }

    /// Load from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let mut config: Self =
            toml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("PERISCOPE_SEARCH_API_KEY") {
            self.search.api_key = Some(key);
        }
        if let Ok(endpoint) = std::env::var("PERISCOPE_SEARCH_ENDPOINT") {
            self.search.endpoint = Some(endpoint);
        }
        if let Ok(path) = std::env::var("PERISCOPE_DB_PATH") {
            self.storage.path = path;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.path.trim().is_empty() {
            return Err(ConfigError::Invalid("storage.path must not be empty".into()));
        }
        if self.search.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "search.timeout_secs must be positive".into(),
            ));
        }
        if self.search.cache_capacity == 0 {
            return Err(ConfigError::Invalid(
                "search.cache_capacity must be positive".into(),
            ));
        }
        match self.agent.default_mode.as_str() {
            "quick" | "planning" | "adaptive" => {}
            other => {
                return Err(ConfigError::Invalid(format!(
                    "agent.default_mode must be quick, planning, or adaptive (got '{other}')"
                )));
            }
        }
        Ok(())
    }

    /// Database path with `~` expanded.
    pub fn db_path(&self) -> String {
        if let Some(rest) = self.storage.path.strip_prefix("~/") {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
            return Path::new(&home).join(rest).to_string_lossy().into_owned();
        }
        self.storage.path.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.search.timeout_secs, 15);
        assert_eq!(config.search.cache_ttl_secs, 300);
        assert_eq!(config.search.cache_capacity, 100);
        assert_eq!(config.agent.default_mode, "adaptive");
    }

    #[test]
    fn loads_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[storage]
path = ":memory:"

[agent]
default_mode = "quick"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.storage.path, ":memory:");
        assert_eq!(config.agent.default_mode, "quick");
        // untouched sections keep defaults
        assert_eq!(config.search.cache_capacity, 100);
    }

    #[test]
    fn invalid_mode_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[agent]
default_mode = "turbo"
"#
        )
        .unwrap();

        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut config = AppConfig::default();
        config.search.api_key = Some("secret-key".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("[REDACTED]"));
    }
}
