//! Configuration Module
//!
//! Handles loading and validating cache and coordinator settings from
//! environment variables or a JSON file.

use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::cache::Category;
use crate::coordinator::InvalidationRules;
use crate::error::ConfigError;

/// One entry of the action → categories invalidation table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RuleConfig {
    /// Mutating action name, e.g. `create-item`
    pub action: String,
    /// Categories purged when the action succeeds
    pub categories: Vec<String>,
    /// Optional regex restricting which keys are purged
    #[serde(default)]
    pub key_pattern: Option<String>,
}

/// Cache and coordinator configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum number of entries the cache can hold
    pub max_entries: usize,
    /// TTL in milliseconds for categories missing from `categories`
    pub default_ttl_ms: u64,
    /// Background sweep interval in seconds
    pub sweep_interval: u64,
    /// Category name → TTL in milliseconds (0 disables caching)
    pub categories: BTreeMap<String, u64>,
    /// Action → category invalidation rules
    pub invalidation_rules: Vec<RuleConfig>,
    /// Total attempts per request, including the first
    pub max_attempts: u32,
    /// Backoff unit; the nth retry waits n times this
    pub base_backoff_ms: u64,
    /// Time budget for a single attempt
    pub attempt_timeout_ms: u64,
    /// Sidecar HTTP port
    pub server_port: u16,
    /// Upstream API base URL
    pub api_base_url: String,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_ENTRIES` - Maximum cache entries (default: 1000)
    /// - `DEFAULT_TTL_MS` - Fallback TTL in milliseconds (default: 300000)
    /// - `SWEEP_INTERVAL` - Sweep frequency in seconds (default: 1)
    /// - `CATEGORY_TTLS` - JSON object of category → TTL ms (default: `{}`)
    /// - `INVALIDATION_RULES` - JSON array of rules (default: `[]`)
    /// - `MAX_ATTEMPTS` - Attempts per request (default: 3)
    /// - `BASE_BACKOFF_MS` - Linear backoff unit (default: 200)
    /// - `ATTEMPT_TIMEOUT_MS` - Per-attempt timeout (default: 10000)
    /// - `SERVER_PORT` - Sidecar port (default: 3000)
    /// - `API_BASE_URL` - Upstream base URL (default: `http://localhost:8080`)
    ///
    /// Malformed scalar values fall back to their defaults; malformed JSON
    /// tables are reported as errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let categories = match env::var("CATEGORY_TTLS") {
            Ok(raw) => parse_category_ttls(&raw)?,
            Err(_) => defaults.categories,
        };
        let invalidation_rules = match env::var("INVALIDATION_RULES") {
            Ok(raw) => parse_rules(&raw)?,
            Err(_) => defaults.invalidation_rules,
        };

        Ok(Self {
            max_entries: env_or("MAX_ENTRIES", defaults.max_entries),
            default_ttl_ms: env_or("DEFAULT_TTL_MS", defaults.default_ttl_ms),
            sweep_interval: env_or("SWEEP_INTERVAL", defaults.sweep_interval),
            categories,
            invalidation_rules,
            max_attempts: env_or("MAX_ATTEMPTS", defaults.max_attempts),
            base_backoff_ms: env_or("BASE_BACKOFF_MS", defaults.base_backoff_ms),
            attempt_timeout_ms: env_or("ATTEMPT_TIMEOUT_MS", defaults.attempt_timeout_ms),
            server_port: env_or("SERVER_PORT", defaults.server_port),
            api_base_url: env::var("API_BASE_URL").unwrap_or(defaults.api_base_url),
        })
    }

    /// Parses a JSON document; omitted fields take their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(|e| ConfigError::Parse {
            what: "config".to_string(),
            reason: e.to_string(),
        })
    }

    /// Reads and parses a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&raw)
    }

    /// Checks ranges and that every rule references a known category with a
    /// valid key pattern.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_entries == 0 {
            return Err(invalid("max_entries", "must be at least 1"));
        }
        if self.max_attempts == 0 {
            return Err(invalid("max_attempts", "must be at least 1"));
        }
        if self.attempt_timeout_ms == 0 {
            return Err(invalid("attempt_timeout_ms", "must be greater than 0"));
        }
        if self.sweep_interval == 0 {
            return Err(invalid("sweep_interval", "must be greater than 0"));
        }

        InvalidationRules::compile(&self.invalidation_rules, |category: &Category| {
            self.categories.contains_key(category.as_str())
        })?;
        Ok(())
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval)
    }

    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            default_ttl_ms: 300_000,
            sweep_interval: 1,
            categories: BTreeMap::new(),
            invalidation_rules: Vec::new(),
            max_attempts: 3,
            base_backoff_ms: 200,
            attempt_timeout_ms: 10_000,
            server_port: 3000,
            api_base_url: "http://localhost:8080".to_string(),
        }
    }
}

/// Parses `{"items": 60000, "metrics": 5000}`.
pub fn parse_category_ttls(raw: &str) -> Result<BTreeMap<String, u64>, ConfigError> {
    serde_json::from_str(raw).map_err(|e| ConfigError::Parse {
        what: "CATEGORY_TTLS".to_string(),
        reason: e.to_string(),
    })
}

/// Parses `[{"action": "create-item", "categories": ["items"]}]`.
pub fn parse_rules(raw: &str) -> Result<Vec<RuleConfig>, ConfigError> {
    serde_json::from_str(raw).map_err(|e| ConfigError::Parse {
        what: "INVALIDATION_RULES".to_string(),
        reason: e.to_string(),
    })
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
