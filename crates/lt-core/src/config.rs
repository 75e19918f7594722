//! Configuration management
//!
//! Settings are resolved in the following order:
//! 1. Environment variables
//! 2. `lazy-traveler.toml` in the working directory
//! 3. Built-in defaults
//!
//! `${VAR_NAME}` inside the TOML file is replaced by the value of the
//! environment variable before parsing.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::position::Position;
use crate::{Error, Result};

/// Default config file name looked up by [`Config::load`]
pub const CONFIG_FILE: &str = "lazy-traveler.toml";

/// Upper bound for `chat.reconnect_delay_secs`
pub const MAX_RECONNECT_DELAY_SECS: u64 = 3600;

/// Main configuration for the lazy-traveler client
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    /// Starting position sent with chat messages
    #[serde(default)]
    pub location: Position,
}

/// REST backend settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Chat socket settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatConfig {
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    /// Fixed delay before a reconnect attempt, no backoff growth
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
        }
    }
}

impl ChatConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// Path to the SQLite file holding tokens, session id and counters
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Client-side daily caps (advisory only)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LimitsConfig {
    #[serde(default = "default_daily_messages")]
    pub daily_messages: u32,

    #[serde(default = "default_daily_refreshes")]
    pub daily_refreshes: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            daily_messages: default_daily_messages(),
            daily_refreshes: default_daily_refreshes(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.lazy-traveler.store".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_ws_url() -> String {
    "wss://api.lazy-traveler.store/ws/chat/".to_string()
}

fn default_reconnect_delay_secs() -> u64 {
    10
}

fn default_db_path() -> String {
    "data/lazy-traveler.db".to_string()
}

fn default_daily_messages() -> u32 {
    100
}

fn default_daily_refreshes() -> u32 {
    5
}

impl Config {
    /// Replace `${VAR_NAME}` occurrences with environment values.
    ///
    /// Unknown variables expand to an empty string.
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::new();
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next();

                let mut var_name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// Parse a TOML document (after env expansion)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let expanded = Self::expand_env_vars(content);
        let config: Config = toml::from_str(&expanded)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let mut cfg = Self::from_toml_str(&content)?;
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    /// Load from `./lazy-traveler.toml` if it exists, otherwise from the environment
    pub fn load() -> Result<Self> {
        if Path::new(CONFIG_FILE).exists() {
            return Self::from_toml_file(CONFIG_FILE);
        }

        Self::from_env()
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(url) = non_empty_env("LT_API_BASE_URL") {
            self.api.base_url = url;
        }
        if let Some(url) = non_empty_env("LT_WS_URL") {
            self.chat.ws_url = url;
        }
        if let Some(path) = non_empty_env("LT_DB_PATH") {
            self.storage.db_path = path;
        }
        if let Some(delay) = non_empty_env("LT_RECONNECT_DELAY_SECS") {
            self.chat.reconnect_delay_secs = parse_env("LT_RECONNECT_DELAY_SECS", &delay)?;
        }
        if let Some(limit) = non_empty_env("LT_DAILY_MESSAGE_LIMIT") {
            self.limits.daily_messages = parse_env("LT_DAILY_MESSAGE_LIMIT", &limit)?;
        }
        if let Some(limit) = non_empty_env("LT_DAILY_REFRESH_LIMIT") {
            self.limits.daily_refreshes = parse_env("LT_DAILY_REFRESH_LIMIT", &limit)?;
        }

        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if !(self.chat.ws_url.starts_with("ws://") || self.chat.ws_url.starts_with("wss://")) {
            return Err(Error::Config(format!(
                "chat.ws_url must be a ws:// or wss:// URL, got {}",
                self.chat.ws_url
            )));
        }
        if !(self.api.base_url.starts_with("http://") || self.api.base_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "api.base_url must be an http(s) URL, got {}",
                self.api.base_url
            )));
        }
        if self.chat.reconnect_delay_secs == 0 {
            return Err(Error::Config("chat.reconnect_delay_secs must be positive".to_string()));
        }
        if self.chat.reconnect_delay_secs > MAX_RECONNECT_DELAY_SECS {
            return Err(Error::Config(format!(
                "chat.reconnect_delay_secs must be at most {}, got {}",
                MAX_RECONNECT_DELAY_SECS, self.chat.reconnect_delay_secs
            )));
        }
        if !self.location.is_valid() {
            return Err(Error::Config(format!(
                "location must be a finite latitude in [-90, 90] and longitude in [-180, 180], got {}, {}",
                self.location.latitude, self.location.longitude
            )));
        }
        Ok(())
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} has an invalid value: {}", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.chat.reconnect_delay_secs, 10);
        assert_eq!(cfg.limits.daily_messages, 100);
        assert_eq!(cfg.limits.daily_refreshes, 5);
        assert_eq!(cfg.location, Position::default());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg = Config::from_toml_str(
            r#"
            [chat]
            ws_url = "ws://localhost:8000/ws/chat/"

            [limits]
            daily_messages = 20
            "#,
        )
        .unwrap();

        assert_eq!(cfg.chat.ws_url, "ws://localhost:8000/ws/chat/");
        assert_eq!(cfg.chat.reconnect_delay_secs, 10);
        assert_eq!(cfg.limits.daily_messages, 20);
        assert_eq!(cfg.limits.daily_refreshes, 5);
        assert_eq!(cfg.api, ApiConfig::default());
    }

    #[test]
    fn test_location_section() {
        let cfg = Config::from_toml_str(
            r#"
            [location]
            latitude = 35.1796
            longitude = 129.0756
            "#,
        )
        .unwrap();
        assert_eq!(cfg.location, Position::new(35.1796, 129.0756));
    }

    #[test]
    fn test_expand_env_vars() {
        // SAFETY: test-local variable name, not read by other tests
        unsafe { std::env::set_var("LT_TEST_EXPAND_HOST", "example.org") };
        let expanded = Config::expand_env_vars("https://${LT_TEST_EXPAND_HOST}/api");
        assert_eq!(expanded, "https://example.org/api");

        let missing = Config::expand_env_vars("a${LT_TEST_SURELY_MISSING_VAR}b");
        assert_eq!(missing, "ab");
    }

    #[test]
    fn test_rejects_bad_ws_scheme() {
        let err = Config::from_toml_str(
            r#"
            [chat]
            ws_url = "https://example.org/ws/chat/"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_zero_reconnect_delay() {
        let err = Config::from_toml_str(
            r#"
            [chat]
            reconnect_delay_secs = 0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_oversized_reconnect_delay() {
        let err = Config::from_toml_str(
            r#"
            [chat]
            reconnect_delay_secs = 9223372036854775807
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let max = Config::from_toml_str(
            r#"
            [chat]
            reconnect_delay_secs = 3600
            "#,
        )
        .unwrap();
        assert_eq!(max.chat.reconnect_delay(), Duration::from_secs(MAX_RECONNECT_DELAY_SECS));
    }

    #[test]
    fn test_rejects_invalid_location() {
        for location in [
            "latitude = nan\nlongitude = 126.9",
            "latitude = 37.5\nlongitude = 999.0",
            "latitude = -91.0\nlongitude = 0.0",
        ] {
            let err = Config::from_toml_str(&format!("[location]\n{}\n", location)).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "accepted {}", location);
        }
    }

    #[test]
    fn test_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lazy-traveler.toml");
        std::fs::write(&path, "[storage]\ndb_path = \"/tmp/lt-test.db\"\n").unwrap();

        let cfg = Config::from_toml_file(&path).unwrap();
        // LT_DB_PATH is not set in the test environment
        if std::env::var("LT_DB_PATH").is_err() {
            assert_eq!(cfg.storage.db_path, "/tmp/lt-test.db");
        }
    }
}
