//! Configuration file parser for ~/.config/feedsync/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde (with `deny_unknown_fields` off),
//! though we log a warning when the file contains potential typos.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::fetch::{FetchSettings, ProxyConfig, DEFAULT_USER_AGENT};
use crate::images::{DEFAULT_IMAGE_CACHE_CAPACITY, DEFAULT_PREFETCH_RANGE};

/// Environment variable that overrides `proxy.password` from the file.
pub const PROXY_PASSWORD_ENV: &str = "FEEDSYNC_PROXY_PASSWORD";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
///
/// SEC-015: `Debug` goes through [`ProxyConfig`]'s impl, which masks the
/// proxy password.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Minutes between automatic syncs in `sync --watch`. 0 = sync once.
    pub refresh_interval_minutes: u64,

    /// Images kept in memory. 0 is treated as 1.
    pub image_cache_capacity: usize,

    /// Rows per prefetch window.
    pub prefetch_range: usize,

    /// Transport timeout for every HTTP request, in seconds.
    pub request_timeout_secs: u64,

    /// Identifying header sent with every request.
    pub user_agent: String,

    /// Default age, in days, for `purge`.
    pub purge_after_days: u32,

    /// Where `enclosure` saves downloads. Must already exist.
    pub enclosure_dir: Option<PathBuf>,

    /// Forward proxy; an empty host means direct connections.
    pub proxy: ProxyConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh_interval_minutes: 0,
            image_cache_capacity: DEFAULT_IMAGE_CACHE_CAPACITY,
            prefetch_range: DEFAULT_PREFETCH_RANGE,
            request_timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            purge_after_days: 30,
            enclosure_dir: None,
            proxy: ProxyConfig::none(),
        }
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 8] = [
        "refresh_interval_minutes",
        "image_cache_capacity",
        "prefetch_range",
        "request_timeout_secs",
        "user_agent",
        "purge_after_days",
        "enclosure_dir",
        "proxy",
    ];

    const KNOWN_PROXY_KEYS: [&'static str; 4] = ["host", "port", "username", "password"];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    ///
    /// The proxy password from [`PROXY_PASSWORD_ENV`] takes precedence over
    /// the file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_file(path)?;
        if let Ok(password) = std::env::var(PROXY_PASSWORD_ENV) {
            config.proxy.password = Some(SecretString::from(password));
        }
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading to prevent memory exhaustion
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
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        Self::warn_unknown_keys(&content);

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            proxied = config.proxy.is_enabled(),
            "Loaded configuration"
        );
        Ok(config)
    }

    fn warn_unknown_keys(content: &str) {
        let Ok(raw) = content.parse::<toml::Table>() else {
            return;
        };

        for key in raw.keys() {
            if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                tracing::warn!(key = %key, "Unknown key in config file, ignoring");
            }
        }
        if let Some(proxy) = raw.get("proxy").and_then(|v| v.as_table()) {
            for key in proxy.keys() {
                if !Self::KNOWN_PROXY_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %format!("proxy.{key}"), "Unknown key in config file, ignoring");
                }
            }
        }
    }

    /// Transport settings for the [`ResourceFetcher`](crate::fetch::ResourceFetcher).
    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            user_agent: self.user_agent.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
        }
    }

    /// Default location: `$XDG_CONFIG_HOME/feedsync` or `~/.config/feedsync`.
    pub fn default_dir() -> Option<PathBuf> {
        if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME").filter(|d| !d.is_empty()) {
            return Some(PathBuf::from(dir).join("feedsync"));
        }
        std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config").join("feedsync"))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(name: &str, content: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(name);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.refresh_interval_minutes, 0);
        assert_eq!(config.image_cache_capacity, 200);
        assert_eq!(config.prefetch_range, 10);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.user_agent, "Mozilla/5.0");
        assert_eq!(config.purge_after_days, 30);
        assert!(config.enclosure_dir.is_none());
        assert!(!config.proxy.is_enabled());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/feedsync_test_nonexistent_config.toml");
        let config = Config::load_file(path).unwrap();
        assert_eq!(config.prefetch_range, 10);
    }

    #[test]
    fn test_empty_and_whitespace_files_return_default() {
        let (dir, path) = write_config("feedsync_config_test_empty", "   \n  \n");
        let config = Config::load_file(&path).unwrap();
        assert_eq!(config.image_cache_capacity, 200);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let (dir, path) = write_config("feedsync_config_test_partial", "prefetch_range = 4\n");
        let config = Config::load_file(&path).unwrap();
        assert_eq!(config.prefetch_range, 4);
        assert_eq!(config.refresh_interval_minutes, 0);
        assert_eq!(config.user_agent, "Mozilla/5.0");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let content = r#"
refresh_interval_minutes = 15
image_cache_capacity = 50
prefetch_range = 5
request_timeout_secs = 10
user_agent = "feedsync-test/1.0"
purge_after_days = 7
enclosure_dir = "/tmp/podcasts"

[proxy]
host = "proxy.corp.example"
port = 3128
username = "alice"
password = "hunter2"
"#;
        let (dir, path) = write_config("feedsync_config_test_full", content);

        let config = Config::load_file(&path).unwrap();
        assert_eq!(config.refresh_interval_minutes, 15);
        assert_eq!(config.image_cache_capacity, 50);
        assert_eq!(config.prefetch_range, 5);
        assert_eq!(config.purge_after_days, 7);
        assert_eq!(config.enclosure_dir, Some(PathBuf::from("/tmp/podcasts")));
        assert!(config.proxy.is_enabled());
        assert_eq!(config.proxy.endpoint(), "http://proxy.corp.example:3128");
        assert_eq!(config.proxy.username, "alice");

        let settings = config.fetch_settings();
        assert_eq!(settings.user_agent, "feedsync-test/1.0");
        assert_eq!(settings.timeout, Duration::from_secs(10));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let (dir, path) = write_config("feedsync_config_test_invalid", "this is not [valid toml");
        let err = Config::load_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let content = r#"
prefetch_range = 3
totally_fake_key = "should not fail"

[proxy]
host = "p.example"
hostname_typo = "x"
"#;
        let (dir, path) = write_config("feedsync_config_test_unknown", content);
        let config = Config::load_file(&path).unwrap();
        assert_eq!(config.prefetch_range, 3);
        assert_eq!(config.proxy.host, "p.example");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let (dir, path) = write_config("feedsync_config_test_wrongtype", "prefetch_range = \"ten\"\n");
        assert!(Config::load_file(&path).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    // SEC-014: File size limit
    #[test]
    fn test_too_large_file_rejected() {
        let (dir, path) = write_config("feedsync_config_test_too_large", &"a".repeat(1_048_577));
        let err = Config::load_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));
        std::fs::remove_dir_all(&dir).ok();
    }

    // SEC-015: Debug output masks the proxy password
    #[test]
    fn test_debug_masks_proxy_password() {
        let mut config = Config::default();
        config.proxy = ProxyConfig::new("proxy.local", 8080).with_credentials("bob", "super-secret-12345");

        let debug_output = format!("{:?}", config);
        assert!(
            !debug_output.contains("super-secret-12345"),
            "Debug output should not contain the proxy password"
        );
        assert!(debug_output.contains("[REDACTED]"));
    }

    #[test]
    fn test_zero_timeout_clamped() {
        let config = Config {
            request_timeout_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.fetch_settings().timeout, Duration::from_secs(1));
    }
}
