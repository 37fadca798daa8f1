//! Configuration file handling.
//!
//! This module provides loading and saving of patchwatch configuration
//! from a TOML file.
//!
//! # Configuration Location
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/patchwatch/config.toml`
//! - macOS: `~/Library/Application Support/patchwatch/config.toml`
//! - Windows: `%APPDATA%\patchwatch\config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! default_format = "table"
//! report_dir = "reports"
//!
//! [lookup]
//! api_url = "https://vulners.com/api/v3/burp/software/"
//! timeout_secs = 10
//! pacing_ms = 250
//! progress_every = 10
//! log_fatal_details = false
//!
//! [retry]
//! max_attempts = 3
//! base_delay_ms = 500
//! max_delay_ms = 5000
//! rate_limit_cooldown_ms = 10000
//! jitter_ms = 500
//!
//! [notify]
//! github_repo = "acme/infra"
//!
//! [ignore]
//! packages = ["linux-image-*"]
//! vulnerabilities = ["CVE-2021-12345"]
//! ```

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::checker::{RetryConfig, DEFAULT_API_URL, DEFAULT_PACING, DEFAULT_PROGRESS_EVERY};

/// Application configuration.
///
/// This struct represents all configurable options for patchwatch.
/// It can be loaded from a TOML file or created with default values.
///
/// # Example
///
/// ```no_run
/// use patchwatch::Config;
///
/// // Load from file (or use defaults if file doesn't exist)
/// let config = Config::load().unwrap();
///
/// println!("Max attempts: {}", config.retry.max_attempts);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default output format when no `--format` flag is provided.
    ///
    /// Valid values: "table", "json", "html"
    /// Default: "table"
    pub default_format: String,

    /// Directory that `scan --report` writes HTML reports into.
    ///
    /// Default: "reports"
    pub report_dir: PathBuf,

    pub lookup: LookupConfig,

    pub retry: RetryConfig,

    pub notify: NotifyConfig,

    /// Ignore list configuration for suppressing known issues.
    pub ignore: IgnoreConfig,
}

/// Settings for the vulnerability lookup service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    pub api_url: String,

    /// Sent as the `apiKey` query parameter when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Per-request timeout, in seconds.
    pub timeout_secs: u64,

    /// Pause between consecutive packages, in milliseconds.
    pub pacing_ms: u64,

    /// Emit a progress line every this many packages.
    pub progress_every: usize,

    /// Log the full diagnostic when the service returns an unusable body.
    pub log_fatal_details: bool,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            timeout_secs: 10,
            pacing_ms: DEFAULT_PACING.as_millis() as u64,
            progress_every: DEFAULT_PROGRESS_EVERY,
            log_fatal_details: false,
        }
    }
}

impl LookupConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

/// Notification targets. Environment variables take precedence, see
/// [`NotifySettings`](crate::notify::NotifySettings).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slack_webhook: Option<String>,

    /// Repository in `owner/name` form that issues are opened against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_repo: Option<String>,

    pub github_api: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            slack_webhook: None,
            github_repo: None,
            github_api: "https://api.github.com".to_string(),
        }
    }
}

/// Configuration for ignoring specific packages or vulnerabilities.
///
/// Package patterns are applied before lookup, identifiers after.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreConfig {
    /// Package names to exclude from lookups.
    ///
    /// Supports glob patterns (e.g., "linux-image-*", "*-doc").
    pub packages: Vec<String>,

    /// Vulnerability identifiers to drop from results.
    pub vulnerabilities: Vec<String>,
}

impl IgnoreConfig {
    /// True when `name` matches any ignored package pattern.
    pub fn should_ignore_package(&self, name: &str) -> bool {
        self.packages.iter().any(|pattern| {
            if pattern.contains('*') {
                glob_match(pattern, name)
            } else {
                pattern == name
            }
        })
    }

    /// True when `identifier` is on the suppression list.
    pub fn should_ignore_vulnerability(&self, identifier: &str) -> bool {
        self.vulnerabilities.iter().any(|id| id == identifier)
    }
}

/// Matches `*` wildcards against `text`.
fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();

    if parts.len() == 1 {
        return pattern == text;
    }

    let mut remaining = text;

    if let Some(prefix) = parts.first().filter(|p| !p.is_empty()) {
        match remaining.strip_prefix(prefix) {
            Some(rest) => remaining = rest,
            None => return false,
        }
    }

    if let Some(suffix) = parts.last().filter(|p| !p.is_empty()) {
        match remaining.strip_suffix(suffix) {
            Some(rest) => remaining = rest,
            None => return false,
        }
    }

    for part in parts[1..parts.len() - 1].iter().filter(|p| !p.is_empty()) {
        match remaining.find(part) {
            Some(pos) => remaining = &remaining[pos + part.len()..],
            None => return false,
        }
    }

    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_format: "table".to_string(),
            report_dir: PathBuf::from("reports"),
            lookup: LookupConfig::default(),
            retry: RetryConfig::default(),
            notify: NotifyConfig::default(),
            ignore: IgnoreConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the default config file.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Loads configuration from an explicit path, falling back to defaults
    /// when the file is absent.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Rejects settings that would make every lookup a no-op.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.retry.max_attempts >= 1,
            "retry.max_attempts must be at least 1, got {}",
            self.retry.max_attempts
        );
        Ok(())
    }

    /// Saves the configuration to the default config file.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Creates the parent directory if it doesn't exist.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Returns the path to the configuration file.
    ///
    /// # Example
    ///
    /// ```
    /// use patchwatch::Config;
    ///
    /// let path = Config::config_path();
    /// println!("Config file: {}", path.display());
    /// ```
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("patchwatch")
            .join("config.toml")
    }

    /// Default configuration rendered as TOML.
    pub fn generate_default_config() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match_exact() {
        assert!(glob_match("openssl", "openssl"));
        assert!(!glob_match("openssl", "libssl3"));
    }

    #[test]
    fn test_glob_match_prefix() {
        assert!(glob_match("linux-image-*", "linux-image-5.15.0-91-generic"));
        assert!(glob_match("linux-image-*", "linux-image-"));
        assert!(!glob_match("linux-image-*", "linux-headers-5.15.0"));
    }

    #[test]
    fn test_glob_match_suffix() {
        assert!(glob_match("*-doc", "python3-doc"));
        assert!(!glob_match("*-doc", "python3"));
    }

    #[test]
    fn test_glob_match_contains() {
        assert!(glob_match("*ssl*", "libssl3"));
        assert!(glob_match("*ssl*", "openssl"));
        assert!(!glob_match("*ssl*", "gnutls"));
    }

    #[test]
    fn test_glob_match_middle() {
        assert!(glob_match("lib*-dev*", "libc6-dev:amd64"));
        assert!(!glob_match("lib*-dev*", "libc6:amd64"));
    }

    #[test]
    fn test_ignore_config() {
        let config = IgnoreConfig {
            packages: vec!["bash".to_string(), "linux-*".to_string()],
            vulnerabilities: vec!["CVE-2021-12345".to_string()],
        };

        assert!(config.should_ignore_package("bash"));
        assert!(config.should_ignore_package("linux-firmware"));
        assert!(!config.should_ignore_package("openssl"));
        assert!(config.should_ignore_vulnerability("CVE-2021-12345"));
        assert!(!config.should_ignore_vulnerability("CVE-2022-99999"));
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.default_format, "table");
        assert_eq!(config.report_dir, PathBuf::from("reports"));
        assert_eq!(config.lookup.api_url, DEFAULT_API_URL);
        assert_eq!(config.lookup.timeout_secs, 10);
        assert_eq!(config.lookup.pacing(), Duration::from_millis(250));
        assert_eq!(config.lookup.progress_every, 10);
        assert!(!config.lookup.log_fatal_details);
        assert_eq!(config.retry, RetryConfig::default());
        assert!(config.ignore.packages.is_empty());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [retry]
            max_attempts = 5

            [lookup]
            log_fatal_details = true
            "#,
        )
        .unwrap();

        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.rate_limit_cooldown_ms, 10_000);
        assert!(config.lookup.log_fatal_details);
        assert_eq!(config.lookup.timeout_secs, 10);
        assert_eq!(config.default_format, "table");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.retry.max_attempts = 7;
        config.notify.github_repo = Some("acme/infra".to_string());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.retry.max_attempts, 7);
        assert_eq!(loaded.notify.github_repo.as_deref(), Some("acme/infra"));
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.default_format, "table");
    }

    #[test]
    fn test_load_invalid_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "retry = 'not a table'").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_load_rejects_zero_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[retry]\nmax_attempts = 0\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("max_attempts must be at least 1"));
    }

    #[test]
    fn test_generate_default_config_parses() {
        let text = Config::generate_default_config();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.retry, RetryConfig::default());
        assert_eq!(parsed.lookup, LookupConfig::default());
    }
}
