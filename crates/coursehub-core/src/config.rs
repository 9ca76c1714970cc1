//! Configuration resolution for coursehub.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/coursehub/settings.json)
//! 3. Explicit config file (`--config`)
//! 4. Environment variables
//! 5. CLI arguments (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Complete coursehub configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub tokens: TokenConfig,
    #[serde(default)]
    pub enrollment: EnrollmentConfig,
    #[serde(default)]
    pub housekeeping: HousekeepingConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

/// Storage location.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

/// Token lifetimes and refresh behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TokenConfig {
    /// Access token TTL in seconds.
    pub access_ttl_secs: i64,
    /// Refresh token TTL in seconds.
    pub refresh_ttl_secs: i64,
    /// Revoke the presented refresh token and hand out a new one on refresh.
    pub rotate_refresh_tokens: bool,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_ttl_secs: 3600,
            refresh_ttl_secs: 7 * 24 * 60 * 60, // 7 days
            rotate_refresh_tokens: false,
        }
    }
}

/// Progress recomputation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EnrollmentConfig {
    /// Attempts at a progress write that finds the database locked before
    /// it gives up.
    pub max_progress_retries: u32,
}

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self {
            max_progress_retries: 8,
        }
    }
}

/// Background maintenance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HousekeepingConfig {
    /// Interval between revocation-list pruning passes (seconds).
    pub prune_interval_secs: u64,
}

impl Default for HousekeepingConfig {
    fn default() -> Self {
        Self {
            prune_interval_secs: 3600,
        }
    }
}

/// Outbound notification sink.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct NotificationConfig {
    /// When set, notifications are POSTed here as JSON. Otherwise they are
    /// only logged.
    pub webhook_url: Option<String>,
}

/// Load configuration with hierarchical resolution.
pub fn load_config(explicit_path: Option<&Path>) -> Result<Config> {
    // An explicit path must exist; a missing global file is fine.
    let global = global_config_path().filter(|p| p.exists());
    let mut config = load_layers(global.as_deref().into_iter().chain(explicit_path))?;

    apply_env_overrides(&mut config);

    Ok(config)
}

/// Apply config files over the defaults in order. Each file only overrides
/// the keys it sets.
fn load_layers<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Result<Config> {
    let mut layered = serde_json::to_value(Config::default())
        .map_err(|e| Error::Config(format!("Failed to encode default config: {e}")))?;
    for path in paths {
        merge_values(&mut layered, load_config_file(path)?);
    }
    serde_json::from_value(layered).map_err(|e| Error::Config(format!("Invalid config: {e}")))
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join("settings.json"))
}

/// Default location of the course database.
pub fn database_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join("coursehub.db"))
}

fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .ok()
            .map(|h| PathBuf::from(h).join(".coursehub"))
    }
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library/Application Support/coursehub"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
            .map(|p| p.join("coursehub"))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

/// Read a config file as raw JSON, rejecting anything that does not
/// describe a `Config`.
fn load_config_file(path: &Path) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    let value: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })?;
    serde_json::from_value::<Config>(value.clone()).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })?;
    Ok(value)
}

fn merge_values(base: &mut serde_json::Value, overlay: serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base), serde_json::Value::Object(overlay)) => {
            for (key, value) in overlay {
                merge_values(base.entry(key).or_insert(serde_json::Value::Null), value);
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn apply_env_overrides(config: &mut Config) {
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

fn apply_overrides_from(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(val) = lookup("COURSEHUB_DB_PATH") {
        config.database.path = Some(PathBuf::from(val));
    }
    if let Some(n) = lookup("COURSEHUB_ACCESS_TTL").and_then(|v| v.parse().ok()) {
        config.tokens.access_ttl_secs = n;
    }
    if let Some(n) = lookup("COURSEHUB_REFRESH_TTL").and_then(|v| v.parse().ok()) {
        config.tokens.refresh_ttl_secs = n;
    }
    if let Some(flag) = lookup("COURSEHUB_ROTATE_REFRESH_TOKENS").and_then(|v| v.parse().ok()) {
        config.tokens.rotate_refresh_tokens = flag;
    }
    if let Some(val) = lookup("COURSEHUB_WEBHOOK_URL") {
        config.notifications.webhook_url = Some(val);
    }
}

impl Config {
    /// Reject settings the services cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.tokens.access_ttl_secs <= 0 || self.tokens.refresh_ttl_secs <= 0 {
            return Err(Error::Config("token TTLs must be positive".into()));
        }
        if self.tokens.access_ttl_secs >= self.tokens.refresh_ttl_secs {
            return Err(Error::Config(
                "access token TTL must be shorter than refresh token TTL".into(),
            ));
        }
        if self.enrollment.max_progress_retries == 0 {
            return Err(Error::Config("max_progress_retries must be at least 1".into()));
        }
        if self.housekeeping.prune_interval_secs == 0 {
            return Err(Error::Config("prune_interval_secs must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.tokens.access_ttl_secs, 3600);
        assert_eq!(config.tokens.refresh_ttl_secs, 7 * 24 * 60 * 60);
        assert!(!config.tokens.rotate_refresh_tokens);
        config.validate().unwrap();
    }

    #[test]
    fn access_ttl_must_be_shorter_than_refresh_ttl() {
        let mut config = Config::default();
        config.tokens.access_ttl_secs = config.tokens.refresh_ttl_secs;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_file_keeps_section_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"tokens": {"access_ttl_secs": 600}}"#).unwrap();

        let config = load_layers([path.as_path()]).unwrap();
        assert_eq!(config.tokens.access_ttl_secs, 600);
        assert_eq!(config.tokens.refresh_ttl_secs, 7 * 24 * 60 * 60);
        assert_eq!(config.enrollment.max_progress_retries, 8);
    }

    #[test]
    fn later_file_only_overrides_keys_it_sets() {
        let dir = tempfile::tempdir().unwrap();
        let global = dir.path().join("settings.json");
        let explicit = dir.path().join("override.json");
        std::fs::write(
            &global,
            r#"{"tokens": {"access_ttl_secs": 600, "refresh_ttl_secs": 3000},
                "housekeeping": {"prune_interval_secs": 60}}"#,
        )
        .unwrap();
        std::fs::write(
            &explicit,
            r#"{"tokens": {"rotate_refresh_tokens": true}, "database": {"path": "/tmp/ch.db"}}"#,
        )
        .unwrap();

        let config = load_layers([global.as_path(), explicit.as_path()]).unwrap();
        assert_eq!(config.tokens.access_ttl_secs, 600);
        assert_eq!(config.tokens.refresh_ttl_secs, 3000);
        assert!(config.tokens.rotate_refresh_tokens);
        assert_eq!(config.housekeeping.prune_interval_secs, 60);
        assert_eq!(config.database.path, Some(PathBuf::from("/tmp/ch.db")));
        assert_eq!(config.enrollment.max_progress_retries, 8);
    }

    #[test]
    fn mistyped_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"tokens": {"access_ttl_secs": "soon"}}"#).unwrap();
        assert!(matches!(load_layers([path.as_path()]), Err(Error::Config(_))));
    }

    #[test]
    fn unreadable_file_is_config_error() {
        let err = load_config_file(Path::new("/nonexistent/settings.json")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn env_overrides_win_over_file() {
        let mut config = Config::default();
        let env: HashMap<&str, &str> = [
            ("COURSEHUB_ACCESS_TTL", "120"),
            ("COURSEHUB_ROTATE_REFRESH_TOKENS", "true"),
            ("COURSEHUB_DB_PATH", "/tmp/ch.db"),
        ]
        .into_iter()
        .collect();

        apply_overrides_from(&mut config, |k| env.get(k).map(ToString::to_string));

        assert_eq!(config.tokens.access_ttl_secs, 120);
        assert!(config.tokens.rotate_refresh_tokens);
        assert_eq!(config.database.path, Some(PathBuf::from("/tmp/ch.db")));
    }

    #[test]
    fn malformed_env_values_are_ignored() {
        let mut config = Config::default();
        apply_overrides_from(&mut config, |k| {
            (k == "COURSEHUB_REFRESH_TTL").then(|| "soon".to_string())
        });
        assert_eq!(config.tokens.refresh_ttl_secs, 7 * 24 * 60 * 60);
    }
}
