//! TOML-based configuration persistence for the message listener.
//!
//! Reads and writes [`ListenerConfig`] to the platform-appropriate config file:
//! - Windows:  `%APPDATA%\WndMsgListener\config.toml`
//! - Linux:    `~/.config/wndmsglistener/config.toml`
//! - macOS:    `~/Library/Application Support/WndMsgListener/config.toml`
//!
//! ```toml
//! enabled_categories = ["DeviceChange", "PowerEvent"]
//!
//! [general]
//! log_level = "info"
//! verbose_messages = false
//!
//! [queue]
//! capacity = 1024
//! drop_policy = "oldest_first"
//!
//! [hooks]
//! foreign_hook_policy = "skip"
//!
//! [[rules]]
//! code = "WM_DEVICECHANGE"
//! category = "DeviceChange"
//! extract = "device_change"
//! ```
//!
//! Every section is optional.  A missing `rules` array means the built-in
//! rule table; a missing `enabled_categories` enables every category.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use wndmsg_core::pipeline::classify::default_rule_specs;
use wndmsg_core::{Category, Classifier, RuleError, RuleSpec};

use crate::infrastructure::hook::ForeignHookPolicy;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A rule does not resolve.
    #[error("invalid rule: {0}")]
    Rule(#[from] RuleError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level listener configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListenerConfig {
    /// Categories delivered to listeners.  `None` enables all; an empty list
    /// blocks all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled_categories: Option<Vec<String>>,
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub hooks: HooksConfig,
    /// Ordered classification rules; first match wins.
    #[serde(default = "default_rule_specs")]
    pub rules: Vec<RuleSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfig {
    /// `tracing` level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Trace every intercepted message with its catalog name.
    #[serde(default)]
    pub verbose_messages: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueConfig {
    /// Maximum number of undelivered events.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default)]
    pub drop_policy: DropPolicy,
}

/// Which events a full queue sacrifices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropPolicy {
    #[default]
    OldestFirst,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HooksConfig {
    #[serde(default)]
    pub foreign_hook_policy: ForeignHookPolicy,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_capacity() -> usize {
    1024
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            enabled_categories: None,
            general: GeneralConfig::default(),
            queue: QueueConfig::default(),
            hooks: HooksConfig::default(),
            rules: default_rule_specs(),
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            verbose_messages: false,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            drop_policy: DropPolicy::default(),
        }
    }
}

impl ListenerConfig {
    /// Checks the values serde cannot check.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] for a zero queue capacity and
    /// [`ConfigError::Rule`] for a rule that does not resolve.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.capacity == 0 {
            return Err(ConfigError::Invalid("queue.capacity must be at least 1".to_string()));
        }
        for rule in &self.rules {
            rule.to_rule()?;
        }
        Ok(())
    }

    /// Builds the classifier from `rules`.
    pub fn classifier(&self) -> Result<Classifier, RuleError> {
        Classifier::from_specs(&self.rules)
    }

    pub fn enabled_category_set(&self) -> Option<HashSet<Category>> {
        self.enabled_categories
            .as_ref()
            .map(|names| names.iter().map(|name| Category::new(name.trim())).collect())
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads and validates the config from the platform directory, returning
/// defaults if the file does not exist yet.
pub fn load_config() -> Result<ListenerConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads and validates the config at `path`, returning defaults if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// [`ConfigError::Parse`] if the TOML is malformed, and the errors of
/// [`ListenerConfig::validate`].
pub fn load_config_from(path: &Path) -> Result<ListenerConfig, ConfigError> {
    let config = match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str::<ListenerConfig>(&content)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => ListenerConfig::default(),
        Err(e) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };
    config.validate()?;
    Ok(config)
}

/// Persists `config` to the platform directory.
pub fn save_config(config: &ListenerConfig) -> Result<(), ConfigError> {
    save_config_to(config, &config_file_path()?)
}

/// Persists `config` to `path`, creating parent directories as needed.
pub fn save_config_to(config: &ListenerConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolves the platform config directory including the application folder.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("WndMsgListener"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("wndmsglistener"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("WndMsgListener")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("wndmsg_test_{}", Uuid::new_v4()))
    }

    #[test]
    fn test_default_config_values() {
        // Arrange / Act
        let cfg = ListenerConfig::default();

        // Assert
        assert_eq!(cfg.queue.capacity, 1024);
        assert_eq!(cfg.queue.drop_policy, DropPolicy::OldestFirst);
        assert_eq!(cfg.hooks.foreign_hook_policy, ForeignHookPolicy::Skip);
        assert_eq!(cfg.general.log_level, "info");
        assert!(!cfg.general.verbose_messages);
        assert!(cfg.enabled_categories.is_none());
        assert_eq!(cfg.rules, default_rule_specs());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: ListenerConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, ListenerConfig::default());
    }

    #[test]
    fn test_full_toml_is_parsed() {
        // Arrange
        let toml_str = r#"
enabled_categories = ["DeviceChange", " PowerEvent "]

[general]
log_level = "debug"
verbose_messages = true

[queue]
capacity = 2
drop_policy = "oldest_first"

[hooks]
foreign_hook_policy = "adopt"

[[rules]]
code = "WM_DEVICECHANGE"
category = "DeviceChange"
extract = "device_change"

[[rules]]
code = 0x8000
code_end = 0xC000
category = "AppPrivate"

[[rules]]
code = "WM_POWERBROADCAST"
wparam = 4
category = "Suspend"
extract = "power"
"#;

        // Act
        let cfg: ListenerConfig = toml::from_str(toml_str).expect("deserialize");

        // Assert
        assert_eq!(cfg.general.log_level, "debug");
        assert!(cfg.general.verbose_messages);
        assert_eq!(cfg.queue.capacity, 2);
        assert_eq!(cfg.hooks.foreign_hook_policy, ForeignHookPolicy::Adopt);
        assert_eq!(cfg.rules.len(), 3);
        assert_eq!(cfg.rules[1].extract, "raw");
        let enabled = cfg.enabled_category_set().expect("allow-list");
        assert!(enabled.contains(Category::POWER_EVENT));
        assert_eq!(enabled.len(), 2);
        let classifier = cfg.classifier().expect("rules resolve");
        assert_eq!(classifier.len(), 3);
    }

    #[test]
    fn test_unknown_drop_policy_is_rejected() {
        let toml_str = "[queue]\ndrop_policy = \"newest_first\"\n";
        assert!(toml::from_str::<ListenerConfig>(toml_str).is_err());
    }

    #[test]
    fn test_zero_capacity_fails_validation() {
        // Arrange
        let mut cfg = ListenerConfig::default();
        cfg.queue.capacity = 0;

        // Act
        let result = cfg.validate();

        // Assert
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unknown_message_name_fails_validation() {
        // Arrange
        let mut cfg = ListenerConfig::default();
        cfg.rules.push(RuleSpec::new("WM_NOT_A_MESSAGE", "Bogus", "raw"));

        // Act
        let result = cfg.validate();

        // Assert
        assert!(matches!(
            result,
            Err(ConfigError::Rule(RuleError::UnknownMessageName(_)))
        ));
    }

    #[test]
    fn test_range_rule_with_wparam_fails_validation() {
        // Arrange
        let cfg: ListenerConfig = toml::from_str(
            r#"
            [[rules]]
            code = "WM_USER"
            code_end = 0x0410
            wparam = 1
            category = "UserRange"
            "#,
        )
        .expect("parse");

        // Act
        let result = cfg.validate();

        // Assert
        assert!(matches!(
            result,
            Err(ConfigError::Rule(RuleError::WParamWithRange { wparam: 1, .. }))
        ));
    }

    #[test]
    fn test_empty_allow_list_survives_round_trip() {
        // Arrange
        let mut cfg = ListenerConfig::default();
        cfg.enabled_categories = Some(Vec::new());

        // Act
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let restored: ListenerConfig = toml::from_str(&toml_str).expect("deserialize");

        // Assert
        assert_eq!(restored.enabled_category_set(), Some(HashSet::new()));
    }

    #[test]
    fn test_load_config_from_missing_file_returns_default() {
        // Arrange
        let path = temp_dir().join("config.toml");

        // Act
        let cfg = load_config_from(&path).expect("missing file is not an error");

        // Assert
        assert_eq!(cfg, ListenerConfig::default());
    }

    #[test]
    fn test_save_and_load_round_trip_via_temp_dir() {
        // Arrange
        let dir = temp_dir();
        let path = dir.join("nested").join("config.toml");
        let mut cfg = ListenerConfig::default();
        cfg.queue.capacity = 64;
        cfg.general.verbose_messages = true;
        cfg.enabled_categories = Some(vec![Category::FOCUS.to_string()]);

        // Act
        save_config_to(&cfg, &path).expect("save");
        let loaded = load_config_from(&path).expect("load");

        // Assert
        assert_eq!(loaded, cfg);

        // Cleanup
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_config_from_rejects_invalid_file() {
        // Arrange
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).expect("mkdir");
        let path = dir.join("config.toml");
        std::fs::write(&path, "[queue]\ncapacity = 0\n").expect("write");

        // Act
        let result = load_config_from(&path);

        // Assert
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        // Cleanup
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_malformed_toml_returns_parse_error() {
        // Arrange
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).expect("mkdir");
        let path = dir.join("config.toml");
        std::fs::write(&path, "[[[ not valid toml").expect("write");

        // Act
        let result = load_config_from(&path);

        // Assert
        assert!(matches!(result, Err(ConfigError::Parse(_))));

        // Cleanup
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_config_file_path_ends_with_config_toml() {
        if let Ok(path) = config_file_path() {
            assert!(path.ends_with("config.toml"), "got {path:?}");
        }
        // NoPlatformConfigDir is acceptable in a stripped environment.
    }
}
