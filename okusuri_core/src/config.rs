//! Configuration file support for Okusuri.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/okusuri/config.toml`.

use crate::dedup::{DEFAULT_DEDUP_WINDOW_MINUTES, DEFAULT_RETENTION_MINUTES};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding the VAPID public key
pub const VAPID_PUBLIC_KEY_ENV: &str = "VAPID_PUBLIC_KEY";

/// Environment variable holding the VAPID private key
pub const VAPID_PRIVATE_KEY_ENV: &str = "VAPID_PRIVATE_KEY";

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub profile: ProfileConfig,

    #[serde(default)]
    pub notification: NotificationConfig,

    #[serde(default)]
    pub push: PushConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// The user the CLI acts for
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(default = "default_user_id")]
    pub user_id: String,

    #[serde(default)]
    pub display_name: Option<String>,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            display_name: None,
        }
    }
}

/// Reminder content and duplicate suppression
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default = "default_dedup_window_minutes")]
    pub dedup_window_minutes: i64,

    #[serde(default = "default_retention_minutes")]
    pub retention_minutes: i64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            dedup_window_minutes: default_dedup_window_minutes(),
            retention_minutes: default_retention_minutes(),
        }
    }
}

/// Web Push delivery parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PushConfig {
    #[serde(default)]
    pub vapid_public_key: Option<String>,

    #[serde(default)]
    pub vapid_private_key: Option<String>,

    #[serde(default = "default_subject")]
    pub subject: String,

    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u32,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            vapid_public_key: None,
            vapid_private_key: None,
            subject: default_subject(),
            ttl_seconds: default_ttl_seconds(),
        }
    }
}

/// A complete VAPID key pair
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VapidCredentials {
    pub public_key: String,
    pub private_key: String,
}

impl PushConfig {
    /// Resolve the VAPID key pair from config, falling back to the environment
    ///
    /// Returns `None` unless both keys are present and non-empty.
    pub fn credentials(&self) -> Option<VapidCredentials> {
        self.credentials_with(|name| std::env::var(name).ok())
    }

    /// Resolve credentials using `lookup` in place of the process environment
    pub fn credentials_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Option<VapidCredentials> {
        let public_key = non_empty(self.vapid_public_key.clone())
            .or_else(|| non_empty(lookup(VAPID_PUBLIC_KEY_ENV)))?;
        let private_key = non_empty(self.vapid_private_key.clone())
            .or_else(|| non_empty(lookup(VAPID_PRIVATE_KEY_ENV)))?;

        Some(VapidCredentials {
            public_key,
            private_key,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// Default value functions
fn home_dir_or_current() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_data_dir() -> PathBuf {
    let base =
        dirs::data_local_dir().unwrap_or_else(|| home_dir_or_current().join(".local/share"));
    base.join("okusuri")
}

fn default_user_id() -> String {
    "local".into()
}

fn default_title() -> String {
    "Medication reminder".into()
}

fn default_dedup_window_minutes() -> i64 {
    DEFAULT_DEDUP_WINDOW_MINUTES
}

fn default_retention_minutes() -> i64 {
    DEFAULT_RETENTION_MINUTES
}

fn default_subject() -> String {
    "mailto:admin@example.com".into()
}

fn default_ttl_seconds() -> u32 {
    30
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Reject values the dispatcher cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.profile.user_id.trim().is_empty() {
            return Err(Error::Config("profile.user_id must not be empty".into()));
        }
        if self.notification.dedup_window_minutes < 0 {
            return Err(Error::Config(
                "notification.dedup_window_minutes must not be negative".into(),
            ));
        }
        if self.notification.retention_minutes < self.notification.dedup_window_minutes {
            return Err(Error::Config(
                "notification.retention_minutes must be at least the dedup window".into(),
            ));
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| home_dir_or_current().join(".config"));
        base.join("okusuri").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
