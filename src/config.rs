//! Configuration loading and persistence.
//!
//! Reads `config.json` from the config directory and layers
//! `DIRECTORY_PUSH_*` environment overrides on top.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;
use std::{fs, path::PathBuf};

use crate::adapter::Platform;
use crate::constants::{
    BOOTSTRAP_TOKEN_WAIT, DEFAULT_NOTIFICATION_ICON, DEFAULT_PRESENTATION_OPTIONS,
};

/// Which adapter variant to build.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlatformChoice {
    /// Decide from the environment at startup.
    #[default]
    Auto,
    /// Native mobile push through the web-to-native bridge.
    Native,
    /// Browser push through the messaging channel.
    Web,
}

impl PlatformChoice {
    /// Parse `auto` / `native` / `web`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "native" | "ios" | "android" => Some(Self::Native),
            "web" | "browser" => Some(Self::Web),
            _ => None,
        }
    }

    /// Resolve to a concrete platform.
    ///
    /// `Auto` follows `DIRECTORY_PUSH_PLATFORM` when it names a platform and
    /// falls back to web.
    pub fn resolve(self) -> Platform {
        match self {
            Self::Native => Platform::Native,
            Self::Web => Platform::Web,
            Self::Auto => match std::env::var("DIRECTORY_PUSH_PLATFORM")
                .ok()
                .and_then(|v| Self::parse(&v))
            {
                Some(Self::Native) => Platform::Native,
                _ => Platform::Web,
            },
        }
    }
}

/// Firestore database coordinates.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FirestoreConfig {
    /// Google Cloud project id.
    pub project_id: String,
    /// Database id.
    #[serde(default = "default_database")]
    pub database: String,
}

fn default_database() -> String {
    "(default)".to_string()
}

/// Configuration for the push subsystem.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Config {
    /// Adapter variant.
    pub platform: PlatformChoice,
    /// How long the bootstrapper waits for a registration token.
    pub token_wait_timeout_ms: u64,
    /// VAPID key used to request a browser push token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_vapid_key: Option<String>,
    /// Icon shown on browser notifications.
    pub notification_icon: String,
    /// How native notifications present while the app is in the foreground.
    pub presentation_options: Vec<String>,
    /// Hosted document store, when persistence goes to Firestore.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firestore: Option<FirestoreConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            platform: PlatformChoice::Auto,
            token_wait_timeout_ms: u64::try_from(BOOTSTRAP_TOKEN_WAIT.as_millis())
                .unwrap_or(15_000),
            web_vapid_key: None,
            notification_icon: DEFAULT_NOTIFICATION_ICON.to_string(),
            presentation_options: DEFAULT_PRESENTATION_OPTIONS
                .iter()
                .map(|o| o.to_string())
                .collect(),
            firestore: None,
        }
    }
}

impl Config {
    /// Returns the configuration directory path, creating it if necessary.
    ///
    /// `DIRECTORY_PUSH_CONFIG_DIR` overrides the platform config directory.
    pub fn config_dir() -> Result<PathBuf> {
        let dir = if let Ok(dir) = std::env::var("DIRECTORY_PUSH_CONFIG_DIR") {
            PathBuf::from(dir)
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("directory-push")
        };
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Loads configuration from file, with environment variable overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file().unwrap_or_else(|e| {
            log::debug!("Using default config: {e:#}");
            Self::default()
        });
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_from_file() -> Result<Self> {
        let config_path = Self::config_dir()?.join("config.json");
        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            anyhow::bail!("Config file not found")
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(platform) = std::env::var("DIRECTORY_PUSH_PLATFORM") {
            match PlatformChoice::parse(&platform) {
                Some(choice) => self.platform = choice,
                None => log::warn!("Ignoring unknown DIRECTORY_PUSH_PLATFORM={platform}"),
            }
        }

        if let Ok(timeout) = std::env::var("DIRECTORY_PUSH_TOKEN_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse::<u64>() {
                self.token_wait_timeout_ms = ms;
            }
        }

        if let Ok(key) = std::env::var("DIRECTORY_PUSH_VAPID_KEY") {
            self.web_vapid_key = Some(key);
        }

        if let Ok(project_id) = std::env::var("DIRECTORY_PUSH_FIRESTORE_PROJECT") {
            self.firestore = Some(FirestoreConfig {
                project_id,
                database: default_database(),
            });
        }
    }

    /// Persists the current configuration to disk.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_dir()?.join("config.json");
        fs::write(&config_path, serde_json::to_string_pretty(self)?)?;

        // Owner read/write only
        #[cfg(unix)]
        fs::set_permissions(&config_path, fs::Permissions::from_mode(0o600))?;

        Ok(())
    }

    /// Token wait budget as a `Duration`.
    pub fn token_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.token_wait_timeout_ms)
    }
}
