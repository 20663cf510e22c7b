//! Configuration management for parlo.
//!
//! This module provides core configuration that doesn't depend on
//! platform-specific UI libraries.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::APP_NAME;

/// Core configuration structure for the application.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// API key for the translation endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Language spoken/typed by the user (ISO 639-1 code)
    #[serde(
        default = "default_source_language",
        skip_serializing_if = "is_default_source_language"
    )]
    pub source_language: String,

    /// Language translations are produced in (ISO 639-1 code)
    #[serde(
        default = "default_target_language",
        skip_serializing_if = "is_default_target_language"
    )]
    pub target_language: String,

    /// Model to use for translations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Number of extra attempts for rate-limited translation requests
    #[serde(
        default = "default_retries",
        skip_serializing_if = "is_default_retries"
    )]
    pub retries: u8,
}

fn default_source_language() -> String {
    "en".to_owned()
}

fn is_default_source_language(v: &str) -> bool {
    v == "en"
}

fn default_target_language() -> String {
    "es".to_owned()
}

fn is_default_target_language(v: &str) -> bool {
    v == "es"
}

fn default_retries() -> u8 {
    2
}

fn is_default_retries(v: &u8) -> bool {
    *v == 2
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            source_language: default_source_language(),
            target_language: default_target_language(),
            model: None,
            retries: default_retries(),
        }
    }
}

impl Config {
    /// Get the translation API key
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /// Get the model name
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }
}

/// Manages loading and saving configuration files.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Creates a new ConfigManager with the default configuration directory.
    pub fn new() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Ok(Self { config_path })
    }

    /// Creates a new ConfigManager with a specified configuration directory.
    #[cfg(test)]
    pub fn with_config_dir<P: AsRef<std::path::Path>>(dir: P) -> Self {
        let config_path = dir.as_ref().join(format!("{}.toml", APP_NAME));
        Self { config_path }
    }

    /// Returns the default path to the configuration file.
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to retrieve configuration directory")?;
        Ok(config_dir.join(APP_NAME).join(format!("{}.toml", APP_NAME)))
    }

    /// Loads the configuration from the config file or returns default.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let config_content = fs::read_to_string(&self.config_path)
            .with_context(|| format!("Failed to read config file at {:?}", self.config_path))?;

        let config: Config = toml::from_str(&config_content)
            .with_context(|| format!("Failed to parse config file at {:?}", self.config_path))?;

        if config.api_key().is_none() {
            warn!(
                "Translation API key is not set. Translations will not work without it. \
                 Edit the config file to set the key."
            );
        }

        Ok(config)
    }

    /// Saves the configuration to the config file.
    pub fn save(&self, config: &Config) -> Result<()> {
        let config_dir = self
            .config_path
            .parent()
            .with_context(|| format!("Failed to get parent directory of {:?}", self.config_path))?;

        fs::create_dir_all(config_dir)
            .with_context(|| format!("Failed to create config directory at {:?}", config_dir))?;

        let serialized =
            toml::to_string_pretty(&config).context("Failed to serialize configuration")?;

        fs::write(&self.config_path, serialized)
            .with_context(|| format!("Failed to write config file at {:?}", self.config_path))?;

        Ok(())
    }

    /// Returns the path to the configuration file.
    pub fn config_path(&self) -> &std::path::Path {
        &self.config_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.api_key.is_none());
        assert_eq!(config.source_language, "en");
        assert_eq!(config.target_language, "es");
        assert_eq!(config.retries, 2);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config {
            api_key: Some("test-key".to_string()),
            target_language: "fr".to_string(),
            ..Default::default()
        };

        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();

        assert_eq!(config.api_key, deserialized.api_key);
        assert_eq!(config.target_language, deserialized.target_language);
    }

    #[test]
    fn test_config_manager_save_load() {
        let temp_dir = tempfile::tempdir().unwrap();

        let manager = ConfigManager::with_config_dir(temp_dir.path());

        let config = Config {
            api_key: Some("test-key".to_string()),
            ..Default::default()
        };

        manager.save(&config).unwrap();
        let loaded = manager.load().unwrap();

        assert_eq!(config.api_key, loaded.api_key);
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let temp_dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::with_config_dir(temp_dir.path());
        let loaded = manager.load().unwrap();
        assert!(loaded.api_key.is_none());
        assert_eq!(loaded.retries, 2);
    }
}
