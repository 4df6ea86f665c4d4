//! Configuration file support for Luna.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/luna/config.toml`.

use crate::physio::SymptomScope;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub physio: PhysioConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Versioned storage key; the log lives at `<data_dir>/<log_key>.json`
    #[serde(default = "default_log_key")]
    pub log_key: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_key: default_log_key(),
        }
    }
}

impl DataConfig {
    /// Path of the event log inside `data_dir`
    pub fn log_path_in(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(format!("{}.json", self.log_key))
    }
}

/// Rule engine input configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PhysioConfig {
    /// Age used when the caller supplies none
    #[serde(default = "default_age")]
    pub default_age: u32,

    /// Compute age from the profile birth date when it parses
    #[serde(default)]
    pub derive_age_from_profile: bool,

    #[serde(default)]
    pub symptom_scope: SymptomScope,
}

impl Default for PhysioConfig {
    fn default() -> Self {
        Self {
            default_age: default_age(),
            derive_age_from_profile: false,
            symptom_scope: SymptomScope::default(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".local/share"))
            .unwrap_or_else(|| PathBuf::from("."))
    });
    base.join("luna")
}

fn default_log_key() -> String {
    "health_events_v3".into()
}

fn default_age() -> u32 {
    32
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

    /// Reject values the store cannot use
    pub fn validate(&self) -> Result<()> {
        let key = &self.data.log_key;
        if key.is_empty() || key.contains(['/', '\\']) {
            return Err(Error::Config(format!(
                "log_key '{}' must be a plain file name",
                key
            )));
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .unwrap_or_else(|| PathBuf::from("."))
        });
        base.join("luna").join("config.toml")
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
