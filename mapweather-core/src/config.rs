use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::model::{Coordinate, FALLBACK_COORDINATE};

/// Environment variable that takes precedence over the stored API key.
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

/// Credentials and endpoint for OpenWeather.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenWeatherConfig {
    pub api_key: String,

    /// Override of the current-weather endpoint, mostly useful for testing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Photo picker presentation options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickerConfig {
    /// Maximum number of items the picker lets the user select. 0 means no limit.
    pub selection_limit: usize,
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self { selection_limit: 10 }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// [openweather]
/// api_key = "..."
///
/// [fallback]
/// latitude = 37.654218
/// longitude = 127.049952
///
/// [picker]
/// selection_limit = 10
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openweather: Option<OpenWeatherConfig>,

    /// Coordinate shown when the device location is unavailable.
    #[serde(default = "default_fallback")]
    pub fallback: Coordinate,

    #[serde(default)]
    pub picker: PickerConfig,
}

fn default_fallback() -> Coordinate {
    FALLBACK_COORDINATE
}

impl Default for Config {
    fn default() -> Self {
        Self { openweather: None, fallback: FALLBACK_COORDINATE, picker: PickerConfig::default() }
    }
}

impl Config {
    /// API key from the environment, or else from the config file.
    pub fn api_key(&self) -> Result<String> {
        self.resolve_api_key(std::env::var(API_KEY_ENV).ok())
    }

    fn resolve_api_key(&self, from_env: Option<String>) -> Result<String> {
        if let Some(key) = from_env.filter(|k| !k.trim().is_empty()) {
            return Ok(key);
        }

        self.openweather.as_ref().map(|ow| ow.api_key.clone()).ok_or_else(|| {
            anyhow!(
                "No OpenWeather API key configured.\n\
                 Hint: run `mapweather configure` or set {API_KEY_ENV}."
            )
        })
    }

    pub fn base_url(&self) -> Option<&str> {
        self.openweather.as_ref().and_then(|ow| ow.base_url.as_deref())
    }

    /// Set or replace the API key, keeping any configured base URL.
    pub fn set_api_key(&mut self, api_key: String) {
        match self.openweather.as_mut() {
            Some(ow) => ow.api_key = api_key,
            None => self.openweather = Some(OpenWeatherConfig { api_key, base_url: None }),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.openweather.is_some()
    }

    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        if !cfg.fallback.is_finite() {
            return Err(anyhow!(
                "Invalid fallback coordinate {} in {}",
                cfg.fallback,
                path.display()
            ));
        }

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "mapweather", "mapweather")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}
