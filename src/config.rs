// SPDX-License-Identifier: MPL-2.0

//! User configuration.
//!
//! Read from `~/.config/weather-dashboard/config.json`. Every field has a
//! default, so a missing or partial file is fine. A file that cannot be
//! parsed is logged and ignored.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::widget::storage::{default_data_dir, DEFAULT_STORAGE_KEY};

/// Environment variable that overrides `api_key`.
pub const API_KEY_ENV: &str = "WEATHER_API_KEY";

const DEFAULT_API_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// OpenWeatherMap API key
    pub api_key: String,
    /// Current weather endpoint
    pub api_url: String,
    /// Language for condition descriptions
    pub language: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Key the dashboard state is saved under
    pub storage_key: String,
    /// Where saved state lives; the platform data directory when unset
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: DEFAULT_API_URL.to_string(),
            language: String::from("en"),
            request_timeout_secs: 10,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            data_dir: None,
        }
    }
}

impl Config {
    /// Default location of the config file.
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
        path.push("weather-dashboard");
        path.push("config.json");
        path
    }

    /// Load from `path`, falling back to defaults, then apply environment
    /// overrides.
    pub fn load(path: &Path) -> Self {
        let mut config = Self::from_file(path);
        config.apply_env(std::env::var(API_KEY_ENV).ok());
        config
    }

    fn from_file(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => {
                log::debug!("No config at {:?}, using defaults", path);
                return Self::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(config) => {
                log::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                log::warn!("Ignoring unreadable config {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    fn apply_env(&mut self, api_key: Option<String>) {
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            self.api_key = key.trim().to_string();
        }
    }

    /// Directory for saved state.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_file(&dir.path().join("config.json"));
        assert_eq!(config, Config::default());
        assert_eq!(config.storage_key, "weatherDashboard");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"api_key": "abc", "request_timeout_secs": 3}"#).unwrap();

        let config = Config::from_file(&path);
        assert_eq!(config.api_key, "abc");
        assert_eq!(config.request_timeout_secs, 3);
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_unparsable_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "api_key = abc").unwrap();

        assert_eq!(Config::from_file(&path), Config::default());
    }

    #[test]
    fn test_env_key_overrides_file() {
        let mut config = Config {
            api_key: "from-file".into(),
            ..Config::default()
        };
        config.apply_env(Some("  from-env ".into()));
        assert_eq!(config.api_key, "from-env");

        config.apply_env(Some("   ".into()));
        assert_eq!(config.api_key, "from-env");
    }

    #[test]
    fn test_data_dir_override() {
        let config = Config {
            data_dir: Some(PathBuf::from("/srv/dash")),
            ..Config::default()
        };
        assert_eq!(config.data_dir(), PathBuf::from("/srv/dash"));
    }
}
