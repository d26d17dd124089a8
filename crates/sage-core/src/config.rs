use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::category::Category;
use crate::conversation::RevealTiming;
use crate::error::{SageError, SageResult};

pub const API_URL_ENV: &str = "SAGE_API_URL";
pub const API_KEY_ENV: &str = "SAGE_API_KEY";

const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub default_category: Option<String>,
    pub char_delay_ms: Option<u64>,
    pub stream_window_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

/// Everything the completion client needs to reach the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> SageResult<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> SageResult<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> SageResult<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> SageResult<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn save_default_category(category: Category) -> SageResult<()> {
        let mut config = Self::load().unwrap_or_else(|_| Self::new());
        config.default_category = Some(category.as_str().to_string());
        config.save()
    }

    pub fn category(&self) -> Category {
        self.default_category
            .as_deref()
            .and_then(Category::from_str)
            .unwrap_or_default()
    }

    pub fn reveal_timing(&self) -> RevealTiming {
        let defaults = RevealTiming::default();
        RevealTiming {
            char_delay: self
                .char_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.char_delay),
            window: self
                .stream_window_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.window),
        }
    }

    /// Resolve URL and key, environment first, then the config file
    pub fn api_settings(&self) -> SageResult<ApiSettings> {
        self.api_settings_with(|name| std::env::var(name).ok())
    }

    pub fn api_settings_with<F>(&self, env: F) -> SageResult<ApiSettings>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = env(API_URL_ENV)
            .or_else(|| self.api_url.clone())
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| SageError::Config(format!("API URL is not defined (set {})", API_URL_ENV)))?;

        let api_key = env(API_KEY_ENV)
            .or_else(|| self.api_key.clone())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| SageError::Config(format!("API key is not defined (set {})", API_KEY_ENV)))?;

        Ok(ApiSettings {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout: Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        })
    }

    pub fn get_config_path() -> SageResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| SageError::Config("Could not determine config directory".to_string()))?;

        Ok(config_dir.join("sage").join("config.json"))
    }
}
