//! Zefest Configuration Module
//! Handles loading and validating zefest.config.json

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "zefest.config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Invalid config format: {0}")]
    ParseError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub update: UpdateConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    #[serde(default = "default_manifest_url")]
    pub manifest_url: String,
    /// Version assumed when no installed marker has been recorded yet
    #[serde(default = "default_bundled_version")]
    pub bundled_version: String,
    #[serde(default = "default_method_timeout")]
    pub method_timeout_secs: u64,
    #[serde(default = "default_package_file_name")]
    pub package_file_name: String,
    #[serde(default = "default_share_title")]
    pub share_title: String,
    #[serde(default = "default_share_text")]
    pub share_text: String,
    #[serde(default = "default_share_dialog_title")]
    pub share_dialog_title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationConfig {
    #[serde(default = "default_dashboard_route")]
    pub dashboard_route: String,
    #[serde(default = "default_login_route")]
    pub login_route: String,
    #[serde(default = "default_root_route")]
    pub root_route: String,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_base_url() -> String {
    "https://api.turaincash.com".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_manifest_url() -> String {
    "https://zefast-mobile-app.vercel.app/releases/manifest.json".to_string()
}

fn default_bundled_version() -> String {
    "1.0.0".to_string()
}

fn default_method_timeout() -> u64 {
    30
}

fn default_package_file_name() -> String {
    "app-update.apk".to_string()
}

fn default_share_title() -> String {
    "Télécharger la mise à jour".to_string()
}

fn default_share_text() -> String {
    "Télécharger la nouvelle version de l'application".to_string()
}

fn default_share_dialog_title() -> String {
    "Télécharger APK".to_string()
}

fn default_dashboard_route() -> String {
    "/dashboard".to_string()
}

fn default_login_route() -> String {
    "/login".to_string()
}

fn default_root_route() -> String {
    "/".to_string()
}

fn default_debounce_ms() -> u64 {
    300
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            manifest_url: default_manifest_url(),
            bundled_version: default_bundled_version(),
            method_timeout_secs: default_method_timeout(),
            package_file_name: default_package_file_name(),
            share_title: default_share_title(),
            share_text: default_share_text(),
            share_dialog_title: default_share_dialog_title(),
        }
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            dashboard_route: default_dashboard_route(),
            login_route: default_login_route(),
            root_route: default_root_route(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl UpdateConfig {
    pub fn method_timeout(&self) -> Duration {
        Duration::from_secs(self.method_timeout_secs)
    }
}

impl NavigationConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl ClientConfig {
    /// Load `zefest.config.json` from a directory
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        Self::load_file(&config_dir.join(CONFIG_FILE_NAME))
    }

    pub fn load_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::NotFound(config_path.to_path_buf()));
        }
        let content = std::fs::read_to_string(config_path)?;
        let config: ClientConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load the config file if present, otherwise fall back to defaults
    pub fn load_or_default(config_path: &Path) -> Result<Self, ConfigError> {
        match Self::load_file(config_path) {
            Err(ConfigError::NotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }

    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }
}
