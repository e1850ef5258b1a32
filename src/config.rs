use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::SyncSettings;

pub const DEFAULT_CONFIG_PATH: &str = "config/client.json";

pub const BACKEND_URL_ENV: &str = "WAVENET_BACKEND_URL";
pub const CHANNEL_URL_ENV: &str = "WAVENET_CHANNEL_URL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend_url: String,
    pub channel_url: String,
    pub typing_timeout_ms: u64,
    pub search_debounce_ms: u64,
    /// `null` disables the client-side expiry of the remote typing flag.
    pub remote_typing_expiry_ms: Option<u64>,
    pub reorder_on_activity: bool,
    pub reconnect_delay_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:5000".to_string(),
            channel_url: "ws://localhost:5000/ws".to_string(),
            typing_timeout_ms: 2000,
            search_debounce_ms: 500,
            remote_typing_expiry_ms: Some(5000),
            reorder_on_activity: false,
            reconnect_delay_ms: 1000,
        }
    }
}

impl AppConfig {
    pub fn to_settings(&self) -> SyncSettings {
        SyncSettings {
            typing_idle: Duration::from_millis(self.typing_timeout_ms),
            remote_typing_expiry: self.remote_typing_expiry_ms.map(Duration::from_millis),
            search_debounce: Duration::from_millis(self.search_debounce_ms),
            reorder_on_activity: self.reorder_on_activity,
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Endpoint URLs from the environment win over the file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = env::var(BACKEND_URL_ENV) {
            log::info!("Using backend URL from {BACKEND_URL_ENV}");
            self.backend_url = url;
        }
        if let Ok(url) = env::var(CHANNEL_URL_ENV) {
            log::info!("Using channel URL from {CHANNEL_URL_ENV}");
            self.channel_url = url;
        }
    }
}

pub fn load_config(path: &str) -> AppConfig {
    let path = Path::new(path);
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Failed to parse config file {}: {err}", path.display());
                AppConfig::default()
            }
        },
        Err(err) => {
            log::info!(
                "Config file {} not found ({err}); using defaults",
                path.display()
            );
            AppConfig::default()
        }
    }
}

pub fn save_config(path: &str, config: &AppConfig) -> std::io::Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json)
}
