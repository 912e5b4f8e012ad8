use std::fs;
use std::path::Path;

use chrono::{FixedOffset, Local, Offset};
use serde::{Deserialize, Serialize};

use crate::network::TransportConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/chat.json";

pub const ENV_API_URL: &str = "HOTEL_CHAT_API_URL";
pub const ENV_SOCKET_URL: &str = "HOTEL_CHAT_SOCKET_URL";
pub const ENV_TOKEN: &str = "HOTEL_CHAT_TOKEN";
pub const ENV_USER_ID: &str = "HOTEL_CHAT_USER_ID";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the hotel backend REST API.
    pub api_base_url: String,
    /// Realtime server; defaults to the API host.
    pub socket_url: Option<String>,
    pub token: Option<String>,
    pub user_id: Option<String>,
    /// Offset used to split conversations into days; local zone when unset.
    pub utc_offset_minutes: Option<i32>,
    pub recorder_command: Vec<String>,
    pub channel_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000".to_string(),
            socket_url: None,
            token: None,
            user_id: None,
            utc_offset_minutes: None,
            recorder_command: ["arecord", "-q", "-f", "cd", "-t", "wav"]
                .iter()
                .map(|part| part.to_string())
                .collect(),
            channel_capacity: 100,
        }
    }
}

impl AppConfig {
    /// Override fields from `HOTEL_CHAT_*` variables provided by `lookup`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(url) = lookup(ENV_API_URL) {
            self.api_base_url = url;
        }
        if let Some(url) = lookup(ENV_SOCKET_URL) {
            self.socket_url = Some(url);
        }
        if let Some(token) = lookup(ENV_TOKEN) {
            self.token = Some(token);
        }
        if let Some(user_id) = lookup(ENV_USER_ID) {
            self.user_id = Some(user_id);
        }
        self
    }

    pub fn socket_url(&self) -> &str {
        self.socket_url.as_deref().unwrap_or(&self.api_base_url)
    }

    pub fn zone(&self) -> FixedOffset {
        self.utc_offset_minutes
            .and_then(|minutes| FixedOffset::east_opt(minutes * 60))
            .unwrap_or_else(|| Local::now().offset().fix())
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            socket_url: self.socket_url().to_string(),
            token: self.token.clone(),
            buffer: self.channel_capacity,
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

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn scratch_path(name: &str) -> String {
        std::env::temp_dir()
            .join(format!("hotel-chat-{}", uuid::Uuid::new_v4()))
            .join(name)
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn missing_or_broken_file_falls_back_to_defaults() {
        assert_eq!(load_config(&scratch_path("absent.json")), AppConfig::default());

        let path = scratch_path("broken.json");
        save_config(&path, &AppConfig::default()).unwrap();
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_config(&path), AppConfig::default());
    }

    #[test]
    fn saved_config_loads_back_with_partial_fields_defaulted() {
        let path = scratch_path("chat.json");
        fs::create_dir_all(Path::new(&path).parent().unwrap()).unwrap();
        fs::write(
            &path,
            r#"{"api_base_url": "https://hotel.example.com", "user_id": "u7", "utc_offset_minutes": 420}"#,
        )
        .unwrap();

        let config = load_config(&path);
        assert_eq!(config.api_base_url, "https://hotel.example.com");
        assert_eq!(config.user_id.as_deref(), Some("u7"));
        assert_eq!(config.channel_capacity, 100);
        assert_eq!(config.socket_url(), "https://hotel.example.com");
        assert_eq!(config.zone(), FixedOffset::east_opt(7 * 3600).unwrap());

        save_config(&path, &config).unwrap();
        assert_eq!(load_config(&path), config);
    }

    #[test]
    fn environment_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_API_URL, "http://10.0.0.2:5000"),
            (ENV_TOKEN, "secret"),
            (ENV_USER_ID, "  "),
        ]);
        let config = AppConfig {
            user_id: Some("from-file".into()),
            ..AppConfig::default()
        }
        .with_overrides(|key| env.get(key).map(|value| value.to_string()));

        assert_eq!(config.api_base_url, "http://10.0.0.2:5000");
        assert_eq!(config.token.as_deref(), Some("secret"));
        assert_eq!(config.user_id.as_deref(), Some("from-file"));

        let transport = config.transport();
        assert_eq!(transport.socket_url, "http://10.0.0.2:5000");
        assert_eq!(transport.buffer, 100);
    }
}
