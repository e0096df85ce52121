//! Configuration management

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::application::errors::ConfigError;

/// Client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub client: ClientConfig,
    pub endpoints: EndpointsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClientConfig {
    /// Display name announced to the room. Prompted for when absent.
    pub display_name: Option<String>,
    /// Typing inactivity window in milliseconds.
    pub typing_idle_ms: u64,
    /// How long to wait for the relay's join acknowledgment.
    pub join_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct EndpointsConfig {
    /// Base URL of the room provisioning service.
    pub api_base_url: String,
    /// Base URL of the message relay.
    pub socket_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client: ClientConfig {
                display_name: None,
                typing_idle_ms: 1000,
                join_timeout_ms: 5000,
            },
            endpoints: EndpointsConfig {
                api_base_url: "http://localhost:4000/api/v1".to_string(),
                socket_url: "http://localhost:4000".to_string(),
            },
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))
    }

    /// Defaults with environment overrides.
    pub fn load_env() -> Self {
        let mut config = Config::default();

        if let Ok(url) = std::env::var("PARLEY_API_URL") {
            config.endpoints.api_base_url = url;
        }
        if let Ok(url) = std::env::var("PARLEY_SOCKET_URL") {
            config.endpoints.socket_url = url;
        }
        if let Ok(name) = std::env::var("PARLEY_DISPLAY_NAME") {
            config.client.display_name = Some(name);
        }

        config
    }

    pub fn typing_idle(&self) -> Duration {
        Duration::from_millis(self.client.typing_idle_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.client.join_timeout_ms)
    }
}
