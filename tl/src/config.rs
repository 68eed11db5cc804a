//! Taskle configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main Taskle configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Text-generation API configuration
    pub llm: LlmConfig,

    /// Where tasks and credentials live
    pub storage: StorageConfig,

    /// Panel server configuration
    pub panel: PanelConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .taskle.yml
        let local_config = PathBuf::from(".taskle.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/taskle/taskle.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("taskle").join("taskle.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialized
    ///
    /// Errors are swallowed; the full load reports them once logging is up.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|c| c.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Text-generation API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model identifier
    pub model: String,

    /// API base URL (without the `/v1/...` suffix)
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Environment variable checked for the API key before the credentials file
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            base_url: "https://api.openai.com".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_ms: 60_000,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Task list JSON file
    #[serde(rename = "tasks-path")]
    pub tasks_path: PathBuf,

    /// Credentials file holding the API key
    #[serde(rename = "credentials-path")]
    pub credentials_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // ~/.local/share/taskle on Linux
        let tasks_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("taskle")
            .join("tasks.json");

        let credentials_path = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("taskle")
            .join("credentials");

        Self {
            tasks_path,
            credentials_path,
        }
    }
}

/// Panel server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Unix domain socket the panel server listens on
    #[serde(rename = "socket-path")]
    pub socket_path: PathBuf,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            socket_path: crate::panel::default_socket_path(),
        }
    }
}
