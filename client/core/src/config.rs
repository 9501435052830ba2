//! Client Configuration
//!
//! TOML file under the platform config directory, with environment-variable
//! overrides for the fields that change between machines. Every field has a
//! default so a missing or partial file still yields a working config.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol::RequestMetadata;

/// Errors from loading or saving configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read or written
    #[error("config file i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML
    #[error("config file failed to parse: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized
    #[error("config failed to serialize: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Everything the client needs to talk to the service
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the remote API server
    pub api_server_url: String,
    /// Auth token used to register for an API key
    pub auth_token: String,
    /// API key attached to every request once registered
    pub api_key: String,
    /// IDE name reported to the service
    pub ide_name: String,
    /// IDE version reported to the service
    pub ide_version: String,
    /// Version of this client reported to the service
    pub extension_version: String,
    /// Path to the local bridge binary, when one should be spawned
    pub server_binary: Option<PathBuf>,
    /// Timeout for unary calls, in milliseconds
    pub unary_timeout_ms: u64,
    /// Per-chunk timeout for the chat stream, in milliseconds
    pub chat_chunk_timeout_ms: u64,
    /// Interval between heartbeats, in milliseconds
    pub heartbeat_interval_ms: u64,
    /// Display width hint text is wrapped to
    pub hint_width: usize,
    /// How many times to scan for the bridge's port announcement
    pub port_retry_limit: u32,
    /// Delay between port scans, in milliseconds
    pub port_retry_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_server_url: "https://server.codeium.com".to_string(),
            auth_token: String::new(),
            api_key: String::new(),
            ide_name: "vscode".to_string(),
            ide_version: "1.77.3".to_string(),
            extension_version: "1.2.15".to_string(),
            server_binary: None,
            unary_timeout_ms: 4_000,
            chat_chunk_timeout_ms: 8_000,
            heartbeat_interval_ms: 5_000,
            hint_width: 60,
            port_retry_limit: 100,
            port_retry_interval_ms: 300,
        }
    }
}

impl ClientConfig {
    /// The metadata block attached to every request
    #[must_use]
    pub fn metadata(&self) -> RequestMetadata {
        RequestMetadata {
            api_key: self.api_key.clone(),
            ide_name: self.ide_name.clone(),
            ide_version: self.ide_version.clone(),
            extension_version: self.extension_version.clone(),
        }
    }

    /// Unary call timeout
    #[must_use]
    pub fn unary_timeout(&self) -> Duration {
        Duration::from_millis(self.unary_timeout_ms)
    }

    /// Chat per-chunk timeout
    #[must_use]
    pub fn chat_chunk_timeout(&self) -> Duration {
        Duration::from_millis(self.chat_chunk_timeout_ms)
    }

    /// Heartbeat interval
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Delay between port-announcement scans
    #[must_use]
    pub fn port_retry_interval(&self) -> Duration {
        Duration::from_millis(self.port_retry_interval_ms)
    }

    /// Apply `SIDEKICK_*` environment overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("SIDEKICK_API_SERVER_URL") {
            self.api_server_url = url;
        }
        if let Ok(token) = std::env::var("SIDEKICK_AUTH_TOKEN") {
            self.auth_token = token;
        }
        if let Ok(key) = std::env::var("SIDEKICK_API_KEY") {
            self.api_key = key;
        }
        if let Ok(binary) = std::env::var("SIDEKICK_SERVER_BINARY") {
            self.server_binary = Some(PathBuf::from(binary));
        }
    }
}

/// Default location of the config file
///
/// `<platform config dir>/sidekick/config.toml`; `None` when the platform
/// offers no config directory.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sidekick").join("config.toml"))
}

/// Load config from the default path, with environment overrides
///
/// A missing file yields defaults; overrides apply either way.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file exists but cannot be read or
/// parsed.
pub fn load_config() -> Result<ClientConfig, ConfigError> {
    let mut config = match default_config_path() {
        Some(path) if path.exists() => load_config_from_path(&path)?,
        _ => ClientConfig::default(),
    };
    config.apply_env_overrides();
    Ok(config)
}

/// Load config from a specific file
///
/// # Errors
///
/// Returns [`ConfigError`] when the file cannot be read or parsed.
pub fn load_config_from_path(path: &Path) -> Result<ClientConfig, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    let config = toml::from_str(&text)?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Write config to a specific file, creating parent directories
///
/// # Errors
///
/// Returns [`ConfigError`] when serialization or the write fails.
pub fn save_config_to_path(config: &ClientConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let text = toml::to_string_pretty(config)?;
    std::fs::write(path, text)?;
    Ok(())
}
