//! Configuration types for the Gbox MCP Server.
//!
//! Values come from an optional YAML file, then environment overrides
//! ([`ServerConfig::apply_env`]); the binary applies CLI flags last.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::{Error, Platform};

/// Default Gbox API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://gbox.ai/api/v1";

/// Server configuration loaded from YAML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Server settings
    pub server: ServerSettings,
    /// Device client settings
    pub device: DeviceSettings,
}

impl ServerConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string.
    pub fn from_yaml(yaml: &str) -> crate::Result<Self> {
        let config: ServerConfig =
            serde_yaml::from_str(yaml).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> crate::Result<()> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Recognised variables: `MODE`, `PORT`, `GBOX_API_KEY`, `GBOX_BASE_URL`.
    pub fn apply_vars<F>(&mut self, lookup: F) -> crate::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mode) = lookup("MODE") {
            self.server.mode = mode.parse()?;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("invalid PORT value: {port}")))?;
        }
        if let Some(api_key) = lookup("GBOX_API_KEY").filter(|k| !k.is_empty()) {
            self.device.api_key = Some(api_key);
        }
        if let Some(base_url) = lookup("GBOX_BASE_URL").filter(|u| !u.is_empty()) {
            self.device.base_url = base_url;
        }
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> crate::Result<()> {
        if self.server.max_sessions == 0 {
            return Err(Error::Config("server.max_sessions must be > 0".into()));
        }

        if self.server.session_timeout_ms == 0 {
            return Err(Error::Config("server.session_timeout_ms must be > 0".into()));
        }

        if self.server.sweep_interval_ms == 0 {
            return Err(Error::Config("server.sweep_interval_ms must be > 0".into()));
        }

        if self.server.platforms.is_empty() {
            return Err(Error::Config("server.platforms cannot be empty".into()));
        }

        if self.server.port == 0 {
            return Err(Error::Config("server.port must be > 0".into()));
        }

        if self.device.base_url.trim().is_empty() {
            return Err(Error::Config("device.base_url cannot be empty".into()));
        }

        Ok(())
    }
}

/// Transport the process serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Single session over stdin/stdout
    #[default]
    Stdio,
    /// Multi-session Streamable HTTP
    Http,
}

impl std::str::FromStr for TransportMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "stdio" => Ok(TransportMode::Stdio),
            "http" | "streamable" | "cloud" => Ok(TransportMode::Http),
            other => Err(Error::Config(format!("unknown transport mode: {other}"))),
        }
    }
}

/// Server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Base server name; sessions append platform and session id
    pub name: String,
    /// Version advertised to clients
    pub version: String,
    /// Transport mode (stdio or http)
    pub mode: TransportMode,
    /// HTTP listening port
    pub port: u16,
    /// Platform served by the stdio transport
    pub platform: Platform,
    /// Platforms routed by the HTTP transport
    pub platforms: Vec<Platform>,
    /// Idle time after which a session expires, in milliseconds
    pub session_timeout_ms: u64,
    /// Maximum number of concurrent sessions per platform
    pub max_sessions: usize,
    /// Period of the expiry sweep, in milliseconds
    pub sweep_interval_ms: u64,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl ServerSettings {
    /// Idle timeout as a [`Duration`].
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    /// Sweep period as a [`Duration`].
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            name: "gbox".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            mode: TransportMode::Stdio,
            port: 3041,
            platform: Platform::Android,
            platforms: Platform::ALL.to_vec(),
            session_timeout_ms: 120 * 60 * 1000,
            max_sessions: 1000,
            sweep_interval_ms: 60 * 1000,
            log_level: "info".to_string(),
        }
    }
}

/// Device client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    /// Gbox API base URL
    pub base_url: String,
    /// API key used when a client does not supply its own
    pub api_key: Option<String>,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            request_timeout_secs: 60,
        }
    }
}
