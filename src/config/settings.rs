use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::util::paths::config_path;

/// Example configuration file contents (bundled with the binary)
pub const EXAMPLE_CONFIG: &str = include_str!("config.toml.example");

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the panel server binds to
    pub host: String,
    /// Port the panel server listens on
    pub port: u16,
    /// Base URL of the OpenCode backend (None = not connected yet)
    pub backend_url: Option<String>,
    /// Working directory the backend serves
    pub working_dir: Option<PathBuf>,
    /// Interval between heartbeat blocks on activity-tracking streams
    pub heartbeat_interval: Duration,
    /// Session activity monitor configuration
    pub monitor: MonitorSettings,
}

#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    pub enabled: bool,
    pub reconnect_delay: Duration,
    pub cooldown: Duration,
    pub notifications: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlBackendConfig {
    pub base_url: Option<String>,
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlSseConfig {
    pub heartbeat_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlMonitorConfig {
    pub enabled: Option<bool>,
    pub reconnect_delay_secs: Option<u64>,
    pub cooldown_secs: Option<u64>,
    pub notifications: Option<bool>,
}

/// TOML representation of the config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub server: Option<TomlServerConfig>,
    pub backend: Option<TomlBackendConfig>,
    pub sse: Option<TomlSseConfig>,
    pub monitor: Option<TomlMonitorConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4097,
            backend_url: None,
            working_dir: std::env::current_dir().ok(),
            heartbeat_interval: crate::sse::HEARTBEAT_INTERVAL,
            monitor: MonitorSettings {
                enabled: true,
                reconnect_delay: Duration::from_secs(2),
                cooldown: Duration::from_secs(2),
                notifications: true,
            },
        }
    }
}

impl Config {
    /// Load from `<data dir>/config.toml`, writing the example file on
    /// first run. Missing or malformed files fall back to defaults.
    pub fn load() -> Self {
        let config_file = config_path();

        // Create example config on first run
        if !config_file.exists() {
            Self::create_default_config(&config_file);
        }

        Self::load_from(&config_file)
    }

    pub fn load_from(path: &Path) -> Self {
        let mut config = Config::default();

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "No config file; using defaults");
                return config;
            }
        };

        match toml::from_str::<TomlConfig>(&contents) {
            Ok(toml_config) => config.apply(toml_config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Invalid config file; using defaults");
            }
        }

        config
    }

    fn apply(&mut self, toml_config: TomlConfig) {
        if let Some(server) = toml_config.server {
            if let Some(host) = server.host {
                self.host = host;
            }
            if let Some(port) = server.port {
                self.port = port;
            }
        }

        if let Some(backend) = toml_config.backend {
            if backend.base_url.is_some() {
                self.backend_url = backend.base_url;
            }
            if backend.directory.is_some() {
                self.working_dir = backend.directory;
            }
        }

        if let Some(secs) = toml_config.sse.and_then(|sse| sse.heartbeat_interval_secs) {
            // Zero would spin the heartbeat timer.
            if secs > 0 {
                self.heartbeat_interval = Duration::from_secs(secs);
            }
        }

        if let Some(monitor) = toml_config.monitor {
            if let Some(enabled) = monitor.enabled {
                self.monitor.enabled = enabled;
            }
            if let Some(secs) = monitor.reconnect_delay_secs {
                self.monitor.reconnect_delay = Duration::from_secs(secs);
            }
            if let Some(secs) = monitor.cooldown_secs {
                self.monitor.cooldown = Duration::from_secs(secs);
            }
            if let Some(notifications) = monitor.notifications {
                self.monitor.notifications = notifications;
            }
        }
    }

    fn create_default_config(path: &Path) {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                if let Err(e) = fs::create_dir_all(parent) {
                    eprintln!("Failed to create config directory: {}", e);
                    return;
                }
            }
        }

        // Write the example config
        if let Err(e) = fs::write(path, EXAMPLE_CONFIG) {
            eprintln!("Failed to write default config: {}", e);
        }
    }

    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = Some(url.into());
        self
    }

    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }
}
