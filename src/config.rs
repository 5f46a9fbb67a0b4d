//! Configuration for the funban client, read from `funban.toml`.
//!
//! Lookup order for the file: `./funban.toml`, then
//! `<config_dir>/funban/funban.toml`. Values are layered file → environment
//! → CLI flags.
//!
//! ```toml
//! [server]
//! api_url = "http://localhost:8000"
//! ws_url = "ws://localhost:8000/ws"
//!
//! [sync]
//! reconnect_delay_ms = 1000
//! max_reconnect_attempts = 20
//! ack_timeout_secs = 10
//!
//! [logging]
//! level = "warn"
//! format = "pretty"
//! directory = "/var/log/funban"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::logging::LogFormat;
use crate::sync::{ReconnectPolicy, parse_ws_url};

pub const CONFIG_FILE_NAME: &str = "funban.toml";

pub const ENV_API_URL: &str = "FUNBAN_API_URL";
pub const ENV_WS_URL: &str = "FUNBAN_WS_URL";
pub const ENV_LOG: &str = "FUNBAN_LOG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
}

fn default_api_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_ws_url() -> String {
    "ws://localhost:8000/ws".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            ws_url: default_ws_url(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSection {
    /// Pause between reconnect attempts.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Unset means retry forever.
    #[serde(default)]
    pub max_reconnect_attempts: Option<u32>,
    /// How long a CLI command waits for the server to acknowledge it.
    #[serde(default = "default_ack_timeout_secs")]
    pub ack_timeout_secs: u64,
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

fn default_ack_timeout_secs() -> u64 {
    10
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_attempts: None,
            ack_timeout_secs: default_ack_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSection {
    /// `EnvFilter` directive; `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// When set, logs go to a daily rolling file here instead of stderr.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            directory: None,
        }
    }
}

/// The complete funban.toml structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunbanToml {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub sync: SyncSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl FunbanToml {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).context("Failed to serialize funban.toml")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Overlay environment values. `lookup` is `std::env::var` in
    /// production and a map in tests.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.is_empty()) {
            self.server.api_url = url;
        }
        if let Some(url) = lookup(ENV_WS_URL).filter(|v| !v.is_empty()) {
            self.server.ws_url = url;
        }
        if let Some(level) = lookup(ENV_LOG).filter(|v| !v.is_empty()) {
            self.logging.level = level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        reqwest::Url::parse(&self.server.api_url).map_err(|e| ConfigError::InvalidValue {
            key: "server.api_url".to_string(),
            message: e.to_string(),
        })?;
        parse_ws_url(&self.server.ws_url).map_err(|e| ConfigError::InvalidValue {
            key: "server.ws_url".to_string(),
            message: e.to_string(),
        })?;
        if self.sync.reconnect_delay_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "sync.reconnect_delay_ms".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.sync.ack_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "sync.ack_timeout_secs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Values given on the command line; `None` leaves the layer below alone.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub api_url: Option<String>,
    pub ws_url: Option<String>,
    pub log_level: Option<String>,
}

/// Resolved configuration plus where it came from.
#[derive(Debug, Clone)]
pub struct FunbanConfig {
    pub toml: FunbanToml,
    /// File the settings were read from, if any.
    pub source: Option<PathBuf>,
}

impl FunbanConfig {
    /// Load from `explicit` or the discovered file, then apply the
    /// environment and CLI layers.
    pub fn load(explicit: Option<&Path>, overrides: &CliOverrides) -> Result<Self, ConfigError> {
        let source = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => discover(),
        };
        let mut toml = match &source {
            Some(path) => FunbanToml::load(path)?,
            None => FunbanToml::default(),
        };
        toml.apply_env(|key| std::env::var(key).ok());

        let mut config = Self { toml, source };
        config.apply_overrides(overrides);
        config.toml.validate()?;
        tracing::debug!(source = ?config.source, "configuration loaded");
        Ok(config)
    }

    pub fn apply_overrides(&mut self, overrides: &CliOverrides) {
        if let Some(url) = &overrides.api_url {
            self.toml.server.api_url = url.clone();
        }
        if let Some(url) = &overrides.ws_url {
            self.toml.server.ws_url = url.clone();
        }
        if let Some(level) = &overrides.log_level {
            self.toml.logging.level = level.clone();
        }
    }

    pub fn api_url(&self) -> &str {
        &self.toml.server.api_url
    }

    pub fn ws_url(&self) -> &str {
        &self.toml.server.ws_url
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            delay: Duration::from_millis(self.toml.sync.reconnect_delay_ms),
            max_attempts: self.toml.sync.max_reconnect_attempts,
        }
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_secs(self.toml.sync.ack_timeout_secs)
    }
}

/// `./funban.toml` if present, else the per-user file if present.
pub fn discover() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }
    user_config_path().filter(|path| path.is_file())
}

/// `<config_dir>/funban/funban.toml`, whether or not it exists.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("funban").join(CONFIG_FILE_NAME))
}
