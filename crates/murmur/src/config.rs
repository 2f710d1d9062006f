//! Layered application configuration.
//!
//! Defaults, then the TOML config file, then `MURMUR__SECTION__KEY`
//! environment variables.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::chat::DEFAULT_HISTORY_LIMIT;
use crate::presence::DEFAULT_PRESENCE_TTL_SECS;
use crate::ws::hub::{DEFAULT_EVENT_CAPACITY, DEFAULT_OUTBOUND_CAPACITY, REGISTRATION_OVERHEAD};
use crate::ws::session::{DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_PONG_WAIT_SECS, DEFAULT_WRITE_WAIT_SECS};
use crate::ws::{HubConfig, SessionConfig};

pub const APP_NAME: &str = "murmur";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub paths: PathsConfig,
    pub server: ServerConfig,
    pub hub: HubSettings,
    pub session: SessionSettings,
    pub presence: PresenceSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: Option<String>,
    pub state_dir: Option<String>,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed to make cross-origin requests.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubSettings {
    /// User messages replayed to new members.
    pub history_limit: usize,
    /// Pending per-session outbound events before the session is evicted.
    pub outbound_capacity: usize,
    /// Pending hub events before submitters wait.
    pub event_capacity: usize,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Largest inbound frame in bytes.
    pub max_message_size: usize,
    pub pong_wait_secs: u64,
    pub write_wait_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            pong_wait_secs: DEFAULT_PONG_WAIT_SECS,
            write_wait_secs: DEFAULT_WRITE_WAIT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceSettings {
    pub ttl_secs: u64,
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_PRESENCE_TTL_SECS,
        }
    }
}

impl AppConfig {
    /// Load configuration from `path` (optional) layered under the environment.
    pub fn load(path: &Path) -> Result<Self> {
        let built = Config::builder()
            .add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(Environment::with_prefix(&env_prefix()).separator("__"))
            .build()
            .with_context(|| format!("loading config from {}", path.display()))?;

        let config: AppConfig = built
            .try_deserialize()
            .context("deserializing configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings under which the hub would evict every newcomer.
    pub fn validate(&self) -> Result<()> {
        let burst = self.hub.history_limit.saturating_add(REGISTRATION_OVERHEAD);
        if self.hub.outbound_capacity < burst {
            bail!(
                "hub.outbound_capacity ({}) must be at least hub.history_limit + {} ({}) \
                 to hold the welcome, replay, join notice and member list",
                self.hub.outbound_capacity,
                REGISTRATION_OVERHEAD,
                burst
            );
        }
        Ok(())
    }

    /// Write the default configuration to `path`, creating parent directories.
    pub fn write_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating config directory {parent:?}"))?;
        }

        let toml = toml::to_string_pretty(&AppConfig::default())
            .context("serializing default config to TOML")?;
        let body = format!(
            "# Configuration for {}\n# File: {}\n\n{}",
            APP_NAME,
            path.display(),
            toml
        );
        fs::write(path, body).with_context(|| format!("writing config file to {}", path.display()))
    }

    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            history_limit: self.hub.history_limit,
            event_capacity: self.hub.event_capacity,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            max_message_size: self.session.max_message_size,
            outbound_capacity: self.hub.outbound_capacity,
            pong_wait: Duration::from_secs(self.session.pong_wait_secs),
            write_wait: Duration::from_secs(self.session.write_wait_secs),
        }
    }

    pub fn presence_ttl(&self) -> Duration {
        Duration::from_secs(self.presence.ttl_secs)
    }
}

/// Environment variable prefix derived from the app name.
pub fn env_prefix() -> String {
    APP_NAME
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_runtime_constants() {
        let config = AppConfig::default();
        assert_eq!(config.hub.history_limit, 50);
        assert_eq!(config.session_config().outbound_capacity, 256);
        assert_eq!(config.session_config().pong_wait, Duration::from_secs(60));
        assert_eq!(config.session.max_message_size, 512);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_default_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        AppConfig::write_default(&path).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("# Configuration for murmur"));

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded, AppConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[hub]\nhistory_limit = 10\n\n[server]\nport = 9000\n").unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.hub.history_limit, 10);
        assert_eq!(loaded.hub.outbound_capacity, DEFAULT_OUTBOUND_CAPACITY);
        assert_eq!(loaded.server.port, 9000);
        assert_eq!(loaded.server.host, "0.0.0.0");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = AppConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded, AppConfig::default());
    }

    #[test]
    fn test_replay_must_fit_outbound_queue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        fs::write(&path, "[hub]\nhistory_limit = 300\n").unwrap();
        let err = AppConfig::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("hub.outbound_capacity"));

        fs::write(&path, "[hub]\nhistory_limit = 254\noutbound_capacity = 256\n").unwrap();
        assert!(AppConfig::load(&path).is_err());

        fs::write(&path, "[hub]\nhistory_limit = 253\noutbound_capacity = 256\n").unwrap();
        assert_eq!(AppConfig::load(&path).unwrap().hub.history_limit, 253);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_env_prefix() {
        assert_eq!(env_prefix(), "MURMUR");
    }
}
