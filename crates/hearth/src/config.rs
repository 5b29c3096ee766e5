//! Server configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) gives a
//! runnable development server. CLI flags in the binary override the
//! `[server]` and `[logging]` sections after loading.
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0:8080"
//!
//! [world]
//! move_speed = 0.5
//!
//! [[accounts]]
//! id = 1
//! name = "ann"
//! token = "s3cret"
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hearth_protocol::{PlayerId, Vector};
use hearth_room::RoomConfig;
use hearth_session::SessionConfig;
use serde::{Deserialize, Serialize};

/// Errors raised while loading or validating a [`HearthConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HearthConfig {
    pub server: ServerSettings,
    pub session: SessionSettings,
    pub world: WorldSettings,
    pub room: RoomConfig,
    pub logging: LoggingSettings,
    /// Development accounts used to seed the in-memory stores.
    pub accounts: Vec<AccountSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

fn default_bind_address() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

/// Liveness and queue sizing for sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Read window in seconds. Heartbeats go out at 9/10 of it.
    #[serde(default = "default_pong_wait_secs")]
    pub pong_wait_secs: u64,
    #[serde(default = "default_write_wait_secs")]
    pub write_wait_secs: u64,
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,
    /// Capacity of the server-wide queue feeding the dispatch loop.
    #[serde(default = "default_inbound_capacity")]
    pub inbound_capacity: usize,
}

fn default_pong_wait_secs() -> u64 {
    60
}

fn default_write_wait_secs() -> u64 {
    10
}

fn default_max_frame_size() -> usize {
    512
}

fn default_outbound_capacity() -> usize {
    255
}

fn default_inbound_capacity() -> usize {
    1024
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            pong_wait_secs: default_pong_wait_secs(),
            write_wait_secs: default_write_wait_secs(),
            max_frame_size: default_max_frame_size(),
            outbound_capacity: default_outbound_capacity(),
            inbound_capacity: default_inbound_capacity(),
        }
    }
}

impl SessionSettings {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            pong_wait: Duration::from_secs(self.pong_wait_secs),
            write_wait: Duration::from_secs(self.write_wait_secs),
            max_frame_size: self.max_frame_size,
            outbound_capacity: self.outbound_capacity,
        }
    }
}

/// Movement and persistence cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSettings {
    /// Distance a moving player covers per tick.
    #[serde(default = "default_move_speed")]
    pub move_speed: f64,
    /// Movement tick interval (0 disables movement).
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// How often positions are flushed to the player store (0 disables).
    #[serde(default = "default_save_interval_secs")]
    pub save_interval_secs: u64,
}

fn default_move_speed() -> f64 {
    0.5
}

fn default_tick_interval_ms() -> u64 {
    50
}

fn default_save_interval_secs() -> u64 {
    300
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            move_speed: default_move_speed(),
            tick_interval_ms: default_tick_interval_ms(),
            save_interval_secs: default_save_interval_secs(),
        }
    }
}

impl WorldSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn save_interval(&self) -> Duration {
        Duration::from_secs(self.save_interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json_format: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

/// One development account: a credential plus the stored player record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSettings {
    pub id: u32,
    pub name: String,
    pub token: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

impl AccountSettings {
    pub fn player_id(&self) -> PlayerId {
        PlayerId(self.id)
    }

    pub fn position(&self) -> Vector {
        Vector::new(self.x, self.y)
    }
}

impl HearthConfig {
    /// Loads the config at `path`, falling back to defaults when the file
    /// does not exist. The result is validated.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = match tokio::fs::read_to_string(path).await {
            Ok(content) => Self::parse(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "config file not found, using defaults");
                Self::default()
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML document without validating it.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Checks values that parse but can't run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;

        let session = &self.session;
        if session.pong_wait_secs == 0 {
            return Err(ConfigError::Invalid("session.pong_wait_secs must be > 0".into()));
        }
        if session.write_wait_secs == 0 {
            return Err(ConfigError::Invalid("session.write_wait_secs must be > 0".into()));
        }
        // A frame is at least its 2-byte channel tag.
        if session.max_frame_size < 2 {
            return Err(ConfigError::Invalid("session.max_frame_size must be >= 2".into()));
        }
        if session.outbound_capacity == 0 || session.inbound_capacity == 0 {
            return Err(ConfigError::Invalid("session queue capacities must be > 0".into()));
        }

        let speed = self.world.move_speed;
        if !speed.is_finite() || speed <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "world.move_speed must be a positive number, got {speed}"
            )));
        }

        if self.room.max_players == 0 {
            return Err(ConfigError::Invalid("room.max_players must be > 0".into()));
        }

        let mut ids: Vec<u32> = self.accounts.iter().map(|a| a.id).collect();
        ids.sort_unstable();
        if let Some(pair) = ids.windows(2).find(|w| w[0] == w[1]) {
            return Err(ConfigError::Invalid(format!("duplicate account id {}", pair[0])));
        }
        Ok(())
    }

    /// The bind address as a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server.bind_address.parse().map_err(|_| {
            ConfigError::Invalid(format!(
                "server.bind_address {:?} is not a socket address",
                self.server.bind_address
            ))
        })
    }
}
