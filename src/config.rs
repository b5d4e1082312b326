use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::session::SessionConfig;
use crate::signaling::{ParticipantId, RoomId};

/// Environment overlay prefix, e.g. `LOQA_ROOMS__RELAY__URL`
const ENV_PREFIX: &str = "LOQA_ROOMS";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub relay: RelayConfig,
    pub backend: BackendConfig,
    pub transcript: TranscriptConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// NATS server URL
    pub url: String,
    /// Subject prefix shared with the relay service
    pub subject_prefix: String,
    /// Room joined when none is given on the command line
    pub room: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TranscriptConfig {
    pub language: String,
    pub broadcast_interval_ms: u64,
    pub restart_initial_ms: u64,
    pub restart_max_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "loqa-rooms".to_string(),
            http: HttpConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3010,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            subject_prefix: "rooms".to_string(),
            room: "lobby".to_string(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            broadcast_interval_ms: 300,
            restart_initial_ms: 500,
            restart_max_ms: 8000,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load `path` (any extension the config crate understands, optional)
    /// overlaid with `LOQA_ROOMS__SECTION__KEY` environment variables
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .with_context(|| format!("Failed to load configuration from {}", path))?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }

    /// Session settings for one room membership
    pub fn session_config(&self, room: Option<String>, client_id: Option<String>) -> SessionConfig {
        SessionConfig {
            room: RoomId::new(room.unwrap_or_else(|| self.relay.room.clone())),
            client_id: client_id
                .map(ParticipantId::new)
                .unwrap_or_else(ParticipantId::generate),
            language: self.transcript.language.clone(),
            broadcast_interval: Duration::from_millis(self.transcript.broadcast_interval_ms),
            restart_initial: Duration::from_millis(self.transcript.restart_initial_ms),
            restart_max: Duration::from_millis(self.transcript.restart_max_ms),
        }
    }
}
