//! Client configuration, loaded from TOML or built from defaults.

use huddle_core::IceServerConfig;
use huddle_core::utils::DEFAULT_STUN_SERVERS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{HuddleError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// WebSocket URL of the signaling relay.
    pub signaling_url: String,
    pub display_name: String,
    pub ice_servers: Vec<IceServerConfig>,
    /// Upper bound on an unanswered offer/answer round.
    pub negotiation_timeout_secs: u64,
    pub reconnect: ReconnectConfig,
    pub capture: CaptureConstraints,
    pub recording_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CaptureConstraints {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            signaling_url: "ws://127.0.0.1:5000/ws".to_owned(),
            display_name: "Guest".to_owned(),
            ice_servers: vec![IceServerConfig {
                urls: DEFAULT_STUN_SERVERS.iter().map(|s| s.to_string()).collect(),
                username: None,
                credential: None,
            }],
            negotiation_timeout_secs: 15,
            reconnect: ReconnectConfig::default(),
            capture: CaptureConstraints::default(),
            recording_dir: PathBuf::from("."),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
        }
    }
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            frame_rate: 30,
        }
    }
}

impl ReconnectConfig {
    /// Delay before reconnect attempt `attempt` (zero-based), doubling up to
    /// the configured ceiling.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.min(16)).unwrap_or(u64::MAX);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

impl ClientConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
            .map_err(|e| HuddleError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: ClientConfig =
            toml::from_str(text).map_err(|e| HuddleError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.signaling_url.trim().is_empty() {
            return Err(HuddleError::Config("signaling_url must not be empty".into()));
        }
        if self.negotiation_timeout_secs == 0 {
            return Err(HuddleError::Config(
                "negotiation_timeout_secs must be positive".into(),
            ));
        }
        if self.reconnect.initial_backoff_ms == 0 {
            return Err(HuddleError::Config(
                "reconnect.initial_backoff_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn negotiation_timeout(&self) -> Duration {
        Duration::from_secs(self.negotiation_timeout_secs)
    }
}
