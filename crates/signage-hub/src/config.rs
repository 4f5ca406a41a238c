//! Hub configuration.
//!
//! Loaded from a TOML file; every field has a default so an empty file (or no
//! file) is a valid configuration.
//!
//! ```toml
//! bind = "0.0.0.0:8080"
//! library = "library.json"
//! outbound_queue = 64
//! replay_on_connect = true
//!
//! [actions]
//! power_on = ["cec-ctl", "--to", "0", "--image-view-on"]
//! power_off = ["cec-ctl", "--to", "0", "--standby"]
//! ```

use serde::Deserialize;
use signage_core::HardwareAction;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const DEFAULT_BIND: ([u8; 4], u16) = ([0, 0, 0, 0], 8080);
pub const DEFAULT_OUTBOUND_QUEUE: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HubConfig {
    /// Address the WebSocket listener binds to.
    pub bind: SocketAddr,
    /// JSON content repository file. An empty repository is used if unset.
    pub library: Option<PathBuf>,
    /// Per-connection outbound queue capacity.
    pub outbound_queue: usize,
    /// Send a location's current content to displays as they connect.
    pub replay_on_connect: bool,
    /// Tracing filter directive, e.g. `signage_hub=debug`.
    pub log_filter: Option<String>,
    pub actions: ActionsConfig,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.into(),
            library: None,
            outbound_queue: DEFAULT_OUTBOUND_QUEUE,
            replay_on_connect: true,
            log_filter: None,
            actions: ActionsConfig::default(),
        }
    }
}

/// Command line (program followed by arguments) per hardware action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActionsConfig {
    pub power_on: Option<Vec<String>>,
    pub power_off: Option<Vec<String>>,
    pub volume_up: Option<Vec<String>>,
    pub volume_down: Option<Vec<String>>,
}

impl ActionsConfig {
    pub fn command(&self, action: HardwareAction) -> Option<&[String]> {
        match action {
            HardwareAction::PowerOn => self.power_on.as_deref(),
            HardwareAction::PowerOff => self.power_off.as_deref(),
            HardwareAction::VolumeUp => self.volume_up.as_deref(),
            HardwareAction::VolumeDown => self.volume_down.as_deref(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("outbound_queue must be at least 1")]
    ZeroQueue,
}

impl HubConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        text.parse()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.outbound_queue == 0 {
            return Err(ConfigError::ZeroQueue);
        }
        Ok(())
    }
}

impl std::str::FromStr for HubConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: HubConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}
