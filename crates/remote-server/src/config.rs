//! Configuration for the remote control server.
//!
//! Settings come from three layers, later ones winning:
//!
//! 1. defaults / an optional TOML file (`Config::from_file`)
//! 2. environment variables (`Config::apply_env`):
//!    - `REMOTE_BIND_ADDR`    (default: "0.0.0.0")
//!    - `REMOTE_PORT`         (default: "6545")
//!    - `REMOTE_REQUIRE_AUTH` (default: "true")
//! 3. command-line flags, applied by the binary

use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use remote_protocol::wire::DEFAULT_PORT;
use serde::Deserialize;

use crate::error::{Result, ServerError};

/// How unknown peers are approved when authentication is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalMode {
    /// Ask the operator on the console.
    #[default]
    Prompt,
    /// Approve every peer.
    Allow,
    /// Reject every unknown peer.
    Deny,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// IP address / interface to bind to (e.g. "0.0.0.0" or "127.0.0.1").
    pub bind_addr: String,

    /// TCP port to listen on. `0` picks a free port.
    pub port: u16,

    /// Whether unknown peers must be approved before they can connect.
    pub require_auth: bool,

    pub approval: ApprovalMode,

    /// Interval of `Position|…` broadcasts while playing.
    pub position_interval_ms: u64,

    /// Longest inbound line accepted; longer lines are skipped.
    pub max_line_length: usize,

    /// Outbound batches queued per client before it is dropped as
    /// too slow.
    pub max_queued_batches: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            require_auth: true,
            approval: ApprovalMode::Prompt,
            position_interval_ms: 100,
            max_line_length: 64 * 1024,
            max_queued_batches: 256,
        }
    }
}

impl Config {
    /// Load a `Config` from a TOML file. Missing keys take defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| ServerError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|source| ServerError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Override fields from environment variables that are set.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = env::var("REMOTE_BIND_ADDR") {
            self.bind_addr = addr;
        }
        self.port = read_env_or_default("REMOTE_PORT", self.port)?;
        self.require_auth = read_env_or_default("REMOTE_REQUIRE_AUTH", self.require_auth)?;
        Ok(())
    }

    /// Convenience: `addr:port` socket string.
    pub fn socket_addr_string(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    pub fn position_interval(&self) -> Duration {
        Duration::from_millis(self.position_interval_ms.max(1))
    }
}

fn read_env_or_default<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
{
    match env::var(key) {
        Ok(val) => val.trim().parse::<T>().map_err(|_| ServerError::InvalidSetting {
            key: key.to_string(),
            value: val,
        }),
        Err(_) => Ok(default),
    }
}
