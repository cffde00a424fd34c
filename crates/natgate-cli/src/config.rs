//! Client configuration at `~/.natgate/config.toml`.
//!
//! Provides the ssh user, gateway device, iptables path and state source.
//! CLI flags always override config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Gateway access and rule rendering settings.
    #[serde(default)]
    pub default: DefaultConfig,

    /// Where the cluster state snapshot comes from.
    #[serde(default)]
    pub state: StateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultConfig {
    /// User for ssh connections to gateway machines.
    #[serde(default = "default_ssh_user")]
    pub ssh_user: String,

    /// Externally facing interface on gateways.
    #[serde(default = "default_device")]
    pub device: String,

    /// iptables binary on gateways.
    #[serde(default = "default_iptables")]
    pub iptables: String,

    /// Extra arguments passed to ssh before the destination.
    #[serde(default)]
    pub ssh_options: Vec<String>,
}

impl Default for DefaultConfig {
    fn default() -> Self {
        Self {
            ssh_user: default_ssh_user(),
            device: default_device(),
            iptables: default_iptables(),
            ssh_options: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Snapshot file (JSON or TOML). When unset, `juju status` is queried.
    #[serde(default)]
    pub snapshot: Option<String>,

    /// juju executable.
    #[serde(default = "default_juju")]
    pub juju: String,

    /// Model passed to `juju status -m`.
    #[serde(default)]
    pub model: Option<String>,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            snapshot: None,
            juju: default_juju(),
            model: None,
        }
    }
}

fn default_ssh_user() -> String {
    "ubuntu".to_string()
}

fn default_device() -> String {
    natgate_core::DEFAULT_DEVICE.to_string()
}

fn default_iptables() -> String {
    natgate_core::DEFAULT_IPTABLES.to_string()
}

fn default_juju() -> String {
    "juju".to_string()
}

impl Config {
    /// Load configuration from a TOML file, returning defaults if the file
    /// does not exist.
    pub fn load(path: &str) -> Result<Self> {
        let path = Path::new(path);
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config at {}", path.display()))?;

        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }
}

/// Default config location under the home directory.
pub fn default_path() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_default();
    home.join(".natgate").join("config.toml")
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_tilde(s: &str) -> PathBuf {
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(s)
}
