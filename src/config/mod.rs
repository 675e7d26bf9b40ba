// ABOUTME: Configuration types and parsing for keyferry.yml.
// ABOUTME: Handles YAML parsing, file discovery, and SSH client settings.

use crate::error::{Error, Result};
use crate::ssh::ClientSettings;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "keyferry.yml";
pub const CONFIG_FILENAME_ALT: &str = "keyferry.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".keyferry/config.yml";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub ssh: SshConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SshConfig {
    /// SSH port used for every provisioning target.
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Timeout for the remote install command.
    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub command_timeout: Duration,

    /// Accept and record unknown host keys instead of failing.
    #[serde(default)]
    pub trust_on_first_use: bool,

    /// Path to a known_hosts file. Defaults to ~/.ssh/known_hosts.
    #[serde(default)]
    pub known_hosts: Option<PathBuf>,
}

fn default_port() -> u16 {
    22
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(60)
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            connect_timeout: default_connect_timeout(),
            command_timeout: default_command_timeout(),
            trust_on_first_use: false,
            known_hosts: None,
        }
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Discover a config file in `dir`, falling back to defaults when none
    /// exists. The service runs fine without a config file.
    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load_file(path);
            }
        }

        Ok(Self::default())
    }

    /// Load from an explicit path, or discover from `dir` when none is given.
    pub fn load(path: Option<&Path>, dir: &Path) -> Result<Self> {
        match path {
            Some(path) => Self::load_file(path),
            None => Self::discover(dir),
        }
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings::new()
            .port(self.ssh.port)
            .connect_timeout(self.ssh.connect_timeout)
            .command_timeout(self.ssh.command_timeout)
            .trust_on_first_use(self.ssh.trust_on_first_use)
            .known_hosts(self.ssh.known_hosts.clone())
    }
}
