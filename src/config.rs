//! Configuration for the stub server.
//!
//! Names the stub files enabled at startup and the global settings.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for the stub server.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct StubServerConfig {
    /// Stub files (Mocktail format) enabled at startup, in priority order
    #[serde(default)]
    pub stubs: Vec<PathBuf>,

    /// Global settings
    #[serde(default)]
    pub settings: GlobalSettings,
}

impl StubServerConfig {
    /// Load configuration from a YAML file.
    ///
    /// Relative stub paths are resolved against the directory of the
    /// configuration file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;

        if let Some(base) = path.parent() {
            for stub in &mut config.stubs {
                if stub.is_relative() {
                    *stub = base.join(&*stub);
                }
            }
        }

        Ok(config)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (i, stub) in self.stubs.iter().enumerate() {
            if stub.as_os_str().is_empty() {
                anyhow::bail!("Stub {}: path cannot be empty", i);
            }
        }
        self.settings.validate()
    }
}

/// Global settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalSettings {
    /// Address the HTTP listener binds to
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Body delay for stubs without a `stub-delay` header (ms)
    #[serde(default = "default_delay_ms")]
    pub default_delay_ms: u64,

    /// Log all matched stubs
    #[serde(default = "default_true")]
    pub log_matches: bool,

    /// Log unmatched requests
    #[serde(default = "default_true")]
    pub log_unmatched: bool,
}

impl GlobalSettings {
    pub fn default_delay(&self) -> Duration {
        Duration::from_millis(self.default_delay_ms)
    }

    /// Validate the settings.
    pub fn validate(&self) -> anyhow::Result<()> {
        // Capped at one hour.
        if self.default_delay_ms > 3_600_000 {
            anyhow::bail!("Invalid default_delay_ms: {}", self.default_delay_ms);
        }
        Ok(())
    }
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            default_delay_ms: default_delay_ms(),
            log_matches: true,
            log_unmatched: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 4444))
}

fn default_delay_ms() -> u64 {
    500
}
