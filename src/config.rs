//! Listener configuration.
//!
//! Loaded in layers, later layers overriding earlier ones:
//!
//! 1. built-in defaults
//! 2. a TOML file
//! 3. environment variables under a prefix
//!
//! ```toml
//! addr = "0.0.0.0:8080"
//! request_timeout_ms = 10000
//! shutdown_timeout_secs = 30
//! ```

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

fn default_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

/// Settings for [`Server`](crate::Server).
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to listen on.
    #[serde(default = "default_addr")]
    pub addr: SocketAddr,

    /// Per-request deadline. `0` disables it.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// How long to drain in-flight connections after a shutdown signal
    /// before cancelling them.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            request_timeout_ms: default_request_timeout_ms(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    /// Overrides fields from `<PREFIX>_ADDR`, `<PREFIX>_REQUEST_TIMEOUT_MS`
    /// and `<PREFIX>_SHUTDOWN_TIMEOUT_SECS` when they are set.
    pub fn with_env(self, prefix: &str) -> Result<Self> {
        self.with_vars(prefix, |key| env::var(key).ok())
    }

    fn with_vars(mut self, prefix: &str, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(addr) = var(&format!("{prefix}_ADDR")) {
            self.addr = parse_var(prefix, "ADDR", &addr)?;
        }
        if let Some(ms) = var(&format!("{prefix}_REQUEST_TIMEOUT_MS")) {
            self.request_timeout_ms = parse_var(prefix, "REQUEST_TIMEOUT_MS", &ms)?;
        }
        if let Some(secs) = var(&format!("{prefix}_SHUTDOWN_TIMEOUT_SECS")) {
            self.shutdown_timeout_secs = parse_var(prefix, "SHUTDOWN_TIMEOUT_SECS", &secs)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.shutdown_timeout_secs == 0 {
            return Err(Error::Configuration("shutdown_timeout_secs must be greater than zero".into()));
        }
        Ok(())
    }

    /// The per-request deadline, if enabled.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn parse_var<T: std::str::FromStr>(prefix: &str, name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Configuration(format!("{prefix}_{name}={value:?}: {e}")))
}
