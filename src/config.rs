//! Server configuration
//!
//! Settings are read once at startup from a YAML file and are immutable
//! afterwards. Every key is optional; anything missing falls back to a
//! default instead of failing.

use anyhow::Context;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::handler::HandlerChain;

/// A virtual host: the directory its files are served from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HostConfig {
    pub root: PathBuf,
}

impl HostConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self::new("./")
    }
}

/// Verbosity of the log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    #[default]
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Interface to bind; all interfaces by default
    pub bind_address: IpAddr,

    /// Idle timeout applied to every connection
    pub timeout_milliseconds: u64,

    /// Host name (without port) to virtual host
    pub hosts: HashMap<String, HostConfig>,

    /// Used when the Host header is missing or matches no entry in `hosts`
    pub default_host: HostConfig,

    pub log_level: LogLevel,

    /// Custom handlers consulted before the file fallback. Registered in
    /// code, never read from the settings file.
    #[serde(skip)]
    pub handlers: HandlerChain,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            timeout_milliseconds: 30_000,
            hosts: HashMap::new(),
            default_host: HostConfig::default(),
            log_level: LogLevel::default(),
            handlers: HandlerChain::default(),
        }
    }
}

impl ServerConfig {
    /// Load settings from `path`.
    ///
    /// A missing file is not an error: the defaults are used instead. A file
    /// that exists but cannot be parsed is.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_yaml(&contents)
                .with_context(|| format!("Error parsing {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    pub fn from_yaml(contents: &str) -> anyhow::Result<Self> {
        // An empty document deserializes to unit, not to a mapping
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Replace the custom handler chain.
    pub fn with_handlers(mut self, handlers: HandlerChain) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_milliseconds)
    }
}
