//! Configuration management for the MCP server.
//!
//! This module provides a centralized configuration structure that can be
//! populated from environment variables or defaults.

use super::transport::TransportConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use crate::domains::services::DEFAULT_PROFILE;
use crate::domains::services::CoreModule;
use crate::domains::tools::{BackendTarget, Selector};

/// Main configuration structure for the MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server identification and metadata.
    pub server: ServerConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Transport configuration.
    pub transport: TransportConfig,

    /// Where service modules reach the engine backend.
    pub backend: BackendConfig,

    /// Which modules are active at startup.
    pub profile: ProfileConfig,

    /// Dispatch behaviour.
    pub dispatch: DispatchConfig,
}

/// Server identification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The name of the server as reported to clients.
    pub name: String,

    /// The version of the server.
    pub version: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "trace").
    pub level: String,

    /// Whether to include timestamps in log output.
    pub with_timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            with_timestamps: true,
        }
    }
}

impl LoggingConfig {
    /// `MCP_LOG_LEVEL` and `MCP_LOG_TIMESTAMPS` over the defaults.
    ///
    /// Read on its own so logging can be set up before the rest of the
    /// configuration, whose warnings would otherwise go nowhere.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let default = Self::default();
        Self {
            level: std::env::var("MCP_LOG_LEVEL").unwrap_or(default.level),
            with_timestamps: flag_from_env("MCP_LOG_TIMESTAMPS", default.with_timestamps),
        }
    }
}

/// Backend connection settings, handed to every module's `connect`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub host: String,

    pub port: u16,

    /// Bound on connect and on each tool call, in milliseconds.
    pub timeout_ms: u64,

    /// Location of generated backend stubs, if not the default.
    pub stub_path: Option<PathBuf>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 50051,
            timeout_ms: 30_000,
            stub_path: None,
        }
    }
}

impl BackendConfig {
    pub fn target(&self) -> BackendTarget {
        let mut target = BackendTarget::new(self.host.clone(), self.port)
            .with_timeout(Duration::from_millis(self.timeout_ms));
        target.stub_path = self.stub_path.clone();
        target
    }
}

/// Startup module selection.
///
/// An explicit module list takes precedence over the profile name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Profile name, or "all".
    pub profile: String,

    /// Explicit module list.
    pub modules: Option<Vec<String>>,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            profile: DEFAULT_PROFILE.to_string(),
            modules: None,
        }
    }
}

impl ProfileConfig {
    /// Selector for the configured modules.
    ///
    /// An explicit list always includes `core`, so `help` and
    /// `load_modules` stay reachable.
    pub fn selector(&self) -> Selector {
        match &self.modules {
            Some(modules) => {
                let mut names = vec![CoreModule::NAME.to_string()];
                for name in modules {
                    if !names.contains(name) {
                        names.push(name.clone());
                    }
                }
                Selector::Modules(names)
            }
            None => Selector::profile(self.profile.clone()),
        }
    }
}

/// Dispatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Run at most one call at a time per backend connection.
    pub serialize_calls: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            serialize_calls: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                name: "agentbridge-mcp".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            logging: LoggingConfig::default(),
            transport: TransportConfig::default(),
            backend: BackendConfig::default(),
            profile: ProfileConfig::default(),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables are expected to be prefixed with `MCP_`.
    /// For example: `MCP_SERVER_NAME`, `MCP_BACKEND_PORT`.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(name) = std::env::var("MCP_SERVER_NAME") {
            config.server.name = name;
        }

        config.logging = LoggingConfig::from_env();

        // Load transport configuration from environment
        config.transport = TransportConfig::from_env();

        if let Ok(host) = std::env::var("MCP_BACKEND_HOST") {
            config.backend.host = host;
        }

        if let Ok(port) = std::env::var("MCP_BACKEND_PORT") {
            match port.parse() {
                Ok(port) => config.backend.port = port,
                Err(_) => warn!(
                    "Invalid MCP_BACKEND_PORT '{}', using {}",
                    port, config.backend.port
                ),
            }
        }

        if let Ok(timeout) = std::env::var("MCP_BACKEND_TIMEOUT_MS") {
            match timeout.parse() {
                Ok(ms) => config.backend.timeout_ms = ms,
                Err(_) => warn!(
                    "Invalid MCP_BACKEND_TIMEOUT_MS '{}', using {}",
                    timeout, config.backend.timeout_ms
                ),
            }
        }

        if let Ok(stub_path) = std::env::var("MCP_STUB_PATH") {
            config.backend.stub_path = Some(PathBuf::from(stub_path));
        }

        if let Ok(profile) = std::env::var("MCP_PROFILE") {
            config.profile.profile = profile;
        }

        if let Ok(modules) = std::env::var("MCP_MODULES") {
            let modules: Vec<String> = modules
                .split(',')
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect();
            if !modules.is_empty() {
                info!("Module list from environment: {}", modules.join(", "));
                config.profile.modules = Some(modules);
            }
        }

        config.dispatch.serialize_calls =
            flag_from_env("MCP_SERIALIZE_CALLS", config.dispatch.serialize_calls);

        config
    }
}

/// Boolean from `var`, or `default` when unset or unrecognized.
///
/// Accepts `true`/`false`, `1`/`0`, `on`/`off` and `yes`/`no` in any case.
pub(crate) fn flag_from_env(var: &str, default: bool) -> bool {
    let Ok(value) = std::env::var(var) else {
        return default;
    };
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => true,
        "false" | "0" | "off" | "no" => false,
        _ => {
            warn!("Invalid {} '{}', using {}", var, value, default);
            default
        }
    }
}
