//! Centralized server configuration.
//!
//! Loaded via the `config` crate from an optional file named by
//! `CHATFLOW_CONFIG`, overridden by environment variables (`__` separates
//! nested keys, e.g. `ENGINE__MAX_HOPS=32`).

use chatflow_conversation::FlowId;
use chatflow_flow::EngineConfig;
use chatflow_mediator::DispatcherConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming an optional configuration file.
pub const CONFIG_FILE_VAR: &str = "CHATFLOW_CONFIG";

/// Server configuration composed from library configs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP ingress listens on.
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Initial log filter directive, used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Dispatcher worker pool and queue sizing.
    #[serde(default)]
    pub mediator: DispatcherConfig,

    /// Flow engine settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Flow definitions to load at startup.
    #[serde(default)]
    pub flows: Vec<FlowSource>,
}

/// A flow definition file loaded at startup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FlowSource {
    /// Flow id the file is installed under.
    pub flow: FlowId,
    /// Path to the JSON definition.
    pub path: PathBuf,
}

fn default_http_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            log_filter: default_log_filter(),
            mediator: DispatcherConfig::default(),
            engine: EngineConfig::default(),
            flows: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from the file named by `CHATFLOW_CONFIG` (if set)
    /// and environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value is invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let file = std::env::var_os(CONFIG_FILE_VAR).map(PathBuf::from);
        Self::from_sources(file.as_deref())
    }

    /// Loads configuration from `file` (if any) overridden by environment
    /// variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value is invalid.
    pub fn from_sources(file: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(file) = file {
            builder = builder.add_source(config::File::from(file));
        }
        builder
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
