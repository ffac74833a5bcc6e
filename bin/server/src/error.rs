//! Domain error types for server operations.

use chatflow_mediator::MediatorError;
use std::fmt;
use std::path::PathBuf;

/// Errors that stop the server from starting or running.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration could not be loaded.
    Config { details: String },
    /// A flow file listed in the configuration could not be read.
    FlowFile { path: PathBuf, details: String },
    /// The dispatcher refused a registration or an event.
    Mediator(MediatorError),
    /// The log filter could not be changed.
    LogFilter { details: String },
    /// The HTTP listener could not be bound.
    Bind { addr: String, details: String },
    /// The HTTP server failed while running.
    Serve { details: String },
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { details } => write!(f, "invalid configuration: {details}"),
            Self::FlowFile { path, details } => {
                write!(f, "failed to read flow file '{}': {details}", path.display())
            }
            Self::Mediator(e) => write!(f, "mediator error: {e}"),
            Self::LogFilter { details } => write!(f, "failed to change log filter: {details}"),
            Self::Bind { addr, details } => write!(f, "failed to bind {addr}: {details}"),
            Self::Serve { details } => write!(f, "server error: {details}"),
        }
    }
}

impl std::error::Error for ServerError {}

impl From<MediatorError> for ServerError {
    fn from(e: MediatorError) -> Self {
        Self::Mediator(e)
    }
}

impl From<config::ConfigError> for ServerError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config {
            details: e.to_string(),
        }
    }
}
