//! Error types for the conversation ports.
//!
//! - `RepositoryError`: failures reported by lead/user storage
//! - `MessengerError`: failures reported by the chat platform adapter

use std::fmt;

/// Errors from repository operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// No record matched the lookup.
    NotFound { entity: &'static str, key: String },
    /// The store rejected or failed the operation.
    StorageFailed { reason: String },
}

impl RepositoryError {
    /// Returns true for lookup misses, which callers treat as benign.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { entity, key } => write!(f, "{entity} not found: {key}"),
            Self::StorageFailed { reason } => write!(f, "storage failed: {reason}"),
        }
    }
}

impl std::error::Error for RepositoryError {}

/// Errors from messenger operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessengerError {
    /// The platform did not accept the message.
    DeliveryFailed { chat_id: i64, reason: String },
    /// The platform connection is unavailable.
    Unavailable { reason: String },
}

impl fmt::Display for MessengerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeliveryFailed { chat_id, reason } => {
                write!(f, "delivery to chat {chat_id} failed: {reason}")
            }
            Self::Unavailable { reason } => write!(f, "messenger unavailable: {reason}"),
        }
    }
}

impl std::error::Error for MessengerError {}
