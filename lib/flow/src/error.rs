//! Error types for the flow engine.
//!
//! - `FlowError`: a flow definition could not be loaded
//! - `InterpretError`: interpretation of a lead was aborted
//!
//! Lookup misses (unknown lead, flow, step or option) are not errors; the
//! engine logs them and carries on.

use chatflow_conversation::FlowId;
use chatflow_core::LeadId;
use std::fmt;

/// Errors from loading flow definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// The uploaded configuration was empty.
    EmptyConfig { flow: FlowId },
    /// The uploaded configuration is not a valid flow document.
    ConfigParse { flow: FlowId, reason: String },
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyConfig { flow } => write!(f, "configuration for flow {flow} is empty"),
            Self::ConfigParse { flow, reason } => {
                write!(f, "failed to parse configuration for flow {flow}: {reason}")
            }
        }
    }
}

impl std::error::Error for FlowError {}

/// Errors that abort an interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterpretError {
    /// The lead made more step transitions than allowed in one go.
    HopLimitExceeded { lead: LeadId, limit: usize },
}

impl fmt::Display for InterpretError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HopLimitExceeded { lead, limit } => {
                write!(f, "lead {lead} exceeded {limit} step transitions")
            }
        }
    }
}

impl std::error::Error for InterpretError {}
