//! Core domain types and utilities for the chatflow platform.
//!
//! This crate provides the foundational types, error handling, and shared
//! identifiers used by the mediator, the conversation ports and the flow engine.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ConversationId, LeadId, ParseIdError, UserId};
