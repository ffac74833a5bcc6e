//! Flow engine for the chatflow platform.
//!
//! A flow is a JSON graph of steps. Each step is a [`Block`] holding two
//! instruction lists:
//!
//! - **question**: run when a lead enters the step (say something, jump,
//!   switch flow, wait for a reply)
//! - **answer**: run when a lead's reply is evaluated at the step (match a
//!   reply option and run its nested instructions)
//!
//! The [`FlowEngine`] owns the loaded definitions, advances leads through
//! them and emits outbound messenger events on the dispatcher. The
//! [`FlowListener`] connects the engine to the flow events.

pub mod config;
pub mod definition;
pub mod engine;
pub mod error;
pub mod instruction;
pub mod listener;
pub mod locks;

#[cfg(test)]
mod testing;

pub use config::EngineConfig;
pub use definition::{Block, FlowDefinition};
pub use engine::FlowEngine;
pub use error::{FlowError, InterpretError};
pub use instruction::{AnswerOption, Instruction};
pub use listener::FlowListener;
pub use locks::LeadLocks;
