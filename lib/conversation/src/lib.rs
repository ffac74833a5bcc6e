//! Conversation data ports for the chatflow platform.
//!
//! This crate provides:
//!
//! - **Entities**: [`Lead`], [`User`], [`WaitAnswer`] and the flow/step keys
//! - **Events**: the [`AppEvent`] payloads carried by the mediator and their names
//! - **Ports**: [`UserRepository`], [`LeadRepository`] and [`Messenger`]
//! - **Adapters**: an [`InMemoryRepository`] and the [`MessengerListener`] bridge

pub mod error;
pub mod event;
pub mod lead;
pub mod memory;
pub mod messenger;
pub mod repository;
pub mod step;
pub mod user;

pub use error::{MessengerError, RepositoryError};
pub use event::{
    AppEvent, AwaitReply, FlowConfigUploaded, LeadCreated, LeadReplied, LeadStatusChanged,
    SendOptions, SendText, StatusChange,
};
pub use lead::{Lead, WaitAnswer};
pub use memory::InMemoryRepository;
pub use messenger::{Messenger, MessengerListener};
pub use repository::{LeadRepository, UserRepository};
pub use step::{FlowId, StepId, StepKind};
pub use user::{ExternalUser, User};
