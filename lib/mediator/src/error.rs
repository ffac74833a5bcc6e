//! Error types for the mediator crate.
//!
//! All of these are returned synchronously to the caller of
//! [`Dispatcher::register`](crate::Dispatcher::register) or
//! [`Dispatcher::dispatch`](crate::Dispatcher::dispatch). None of them is fatal.

use crate::event::EventName;
use std::fmt;

/// Errors from registering listeners or dispatching events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediatorError {
    /// The event name already has a bound listener.
    DuplicateRegistration { name: EventName },
    /// No listener is bound to the event name; nothing was enqueued.
    UnregisteredEvent { name: EventName },
    /// The job queue has been closed and no longer accepts work.
    Closed,
}

impl fmt::Display for MediatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateRegistration { name } => {
                write!(f, "the '{name}' event is already registered")
            }
            Self::UnregisteredEvent { name } => {
                write!(f, "the '{name}' event is not registered")
            }
            Self::Closed => write!(f, "dispatcher job queue is closed"),
        }
    }
}

impl std::error::Error for MediatorError {}
