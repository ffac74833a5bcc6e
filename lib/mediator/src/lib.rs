//! Event mediator for the chatflow platform.
//!
//! Every component talks to every other component through a [`Dispatcher`]:
//!
//! - **Registry**: each [`EventName`] is bound to exactly one [`Listener`]
//! - **Queue**: a single bounded FIFO of [`Job`]s; producers wait when it is full
//! - **Workers**: a fixed pool pops jobs and runs each delivery as its own task
//! - **After-events**: optional follow-up jobs chained onto a dispatched name
//!
//! The dispatcher never looks inside payloads. Delivery order across jobs is
//! only guaranteed up to queue admission.

pub mod dispatcher;
pub mod error;
pub mod event;
pub mod listener;

pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use error::MediatorError;
pub use event::{EventName, Job};
pub use listener::Listener;
