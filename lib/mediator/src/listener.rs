//! The consumer side of the mediator.

use crate::event::EventName;
use async_trait::async_trait;

/// Receives the events it has been registered for.
///
/// A listener is invoked once per delivered job, possibly concurrently with
/// other invocations of itself. It has no way to report failure back to the
/// producer, so implementations log their own errors.
#[async_trait]
pub trait Listener<P: Send + 'static>: Send + Sync {
    /// Handles one delivered event.
    async fn listen(&self, name: EventName, payload: P);
}
