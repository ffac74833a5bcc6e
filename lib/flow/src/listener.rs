//! Connects the flow engine to the dispatcher.

use crate::engine::FlowEngine;
use async_trait::async_trait;
use chatflow_conversation::event::FLOW_EVENTS;
use chatflow_conversation::{AppEvent, LeadRepository, UserRepository};
use chatflow_mediator::{Dispatcher, EventName, Listener, MediatorError};
use std::sync::Arc;
use tracing::warn;

/// Routes flow events to the matching engine entry point.
pub struct FlowListener<R> {
    engine: Arc<FlowEngine<R>>,
}

impl<R> FlowListener<R>
where
    R: UserRepository + LeadRepository + 'static,
{
    /// Creates a listener driving `engine`.
    #[must_use]
    pub fn new(engine: Arc<FlowEngine<R>>) -> Self {
        Self { engine }
    }

    /// Binds a listener for `engine` to every flow event.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateRegistration` if a flow event is already bound.
    pub fn register(
        engine: Arc<FlowEngine<R>>,
        dispatcher: &Dispatcher<AppEvent>,
    ) -> Result<(), MediatorError> {
        dispatcher.register(Arc::new(Self::new(engine)), FLOW_EVENTS)
    }
}

#[async_trait]
impl<R> Listener<AppEvent> for FlowListener<R>
where
    R: UserRepository + LeadRepository + 'static,
{
    async fn listen(&self, name: EventName, payload: AppEvent) {
        match payload {
            AppEvent::LeadCreated(event) => self.engine.create_lead(event).await,
            AppEvent::LeadReplied(event) => self.engine.on_reply(event).await,
            AppEvent::LeadStatusChanged(event) => {
                self.engine.on_external_status_change(event).await;
            }
            AppEvent::FlowConfigUploaded(upload) => {
                self.engine.add_config(upload.flow, &upload.config);
            }
            other => {
                warn!(event = %name, kind = other.kind(), "flow listener received unexpected payload");
            }
        }
    }
}
