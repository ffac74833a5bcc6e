//! Messenger port and the listener that drives it from the dispatcher.

use crate::error::MessengerError;
use crate::event::{AppEvent, MESSENGER_EVENTS};
use async_trait::async_trait;
use chatflow_mediator::{Dispatcher, EventName, Listener, MediatorError};
use std::sync::Arc;
use tracing::{debug, warn};

/// Trait for a chat platform client.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Sends a text message to a chat.
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), MessengerError>;

    /// Sends a message offering `labels` as reply options.
    async fn send_options(
        &self,
        chat_id: i64,
        text: &str,
        labels: &[String],
    ) -> Result<(), MessengerError>;

    /// Routes the user's next message straight to their lead, bypassing
    /// command parsing.
    async fn mark_awaiting_reply(&self, user_id: i64) -> Result<(), MessengerError>;
}

/// Turns outbound messenger events into [`Messenger`] calls.
///
/// Delivery failures are logged and dropped.
pub struct MessengerListener<M> {
    messenger: Arc<M>,
}

impl<M: Messenger + 'static> MessengerListener<M> {
    /// Creates a listener over `messenger`.
    #[must_use]
    pub fn new(messenger: Arc<M>) -> Self {
        Self { messenger }
    }

    /// Binds a listener over `messenger` to every messenger event.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateRegistration` if a messenger event is already bound.
    pub fn register(
        messenger: Arc<M>,
        dispatcher: &Dispatcher<AppEvent>,
    ) -> Result<(), MediatorError> {
        dispatcher.register(Arc::new(Self::new(messenger)), MESSENGER_EVENTS)
    }
}

#[async_trait]
impl<M: Messenger + 'static> Listener<AppEvent> for MessengerListener<M> {
    async fn listen(&self, name: EventName, payload: AppEvent) {
        let result = match &payload {
            AppEvent::SendText(message) => {
                self.messenger
                    .send_text(message.chat_id, &message.text)
                    .await
            }
            AppEvent::SendOptions(message) => {
                self.messenger
                    .send_options(message.chat_id, &message.text, &message.labels)
                    .await
            }
            AppEvent::AwaitReply(request) => {
                self.messenger.mark_awaiting_reply(request.user_id).await
            }
            other => {
                debug!(event = %name, kind = other.kind(), "messenger ignored payload");
                return;
            }
        };

        if let Err(e) = result {
            warn!(event = %name, error = %e, "messenger call failed");
        }
    }
}
