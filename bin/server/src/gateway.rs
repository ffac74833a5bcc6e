//! Turns inbound chat messages into flow events.
//!
//! A user whose reply is awaited always reaches their lead, even with text
//! that looks like a command. Otherwise `/start <source>` opens a new lead
//! and anything else is a reply at the lead's current step.

use crate::messenger::LogMessenger;
use chatflow_conversation::event::{LEAD_CREATED, LEAD_REPLIED};
use chatflow_conversation::{AppEvent, ExternalUser, LeadCreated, LeadReplied};
use chatflow_mediator::{Dispatcher, EventName, MediatorError};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

const START_COMMAND: &str = "/start";

/// A message received from the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InboundMessage {
    /// The sender.
    pub user: ExternalUser,
    /// Message text.
    pub text: String,
    /// Channel the message arrived on; the engine default when absent.
    #[serde(default)]
    pub channel: Option<String>,
}

/// Routes inbound chat messages onto the dispatcher.
pub struct ChatGateway {
    messenger: Arc<LogMessenger>,
    dispatcher: Arc<Dispatcher<AppEvent>>,
}

impl ChatGateway {
    #[must_use]
    pub fn new(messenger: Arc<LogMessenger>, dispatcher: Arc<Dispatcher<AppEvent>>) -> Self {
        Self {
            messenger,
            dispatcher,
        }
    }

    /// Publishes `message` as a lead creation or a reply and returns the
    /// event name used.
    ///
    /// # Errors
    ///
    /// Returns the dispatcher error if the event could not be enqueued.
    pub async fn route(&self, message: InboundMessage) -> Result<EventName, MediatorError> {
        let InboundMessage {
            user,
            text,
            channel,
        } = message;

        if !self.messenger.take_awaiting(user.id) {
            if let Some(source) = start_source(&text) {
                debug!(user = user.id, source, "start command");
                let event = LeadCreated {
                    user,
                    source: source.to_string(),
                    channel,
                };
                self.dispatcher.dispatch(LEAD_CREATED, event.into()).await?;
                return Ok(LEAD_CREATED);
            }
        }

        let event = LeadReplied {
            user,
            channel,
            message: text,
        };
        self.dispatcher.dispatch(LEAD_REPLIED, event.into()).await?;
        Ok(LEAD_REPLIED)
    }
}

/// Returns the payload of a `/start` command (possibly empty), or `None` if
/// `text` is not one.
fn start_source(text: &str) -> Option<&str> {
    let rest = text.trim().strip_prefix(START_COMMAND)?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(rest.trim())
}
