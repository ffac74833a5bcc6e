//! Application events carried by the mediator.
//!
//! The dispatcher is generic over its payload; the platform instantiates it
//! with [`AppEvent`], one variant per payload kind. Event names live next to
//! the payloads they carry.

use crate::step::FlowId;
use crate::user::ExternalUser;
use chatflow_mediator::EventName;
use serde::{Deserialize, Serialize};

/// A new chat user started a conversation.
pub const LEAD_CREATED: EventName = EventName::from_static("flow.lead.created");
/// A chat user replied in an ongoing conversation.
pub const LEAD_REPLIED: EventName = EventName::from_static("flow.lead.replied");
/// An external system moved one or more leads to another flow.
pub const LEAD_STATUS_CHANGED: EventName = EventName::from_static("flow.lead.status_changed");
/// A flow definition was uploaded.
pub const FLOW_CONFIG_UPLOADED: EventName = EventName::from_static("flow.config.uploaded");

/// Send a plain text message.
pub const SEND_TEXT: EventName = EventName::from_static("messenger.text.send");
/// Send a message with reply options.
pub const SEND_OPTIONS: EventName = EventName::from_static("messenger.options.send");
/// Route the user's next message straight to their lead.
pub const AWAIT_REPLY: EventName = EventName::from_static("messenger.reply.await");

/// Shut the application down.
pub const APP_EXIT: EventName = EventName::from_static("app.exit");
/// Switch logging to debug level.
pub const LOG_MODE_DEBUG: EventName = EventName::from_static("log.mode.debug");
/// Switch logging back to info level.
pub const LOG_MODE_INFO: EventName = EventName::from_static("log.mode.info");

/// Events consumed by the flow engine.
pub const FLOW_EVENTS: [EventName; 4] = [
    LEAD_CREATED,
    LEAD_REPLIED,
    LEAD_STATUS_CHANGED,
    FLOW_CONFIG_UPLOADED,
];

/// Events consumed by the messenger adapter.
pub const MESSENGER_EVENTS: [EventName; 3] = [SEND_TEXT, SEND_OPTIONS, AWAIT_REPLY];

/// Process-level control events.
pub const SYSTEM_EVENTS: [EventName; 3] = [APP_EXIT, LOG_MODE_DEBUG, LOG_MODE_INFO];

/// Payload of [`LEAD_CREATED`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadCreated {
    pub user: ExternalUser,
    /// Source tag, e.g. the payload of a `/start` link.
    #[serde(default)]
    pub source: String,
    /// Channel override; the engine's default channel is used when absent.
    #[serde(default)]
    pub channel: Option<String>,
}

/// Payload of [`LEAD_REPLIED`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadReplied {
    pub user: ExternalUser,
    #[serde(default)]
    pub channel: Option<String>,
    pub message: String,
}

/// One entry of a [`LeadStatusChanged`] webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    /// External id of the lead's user.
    #[serde(alias = "id")]
    pub external_id: i64,
    /// Flow the lead now belongs to.
    #[serde(alias = "pipeline_id")]
    pub flow: FlowId,
}

/// Payload of [`LEAD_STATUS_CHANGED`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadStatusChanged {
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(alias = "status")]
    pub statuses: Vec<StatusChange>,
}

/// Payload of [`FLOW_CONFIG_UPLOADED`]: the raw JSON text of a flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowConfigUploaded {
    pub flow: FlowId,
    pub config: String,
}

/// Payload of [`SEND_TEXT`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendText {
    pub chat_id: i64,
    pub text: String,
}

/// Payload of [`SEND_OPTIONS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOptions {
    pub chat_id: i64,
    pub text: String,
    pub labels: Vec<String>,
}

/// Payload of [`AWAIT_REPLY`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwaitReply {
    /// External id of the user whose next message is awaited.
    pub user_id: i64,
}

/// Every payload that travels through the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    LeadCreated(LeadCreated),
    LeadReplied(LeadReplied),
    LeadStatusChanged(LeadStatusChanged),
    FlowConfigUploaded(FlowConfigUploaded),
    SendText(SendText),
    SendOptions(SendOptions),
    AwaitReply(AwaitReply),
    /// Control events whose name is the whole message.
    System,
}

impl AppEvent {
    /// Returns a short name for the payload kind, for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LeadCreated(_) => "lead_created",
            Self::LeadReplied(_) => "lead_replied",
            Self::LeadStatusChanged(_) => "lead_status_changed",
            Self::FlowConfigUploaded(_) => "flow_config_uploaded",
            Self::SendText(_) => "send_text",
            Self::SendOptions(_) => "send_options",
            Self::AwaitReply(_) => "await_reply",
            Self::System => "system",
        }
    }
}

macro_rules! impl_from_payload {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for AppEvent {
                fn from(payload: $variant) -> Self {
                    Self::$variant(payload)
                }
            }
        )*
    };
}

impl_from_payload!(
    LeadCreated,
    LeadReplied,
    LeadStatusChanged,
    FlowConfigUploaded,
    SendText,
    SendOptions,
    AwaitReply,
);
