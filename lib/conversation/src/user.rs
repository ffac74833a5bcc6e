//! Chat users.

use chatflow_core::{ConversationId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's identity on the chat platform, as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExternalUser {
    /// Platform-specific user (and private chat) id.
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub language_code: String,
    #[serde(default)]
    pub is_bot: bool,
}

impl ExternalUser {
    /// Creates an identity with only the platform id set.
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Sets the username.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Sets first and last name.
    #[must_use]
    pub fn with_name(mut self, first: impl Into<String>, last: impl Into<String>) -> Self {
        self.first_name = first.into();
        self.last_name = last.into();
        self
    }

    /// Best human-readable name: username, full name, either name part,
    /// falling back to the numeric id.
    #[must_use]
    pub fn display_name(&self) -> String {
        match (
            self.username.as_str(),
            self.first_name.as_str(),
            self.last_name.as_str(),
        ) {
            (username, _, _) if !username.is_empty() => username.to_string(),
            ("", first, last) if !first.is_empty() && !last.is_empty() => format!("{first} {last}"),
            ("", first, _) if !first.is_empty() => first.to_string(),
            ("", "", last) if !last.is_empty() => last.to_string(),
            _ => self.id.to_string(),
        }
    }
}

/// A user known to the platform.
///
/// Created once per external identity and reused afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Identity on the chat platform.
    pub external: ExternalUser,
    /// Correlation id for the conversation held with this user.
    pub conversation_id: ConversationId,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Creates a new user for an external identity.
    #[must_use]
    pub fn new(external: ExternalUser) -> Self {
        Self {
            id: UserId::new(),
            external,
            conversation_id: ConversationId::new(),
            created_at: Utc::now(),
        }
    }

    /// Returns the platform id of the user.
    #[must_use]
    pub fn external_id(&self) -> i64 {
        self.external.id
    }
}
