//! Strongly-typed ID types for domain entities.
//!
//! Ids are ULIDs wrapped in a newtype per entity, so a lead id can never be
//! passed where a user id is expected. Display form is `<prefix>_<ulid>`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// An id string was neither `<prefix>_<ulid>` nor a bare ULID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    pub id_type: &'static str,
    pub reason: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {}", self.id_type, self.reason)
    }
}

impl std::error::Error for ParseIdError {}

/// Generates an id newtype with a display prefix.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Ulid);

        impl $name {
            /// Generates a fresh id.
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }

            /// Returns the underlying ULID.
            #[must_use]
            pub const fn as_ulid(&self) -> Ulid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                // Log lines carry the prefixed form; bare ULIDs come from storage.
                let raw = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);
                Ulid::from_str(raw)
                    .map(Self)
                    .map_err(|e| ParseIdError {
                        id_type: stringify!($name),
                        reason: e.to_string(),
                    })
            }
        }
    };
}

define_id!(
    /// Unique identifier for a chat user known to the platform.
    UserId,
    "usr"
);

define_id!(
    /// Unique identifier for a lead (one ongoing scripted conversation).
    LeadId,
    "lead"
);

define_id!(
    /// Correlation id tying a user to the conversation held with them.
    ConversationId,
    "conv"
);
