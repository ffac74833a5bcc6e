//! Keys that locate a lead inside a flow definition.
//!
//! Flow and step identifiers are strings. Uploaded configurations and CRM
//! webhooks often carry them as JSON integers, so both forms deserialize to
//! the same key: `5` and `"5"` name the same step.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire representation accepted for flow and step keys.
#[derive(Deserialize)]
#[serde(untagged)]
enum KeyRepr {
    Text(String),
    Integer(i64),
}

impl From<KeyRepr> for String {
    fn from(repr: KeyRepr) -> Self {
        match repr {
            KeyRepr::Text(text) => text,
            KeyRepr::Integer(number) => number.to_string(),
        }
    }
}

macro_rules! define_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(from = "KeyRepr", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a key from anything string-like.
            #[must_use]
            pub fn new(key: impl Into<String>) -> Self {
                Self(key.into())
            }

            /// Returns the key as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(key: &str) -> Self {
                Self(key.to_string())
            }
        }

        impl From<String> for $name {
            fn from(key: String) -> Self {
                Self(key)
            }
        }

        impl From<i64> for $name {
            fn from(key: i64) -> Self {
                Self(key.to_string())
            }
        }

        impl From<KeyRepr> for $name {
            fn from(repr: KeyRepr) -> Self {
                Self(repr.into())
            }
        }

        impl From<$name> for String {
            fn from(key: $name) -> Self {
                key.0
            }
        }
    };
}

define_key!(
    /// Identifier of a flow (a named conversation graph).
    FlowId
);

define_key!(
    /// Identifier of a step (block) within a flow.
    StepId
);

impl StepId {
    /// The step every flow is entered at.
    pub const ENTRY: &'static str = "0";

    /// Returns the entry step of a flow.
    #[must_use]
    pub fn entry() -> Self {
        Self::new(Self::ENTRY)
    }

    /// Returns true if this is the entry step.
    #[must_use]
    pub fn is_entry(&self) -> bool {
        self.0 == Self::ENTRY
    }
}

/// Which half of a block to run when resuming at a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Run the step's question instructions (what to say on entry).
    #[default]
    Question,
    /// Evaluate the step's answer instructions against a reply.
    Answer,
}

impl StepKind {
    /// Returns the wire name of the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Question => "question",
            Self::Answer => "answer",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
