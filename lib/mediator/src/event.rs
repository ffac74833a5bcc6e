//! Event names and queued jobs.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Opaque identifier for a kind of notification.
///
/// The name is the dispatch key: at most one listener is bound per name.
/// Well-known names are declared as constants with [`EventName::from_static`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventName(Cow<'static, str>);

impl EventName {
    /// Creates an event name from a static string, usable in constants.
    #[must_use]
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Creates an event name from an owned string.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for EventName {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<String> for EventName {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// A unit of work on the dispatch queue: an event name plus its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job<P> {
    /// The event being delivered.
    pub name: EventName,
    /// The payload handed to the listener untouched.
    pub payload: P,
}

impl<P> Job<P> {
    /// Creates a new job.
    #[must_use]
    pub fn new(name: EventName, payload: P) -> Self {
        Self { name, payload }
    }
}
