//! A messenger that writes outbound messages to the log.
//!
//! Stands in for a chat platform client. It also keeps the set of users
//! whose next message must go straight to their lead.

use async_trait::async_trait;
use chatflow_conversation::{Messenger, MessengerError};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::info;

/// Logs every outbound message instead of delivering it.
#[derive(Default)]
pub struct LogMessenger {
    awaiting: Mutex<HashSet<i64>>,
    sent: AtomicUsize,
}

impl LogMessenger {
    /// Creates a messenger with nobody awaited.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes the awaiting-reply mark for `user_id`, returning whether it
    /// was set.
    pub fn take_awaiting(&self, user_id: i64) -> bool {
        self.awaiting
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&user_id)
    }

    /// Returns true if the next message of `user_id` is awaited.
    #[must_use]
    pub fn is_awaiting(&self, user_id: i64) -> bool {
        self.awaiting
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&user_id)
    }

    /// Returns the number of messages sent so far.
    #[must_use]
    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Messenger for LogMessenger {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), MessengerError> {
        info!(chat_id, text, "send text");
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn send_options(
        &self,
        chat_id: i64,
        text: &str,
        labels: &[String],
    ) -> Result<(), MessengerError> {
        info!(chat_id, text, options = ?labels, "send options");
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn mark_awaiting_reply(&self, user_id: i64) -> Result<(), MessengerError> {
        self.awaiting
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id);
        Ok(())
    }
}
