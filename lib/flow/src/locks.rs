//! Per-lead mutual exclusion.
//!
//! Inbound events for the same lead can be delivered concurrently. Every
//! engine entry point holds the lead's lock for the whole interpretation, so
//! step and wait-marker updates for one lead never interleave.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LeadKey = (String, i64);

/// Async locks keyed by (channel, external user id).
#[derive(Default)]
pub struct LeadLocks {
    locks: Mutex<HashMap<LeadKey, Arc<AsyncMutex<()>>>>,
}

impl LeadLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to the lead of `external_id` on `channel`.
    ///
    /// The lead is unlocked when the returned guard is dropped.
    pub async fn lock(&self, channel: &str, external_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Entries nobody holds or waits on can go.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(
                locks
                    .entry((channel.to_string(), external_id))
                    .or_default(),
            )
        };
        lock.lock_owned().await
    }

    /// Returns the number of leads currently locked or awaited.
    #[must_use]
    pub fn active(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|lock| Arc::strong_count(lock) > 1)
            .count()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
