//! In-memory repository for development and tests.

use crate::error::RepositoryError;
use crate::lead::Lead;
use crate::repository::{LeadRepository, UserRepository};
use crate::user::User;
use async_trait::async_trait;
use chatflow_core::LeadId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

#[derive(Default)]
struct Store {
    users: HashMap<i64, User>,
    leads: HashMap<LeadId, Lead>,
    /// (channel, external id) -> most recently added lead.
    current: HashMap<(String, i64), LeadId>,
}

/// Keeps users and leads in process memory.
///
/// Implements both [`UserRepository`] and [`LeadRepository`]. Writes can be
/// made to fail on demand to exercise persistence-failure paths.
#[derive(Default)]
pub struct InMemoryRepository {
    store: RwLock<Store>,
    fail_writes: AtomicBool,
}

impl InMemoryRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail with `StorageFailed` (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns the stored copy of a lead.
    #[must_use]
    pub fn lead(&self, id: LeadId) -> Option<Lead> {
        self.read(|store| store.leads.get(&id).cloned())
    }

    /// Returns every stored lead.
    #[must_use]
    pub fn leads(&self) -> Vec<Lead> {
        self.read(|store| store.leads.values().cloned().collect())
    }

    /// Returns the number of stored users.
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.read(|store| store.users.len())
    }

    fn check_writable(&self) -> Result<(), RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::StorageFailed {
                reason: "writes disabled".to_string(),
            });
        }
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&Store) -> T) -> T {
        f(&self.store.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write<T>(&self, f: impl FnOnce(&mut Store) -> T) -> T {
        f(&mut self.store.write().unwrap_or_else(PoisonError::into_inner))
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn add_user(&self, user: User) -> Result<User, RepositoryError> {
        self.check_writable()?;
        Ok(self.write(|store| {
            store
                .users
                .entry(user.external.id)
                .or_insert(user)
                .clone()
        }))
    }

    async fn user_by_external_id(&self, external_id: i64) -> Result<User, RepositoryError> {
        self.read(|store| store.users.get(&external_id).cloned())
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "user",
                key: external_id.to_string(),
            })
    }
}

#[async_trait]
impl LeadRepository for InMemoryRepository {
    async fn add_lead(&self, lead: Lead) -> Result<Lead, RepositoryError> {
        self.check_writable()?;
        self.write(|store| {
            store
                .current
                .insert((lead.channel.clone(), lead.external_id()), lead.id);
            store.leads.insert(lead.id, lead.clone());
        });
        Ok(lead)
    }

    async fn update_lead(&self, id: LeadId, lead: &Lead) -> Result<(), RepositoryError> {
        self.check_writable()?;
        self.write(|store| match store.leads.get_mut(&id) {
            Some(stored) => {
                *stored = lead.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound {
                entity: "lead",
                key: id.to_string(),
            }),
        })
    }

    async fn lead_by_external_id(
        &self,
        external_id: i64,
        channel: &str,
    ) -> Result<Lead, RepositoryError> {
        self.read(|store| {
            store
                .current
                .get(&(channel.to_string(), external_id))
                .and_then(|id| store.leads.get(id))
                .cloned()
        })
        .ok_or_else(|| RepositoryError::NotFound {
            entity: "lead",
            key: format!("{channel}:{external_id}"),
        })
    }
}
