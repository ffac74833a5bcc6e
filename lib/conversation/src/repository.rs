//! Storage ports for users and leads.
//!
//! Implementations are best-effort: the flow engine logs failures and keeps
//! going with its in-memory copy of the lead.

use crate::error::RepositoryError;
use crate::lead::Lead;
use crate::user::User;
use async_trait::async_trait;
use chatflow_core::LeadId;

/// Trait for user storage.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Stores a user and returns the stored record.
    async fn add_user(&self, user: User) -> Result<User, RepositoryError>;

    /// Gets a user by their platform id.
    async fn user_by_external_id(&self, external_id: i64) -> Result<User, RepositoryError>;
}

/// Trait for lead storage.
#[async_trait]
pub trait LeadRepository: Send + Sync {
    /// Stores a new lead and returns the stored record.
    async fn add_lead(&self, lead: Lead) -> Result<Lead, RepositoryError>;

    /// Replaces the stored lead with `id`.
    async fn update_lead(&self, id: LeadId, lead: &Lead) -> Result<(), RepositoryError>;

    /// Gets the current lead for a user on a channel.
    async fn lead_by_external_id(
        &self,
        external_id: i64,
        channel: &str,
    ) -> Result<Lead, RepositoryError>;
}
