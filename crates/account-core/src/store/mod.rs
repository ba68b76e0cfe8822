//! Storage seams for accounts and notifications
//!
//! The HTTP layer only sees these traits. `MemoryStore` backs tests and
//! single-process development; `PgStore` backs deployments.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::models::{NewUser, Notification, RoleName, User};
use crate::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;
use uuid::Uuid;

/// Lookup and mutation of user credentials and role assignments
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Find a user by login name
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn exists_by_username(&self, username: &str) -> Result<bool>;

    async fn exists_by_email(&self, email: &str) -> Result<bool>;

    /// Insert a new user.
    ///
    /// Fails with `AccountError::Conflict` when the username or email is taken;
    /// the store is left unchanged in that case.
    async fn insert_user(&self, user: NewUser) -> Result<User>;

    /// Replace the full role set of an existing user.
    ///
    /// Fails with `AccountError::NotFound` when the user does not exist.
    async fn replace_roles(&self, username: &str, roles: BTreeSet<RoleName>) -> Result<User>;

    /// Insert the fixed role set if no roles exist yet. Returns the number inserted.
    async fn seed_roles(&self) -> Result<usize>;

    /// Roles currently present in the store
    async fn available_roles(&self) -> Result<BTreeSet<RoleName>>;
}

/// Persistence for user notifications
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert_notification(&self, user_id: Uuid, message: &str) -> Result<Notification>;

    /// Notifications for a user, oldest first
    async fn notifications_for(&self, user_id: Uuid) -> Result<Vec<Notification>>;
}
