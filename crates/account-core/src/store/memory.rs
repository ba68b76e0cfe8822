//! In-memory store
//!
//! All state sits behind a single `RwLock`, so the uniqueness check and the
//! insert in `insert_user` happen under one write guard.

use super::{CredentialStore, NotificationStore};
use crate::models::{NewUser, Notification, RoleName, User};
use crate::{AccountError, Result};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct MemoryState {
    roles: BTreeSet<RoleName>,
    users: HashMap<String, User>,
    notifications: Vec<Notification>,
}

/// In-memory credential and notification store
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users
    pub async fn user_count(&self) -> usize {
        self.state.read().await.users.len()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self.state.read().await.users.get(username).cloned())
    }

    async fn exists_by_username(&self, username: &str) -> Result<bool> {
        Ok(self.state.read().await.users.contains_key(username))
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state.users.values().any(|u| u.email == email))
    }

    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let mut state = self.state.write().await;

        if state.users.contains_key(&user.username)
            || state.users.values().any(|u| u.email == user.email)
        {
            return Err(AccountError::Conflict(format!(
                "Username or email already exists: {}",
                user.username
            )));
        }

        let user = user.into_user();
        state.users.insert(user.username.clone(), user.clone());
        Ok(user)
    }

    async fn replace_roles(&self, username: &str, roles: BTreeSet<RoleName>) -> Result<User> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(username)
            .ok_or_else(|| AccountError::user_not_found(username))?;

        user.roles = roles;
        Ok(user.clone())
    }

    async fn seed_roles(&self) -> Result<usize> {
        let mut state = self.state.write().await;
        if !state.roles.is_empty() {
            return Ok(0);
        }

        state.roles.extend(RoleName::ALL);
        Ok(RoleName::ALL.len())
    }

    async fn available_roles(&self) -> Result<BTreeSet<RoleName>> {
        Ok(self.state.read().await.roles.clone())
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert_notification(&self, user_id: Uuid, message: &str) -> Result<Notification> {
        let notification = Notification::new(user_id, message);
        self.state
            .write()
            .await
            .notifications
            .push(notification.clone());
        Ok(notification)
    }

    async fn notifications_for(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        let state = self.state.read().await;
        Ok(state
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect())
    }
}
