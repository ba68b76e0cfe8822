//! Account Core - Domain model, configuration and storage seams
//!
//! This crate defines the pieces of the account service that do not depend on HTTP:
//! - Role and user models, and the per-request `Principal` view
//! - Common error types
//! - Storage traits for credentials and notifications, with in-memory and
//!   PostgreSQL implementations
//! - Configuration management

pub mod config;
pub mod models;
pub mod store;

pub use config::{
    AppConfig, AuthConfig, BootstrapAdmin, ConfigError, DatabaseConfig, PasswordConfig,
};
pub use models::{NewUser, Notification, Principal, RoleName, User, UserProfile};
pub use store::{CredentialStore, MemoryStore, NotificationStore, PgStore};

use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for account operations
#[derive(Error, Debug)]
pub enum AccountError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Role {0} cannot be self-assigned at registration")]
    PrivilegedRole(RoleName),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AccountError {
    pub fn user_not_found(username: &str) -> Self {
        Self::NotFound(format!("User not found with username: {username}"))
    }
}

impl From<sqlx::Error> for AccountError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AccountError::Conflict("Username or email already exists".to_string())
            }
            _ => AccountError::Storage(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AccountError>;
