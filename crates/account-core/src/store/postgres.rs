//! PostgreSQL credential and notification store
//!
//! Uses SQLx runtime queries; the schema is created on startup with
//! `CREATE TABLE IF NOT EXISTS`.

use super::{CredentialStore, NotificationStore};
use crate::models::{NewUser, Notification, RoleName, User};
use crate::{AccountError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::collections::BTreeSet;
use uuid::Uuid;

const SCHEMA: [&str; 4] = [
    r#"
    CREATE TABLE IF NOT EXISTS roles (
        name TEXT PRIMARY KEY
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        username VARCHAR(50) NOT NULL UNIQUE,
        email VARCHAR(100) NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_roles (
        user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        role TEXT NOT NULL REFERENCES roles(name),
        PRIMARY KEY (user_id, role)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS notifications (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        message TEXT NOT NULL,
        sent_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
];

const SELECT_USER: &str = r#"
    SELECT
        u.id, u.username, u.email, u.password_hash, u.created_at,
        COALESCE(array_agg(ur.role) FILTER (WHERE ur.role IS NOT NULL), '{}') AS roles
    FROM users u
    LEFT JOIN user_roles ur ON ur.user_id = u.id
    WHERE u.username = $1
    GROUP BY u.id
"#;

/// PostgreSQL-backed store
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and make sure the schema exists
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| AccountError::Storage(format!("PostgreSQL connection failed: {e}")))?;

        let store = Self::from_pool(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Create from an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| AccountError::Storage(format!("Failed to create schema: {e}")))?;
        }
        Ok(())
    }
}

/// User row joined with its aggregated roles
#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
    roles: Vec<String>,
}

impl TryFrom<UserRow> for User {
    type Error = AccountError;

    fn try_from(row: UserRow) -> Result<Self> {
        let roles = row
            .roles
            .iter()
            .map(|r| {
                r.parse::<RoleName>()
                    .map_err(|_| AccountError::Storage(format!("Unknown role in store: {r}")))
            })
            .collect::<Result<BTreeSet<_>>>()?;

        Ok(User {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            roles,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct NotificationRow {
    id: Uuid,
    user_id: Uuid,
    message: String,
    sent_at: DateTime<Utc>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Notification {
            id: row.id,
            user_id: row.user_id,
            message: row.message,
            sent_at: row.sent_at,
        }
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(SELECT_USER)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AccountError::Storage(format!("Failed to fetch user: {e}")))?;

        row.map(User::try_from).transpose()
    }

    async fn exists_by_username(&self, username: &str) -> Result<bool> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AccountError::Storage(format!("Failed to check username: {e}")))
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AccountError::Storage(format!("Failed to check email: {e}")))
    }

    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let user = user.into_user();
        let mut tx = self.pool.begin().await?;

        // Unique violations surface as AccountError::Conflict via From<sqlx::Error>
        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&mut *tx)
        .await?;

        for role in &user.roles {
            sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2)")
                .bind(user.id)
                .bind(role.as_str())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(user)
    }

    async fn replace_roles(&self, username: &str, roles: BTreeSet<RoleName>) -> Result<User> {
        let mut tx = self.pool.begin().await?;

        let user_id: Uuid = sqlx::query_scalar("SELECT id FROM users WHERE username = $1 FOR UPDATE")
            .bind(username)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AccountError::user_not_found(username))?;

        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        for role in &roles {
            sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2)")
                .bind(user_id)
                .bind(role.as_str())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        self.find_by_username(username)
            .await?
            .ok_or_else(|| AccountError::user_not_found(username))
    }

    async fn seed_roles(&self) -> Result<usize> {
        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM roles")
            .fetch_one(&self.pool)
            .await?;
        if existing > 0 {
            return Ok(0);
        }

        let mut inserted = 0;
        for role in RoleName::ALL {
            let result = sqlx::query("INSERT INTO roles (name) VALUES ($1) ON CONFLICT DO NOTHING")
                .bind(role.as_str())
                .execute(&self.pool)
                .await?;
            inserted += result.rows_affected() as usize;
        }
        Ok(inserted)
    }

    async fn available_roles(&self) -> Result<BTreeSet<RoleName>> {
        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM roles")
            .fetch_all(&self.pool)
            .await?;

        // Rows that no longer name a known role are ignored
        Ok(names.iter().filter_map(|n| n.parse().ok()).collect())
    }
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn insert_notification(&self, user_id: Uuid, message: &str) -> Result<Notification> {
        let row: NotificationRow = sqlx::query_as(
            r#"
            INSERT INTO notifications (id, user_id, message, sent_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING id, user_id, message, sent_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(message)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AccountError::Storage(format!("Failed to store notification: {e}")))?;

        Ok(row.into())
    }

    async fn notifications_for(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            "SELECT id, user_id, message, sent_at FROM notifications WHERE user_id = $1 ORDER BY sent_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AccountError::Storage(format!("Failed to fetch notifications: {e}")))?;

        Ok(rows.into_iter().map(Notification::from).collect())
    }
}
