//! Account domain models
//!
//! - RoleName: the fixed set of roles a user may hold
//! - User: a stored account with its hashed password and role set
//! - Principal: the per-request view of an authenticated user
//! - Notification: a message delivered to a user

use crate::AccountError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Role enum
///
/// Roles are unique by name and a user may hold several at once.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoleName {
    User,
    Admin,
    Manager,
}

impl RoleName {
    /// Every role known to the service, in seeding order
    pub const ALL: [RoleName; 3] = [RoleName::User, RoleName::Admin, RoleName::Manager];

    /// Convert role to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleName::User => "USER",
            RoleName::Admin => "ADMIN",
            RoleName::Manager => "MANAGER",
        }
    }

    /// Roles that grant more than ordinary account access
    pub fn is_privileged(&self) -> bool {
        matches!(self, RoleName::Admin | RoleName::Manager)
    }
}

impl FromStr for RoleName {
    type Err = AccountError;

    /// Accepts `ADMIN`, `admin` and the prefixed `ROLE_ADMIN` forms
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        let name = upper.strip_prefix("ROLE_").unwrap_or(&upper);
        match name {
            "USER" => Ok(RoleName::User),
            "ADMIN" => Ok(RoleName::Admin),
            "MANAGER" => Ok(RoleName::Manager),
            _ => Err(AccountError::InvalidRole(s.to_string())),
        }
    }
}

impl std::fmt::Display for RoleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parse a list of role names, failing on the first unrecognized one
pub fn parse_roles<I, S>(names: I) -> Result<BTreeSet<RoleName>, AccountError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names.into_iter().map(|n| n.as_ref().parse()).collect()
}

/// User account model
///
/// This maps to the `users` and `user_roles` tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,

    /// Unique login name
    pub username: String,

    /// Unique email address
    pub email: String,

    /// Argon2id PHC string. Never serialized in API responses.
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub roles: BTreeSet<RoleName>,

    pub created_at: DateTime<Utc>,
}

impl User {
    /// Convert user to public representation (without the password hash)
    pub fn to_profile(&self) -> UserProfile {
        UserProfile {
            username: self.username.clone(),
            email: self.email.clone(),
            roles: self.roles.clone(),
        }
    }
}

/// Input for creating a user. The password must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub roles: BTreeSet<RoleName>,
}

impl NewUser {
    pub fn into_user(self) -> User {
        User {
            id: Uuid::new_v4(),
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            roles: self.roles,
            created_at: Utc::now(),
        }
    }
}

/// Public user representation (safe for API responses)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub username: String,
    pub email: String,
    pub roles: BTreeSet<RoleName>,
}

/// Authenticated identity bound to a single request.
///
/// Built from verified token claims after the subject has been confirmed to
/// still exist. It is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub username: String,
    pub roles: BTreeSet<RoleName>,
}

impl Principal {
    pub fn new(username: impl Into<String>, roles: impl IntoIterator<Item = RoleName>) -> Self {
        Self {
            username: username.into(),
            roles: roles.into_iter().collect(),
        }
    }

    /// Check if the principal holds a specific role
    pub fn has_role(&self, role: RoleName) -> bool {
        self.roles.contains(&role)
    }

    /// True when the principal's roles intersect `required`
    pub fn has_any_role(&self, required: &BTreeSet<RoleName>) -> bool {
        !self.roles.is_disjoint(required)
    }
}

/// Notification delivered to a user
///
/// This maps to the `notifications` table.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(user_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            message: message.into(),
            sent_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_name_parsing() {
        assert_eq!("ADMIN".parse::<RoleName>().unwrap(), RoleName::Admin);
        assert_eq!("manager".parse::<RoleName>().unwrap(), RoleName::Manager);
        assert_eq!("ROLE_USER".parse::<RoleName>().unwrap(), RoleName::User);
        assert_eq!(" role_admin ".parse::<RoleName>().unwrap(), RoleName::Admin);

        let err = "SUPERUSER".parse::<RoleName>().unwrap_err();
        assert!(matches!(err, AccountError::InvalidRole(name) if name == "SUPERUSER"));
    }

    #[test]
    fn test_role_name_serde() {
        let json = serde_json::to_string(&RoleName::Manager).unwrap();
        assert_eq!(json, "\"MANAGER\"");

        let role: RoleName = serde_json::from_str("\"ADMIN\"").unwrap();
        assert_eq!(role, RoleName::Admin);
    }

    #[test]
    fn test_parse_roles_deduplicates() {
        let roles = parse_roles(["USER", "ROLE_USER", "admin"]).unwrap();
        assert_eq!(roles.len(), 2);
        assert!(roles.contains(&RoleName::User));
        assert!(roles.contains(&RoleName::Admin));

        assert!(parse_roles(["USER", "OWNER"]).is_err());
    }

    #[test]
    fn test_user_profile_hides_password() {
        let user = NewUser {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "secret_hash".to_string(),
            roles: BTreeSet::from([RoleName::User]),
        }
        .into_user();

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret_hash"));

        let profile = user.to_profile();
        assert_eq!(profile.username, "alice");
        assert_eq!(profile.roles, BTreeSet::from([RoleName::User]));
    }

    #[test]
    fn test_principal_role_checks() {
        let principal = Principal::new("bob", [RoleName::User, RoleName::Manager]);

        assert!(principal.has_role(RoleName::Manager));
        assert!(!principal.has_role(RoleName::Admin));
        assert!(principal.has_any_role(&BTreeSet::from([RoleName::Admin, RoleName::Manager])));
        assert!(!principal.has_any_role(&BTreeSet::from([RoleName::Admin])));
        assert!(!principal.has_any_role(&BTreeSet::new()));
    }
}
