//! Account service layer
//!
//! Registration, login, role management and notifications on top of the
//! storage traits. Argon2 work runs on the blocking pool.

use super::jwt::TokenCodec;
use super::password::{hash_password_with_config, verify_password};
use account_core::models::parse_roles;
use account_core::{
    AccountError, CredentialStore, NewUser, Notification, NotificationStore, PasswordConfig,
    Principal, RoleName, User, UserProfile,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

type Result<T> = std::result::Result<T, AccountError>;

/// User registration request
#[derive(Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 50, message = "Username must be between 3 and 50 characters"))]
    pub username: String,

    #[validate(length(min = 6, max = 100, message = "Password must be between 6 and 100 characters"))]
    pub password: String,

    #[validate(
        email(message = "Email should be valid"),
        length(max = 100, message = "Email must be at most 100 characters")
    )]
    pub email: String,

    /// Requested role names, e.g. `["ROLE_USER"]`. USER is always granted.
    #[serde(default)]
    pub roles: Option<Vec<String>>,
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("email", &self.email)
            .field("roles", &self.roles)
            .finish()
    }
}

/// User login request
#[derive(Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Login response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    /// `Bearer <token>`, ready to send as the Authorization header
    pub token: String,
}

/// Replacement role set for a user
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateRolesRequest {
    /// Role names such as `["ROLE_USER", "ROLE_MANAGER"]`
    pub roles: Vec<String>,
}

/// Notification to deliver
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SendNotificationRequest {
    pub message: String,
}

/// Account operations
pub struct AccountService {
    store: Arc<dyn CredentialStore>,
    codec: Arc<TokenCodec>,
    password: PasswordConfig,
    allow_privileged_registration: bool,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        codec: Arc<TokenCodec>,
        password: PasswordConfig,
        allow_privileged_registration: bool,
    ) -> Self {
        Self {
            store,
            codec,
            password,
            allow_privileged_registration,
        }
    }

    /// Register a new user
    ///
    /// Role names are checked before the uniqueness check, so an invalid
    /// request fails the same way whether or not the name is taken.
    pub async fn register(&self, request: RegisterRequest) -> Result<User> {
        request
            .validate()
            .map_err(|e| AccountError::Validation(e.to_string()))?;

        let roles = self
            .registration_roles(request.roles.as_deref().unwrap_or_default())
            .await?;

        if self.store.exists_by_username(&request.username).await?
            || self.store.exists_by_email(&request.email).await?
        {
            return Err(AccountError::Conflict(format!(
                "Username or email already exists: {}",
                request.username
            )));
        }

        let password_hash = self.hash(request.password).await?;

        self.store
            .insert_user(NewUser {
                username: request.username,
                email: request.email,
                password_hash,
                roles,
            })
            .await
    }

    async fn registration_roles(&self, names: &[String]) -> Result<BTreeSet<RoleName>> {
        let mut roles = self.known_roles(names).await?;

        if !self.allow_privileged_registration {
            if let Some(role) = roles.iter().find(|r| r.is_privileged()) {
                return Err(AccountError::PrivilegedRole(*role));
            }
        }

        roles.insert(RoleName::User);
        Ok(roles)
    }

    /// Parse role names and require each to exist in the store
    async fn known_roles(&self, names: &[String]) -> Result<BTreeSet<RoleName>> {
        let roles = parse_roles(names)?;
        let available = self.store.available_roles().await?;

        match roles.iter().find(|r| !available.contains(r)) {
            Some(missing) => Err(AccountError::InvalidRole(missing.to_string())),
            None => Ok(roles),
        }
    }

    /// Check credentials and issue a session token
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse> {
        let user = self.get_user(&request.username).await?;

        if !self.verify(request.password, user.password_hash.clone()).await? {
            return Err(AccountError::Unauthorized(
                "Invalid username or password".to_string(),
            ));
        }

        let token = self
            .codec
            .issue_session(&user.username, user.roles.iter().copied())
            .map_err(|e| AccountError::Other(e.into()))?;

        Ok(LoginResponse {
            token: format!("Bearer {token}"),
        })
    }

    /// Replace the role set of an existing user
    pub async fn update_roles(&self, username: &str, names: &[String]) -> Result<User> {
        if names.is_empty() {
            return Err(AccountError::Validation(
                "At least one role is required".to_string(),
            ));
        }

        if !self.store.exists_by_username(username).await? {
            return Err(AccountError::user_not_found(username));
        }

        let roles = self.known_roles(names).await?;
        self.store.replace_roles(username, roles).await
    }

    /// Create a user with an explicit role set, skipping the registration
    /// privilege check. Returns `None` when the username already exists.
    pub async fn provision(
        &self,
        username: &str,
        email: &str,
        password: &str,
        roles: BTreeSet<RoleName>,
    ) -> Result<Option<User>> {
        if self.store.exists_by_username(username).await? {
            return Ok(None);
        }

        let password_hash = self.hash(password.to_string()).await?;
        let user = self
            .store
            .insert_user(NewUser {
                username: username.to_string(),
                email: email.to_string(),
                password_hash,
                roles,
            })
            .await?;

        Ok(Some(user))
    }

    pub async fn get_user(&self, username: &str) -> Result<User> {
        self.store
            .find_by_username(username)
            .await?
            .ok_or_else(|| AccountError::user_not_found(username))
    }

    /// Profile of the authenticated caller
    pub async fn profile(&self, principal: &Principal) -> Result<UserProfile> {
        Ok(self.get_user(&principal.username).await?.to_profile())
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool> {
        self.store.exists_by_username(username).await
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        self.store.exists_by_email(email).await
    }

    async fn hash(&self, password: String) -> Result<String> {
        let config = self.password.clone();
        tokio::task::spawn_blocking(move || hash_password_with_config(&password, &config))
            .await
            .map_err(|e| AccountError::Other(e.into()))?
            .map_err(|e| AccountError::Other(e.into()))
    }

    async fn verify(&self, password: String, hash: String) -> Result<bool> {
        tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| AccountError::Other(e.into()))?
            .map_err(|e| AccountError::Other(e.into()))
    }
}

/// Notification delivery
pub struct NotificationService {
    users: Arc<dyn CredentialStore>,
    store: Arc<dyn NotificationStore>,
}

impl NotificationService {
    pub fn new(users: Arc<dyn CredentialStore>, store: Arc<dyn NotificationStore>) -> Self {
        Self { users, store }
    }

    pub async fn send(&self, username: &str, message: &str) -> Result<Notification> {
        if message.trim().is_empty() {
            return Err(AccountError::Validation(
                "Message must not be blank".to_string(),
            ));
        }

        let user = self.users.find_by_username(username).await?.ok_or_else(|| {
            AccountError::NotFound(format!(
                "User not found for sending notification: {username}"
            ))
        })?;

        let notification = self.store.insert_notification(user.id, message).await?;
        tracing::info!(username = %username, notification_id = %notification.id, "Notification sent");
        Ok(notification)
    }

    /// Notifications for a user, oldest first
    pub async fn list(&self, username: &str) -> Result<Vec<Notification>> {
        let user = self
            .users
            .find_by_username(username)
            .await?
            .ok_or_else(|| AccountError::user_not_found(username))?;

        self.store.notifications_for(user.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::SigningKey;
    use account_core::MemoryStore;
    use std::time::Duration;

    fn light_password() -> PasswordConfig {
        PasswordConfig {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }

    async fn setup(allow_privileged: bool) -> (Arc<MemoryStore>, Arc<TokenCodec>, AccountService) {
        let store = Arc::new(MemoryStore::new());
        store.seed_roles().await.unwrap();
        let codec = Arc::new(TokenCodec::new(
            &SigningKey::generate(),
            Duration::from_secs(3600),
        ));
        let service = AccountService::new(
            store.clone(),
            codec.clone(),
            light_password(),
            allow_privileged,
        );
        (store, codec, service)
    }

    fn register_request(username: &str, roles: Option<Vec<&str>>) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            password: "password123".to_string(),
            email: format!("{username}@example.com"),
            roles: roles.map(|r| r.into_iter().map(String::from).collect()),
        }
    }

    #[tokio::test]
    async fn test_register_defaults_to_user_role() {
        let (_, _, service) = setup(false).await;

        let user = service
            .register(register_request("alice", None))
            .await
            .unwrap();

        assert_eq!(user.roles, BTreeSet::from([RoleName::User]));
        assert!(user.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_register_rejects_privileged_roles_by_default() {
        let (store, _, service) = setup(false).await;

        let err = service
            .register(register_request("mallory", Some(vec!["ROLE_ADMIN"])))
            .await
            .unwrap_err();

        assert!(matches!(err, AccountError::PrivilegedRole(RoleName::Admin)));
        assert_eq!(store.user_count().await, 0);
    }

    #[tokio::test]
    async fn test_register_privileged_roles_when_allowed() {
        let (_, _, service) = setup(true).await;

        let user = service
            .register(register_request("mona", Some(vec!["manager"])))
            .await
            .unwrap();

        assert_eq!(
            user.roles,
            BTreeSet::from([RoleName::User, RoleName::Manager])
        );
    }

    #[tokio::test]
    async fn test_register_invalid_role() {
        let (store, _, service) = setup(false).await;

        let err = service
            .register(register_request("alice", Some(vec!["ROLE_OWNER"])))
            .await
            .unwrap_err();

        assert!(matches!(err, AccountError::InvalidRole(name) if name == "ROLE_OWNER"));
        assert_eq!(store.user_count().await, 0);
    }

    #[tokio::test]
    async fn test_register_role_missing_from_store() {
        let store = Arc::new(MemoryStore::new());
        let codec = Arc::new(TokenCodec::new(
            &SigningKey::generate(),
            Duration::from_secs(60),
        ));
        let service = AccountService::new(store, codec, light_password(), false);

        let err = service
            .register(register_request("alice", Some(vec!["USER"])))
            .await
            .unwrap_err();

        assert!(matches!(err, AccountError::InvalidRole(_)));
    }

    #[tokio::test]
    async fn test_register_duplicate_conflicts_without_mutation() {
        let (store, _, service) = setup(false).await;
        service
            .register(register_request("alice", None))
            .await
            .unwrap();

        let err = service
            .register(register_request("alice", None))
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::Conflict(_)));

        let mut same_email = register_request("alicia", None);
        same_email.email = "alice@example.com".to_string();
        let err = service.register(same_email).await.unwrap_err();
        assert!(matches!(err, AccountError::Conflict(_)));

        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_register_validation() {
        let (_, _, service) = setup(false).await;

        let mut short_name = register_request("al", None);
        short_name.email = "al@example.com".to_string();
        assert!(matches!(
            service.register(short_name).await,
            Err(AccountError::Validation(_))
        ));

        let mut short_password = register_request("alice", None);
        short_password.password = "12345".to_string();
        assert!(matches!(
            service.register(short_password).await,
            Err(AccountError::Validation(_))
        ));

        let mut bad_email = register_request("alice", None);
        bad_email.email = "not-an-email".to_string();
        assert!(matches!(
            service.register(bad_email).await,
            Err(AccountError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_login() {
        let (_, codec, service) = setup(false).await;
        service
            .register(register_request("alice", None))
            .await
            .unwrap();

        let response = service
            .login(LoginRequest {
                username: "alice".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap();

        let token = response.token.strip_prefix("Bearer ").unwrap();
        let claims = codec.verify(token).unwrap();
        assert_eq!(claims.username(), "alice");
        assert_eq!(claims.roles(), &[RoleName::User]);

        let err = service
            .login(LoginRequest {
                username: "alice".to_string(),
                password: "wrong-password".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::Unauthorized(_)));

        let err = service
            .login(LoginRequest {
                username: "ghost".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_roles() {
        let (store, _, service) = setup(false).await;
        service
            .register(register_request("bob", None))
            .await
            .unwrap();

        let updated = service
            .update_roles("bob", &["ROLE_USER".to_string(), "ROLE_MANAGER".to_string()])
            .await
            .unwrap();
        assert_eq!(
            updated.roles,
            BTreeSet::from([RoleName::User, RoleName::Manager])
        );

        let err = service
            .update_roles("ghost", &["ROLE_USER".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::NotFound(_)));

        // Unknown user is reported before an unknown role
        let err = service
            .update_roles("ghost", &["ROLE_OWNER".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::NotFound(_)));

        let err = service
            .update_roles("bob", &["ROLE_OWNER".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::InvalidRole(_)));

        let err = service.update_roles("bob", &[]).await.unwrap_err();
        assert!(matches!(err, AccountError::Validation(_)));

        let bob = store.find_by_username("bob").await.unwrap().unwrap();
        assert_eq!(bob.roles, BTreeSet::from([RoleName::User, RoleName::Manager]));
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_provision_is_idempotent() {
        let (store, _, service) = setup(false).await;
        let roles = BTreeSet::from([RoleName::User, RoleName::Admin]);

        let created = service
            .provision("root", "root@example.com", "rootpass", roles.clone())
            .await
            .unwrap();
        assert_eq!(created.unwrap().roles, roles);

        let again = service
            .provision("root", "root@example.com", "rootpass", roles)
            .await
            .unwrap();
        assert!(again.is_none());
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_profile_and_existence_checks() {
        let (_, _, service) = setup(false).await;
        service
            .register(register_request("alice", None))
            .await
            .unwrap();

        let profile = service
            .profile(&Principal::new("alice", [RoleName::User]))
            .await
            .unwrap();
        assert_eq!(profile.email, "alice@example.com");

        assert!(service.username_exists("alice").await.unwrap());
        assert!(!service.username_exists("bob").await.unwrap());
        assert!(service.email_exists("alice@example.com").await.unwrap());
        assert!(!service.email_exists("bob@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_notifications() {
        let (store, _, service) = setup(false).await;
        service
            .register(register_request("alice", None))
            .await
            .unwrap();
        let notifier = NotificationService::new(store.clone(), store.clone());

        notifier.send("alice", "Your order has shipped").await.unwrap();
        notifier.send("alice", "Your order was delivered").await.unwrap();

        let messages: Vec<String> = notifier
            .list("alice")
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.message)
            .collect();
        assert_eq!(
            messages,
            vec!["Your order has shipped", "Your order was delivered"]
        );

        assert!(matches!(
            notifier.send("ghost", "hello").await,
            Err(AccountError::NotFound(_))
        ));
        assert!(matches!(
            notifier.send("alice", "   ").await,
            Err(AccountError::Validation(_))
        ));
        assert!(matches!(
            notifier.list("ghost").await,
            Err(AccountError::NotFound(_))
        ));
    }

    #[test]
    fn test_request_debug_redacts_password() {
        let request = register_request("alice", None);
        let debug = format!(
            "{request:?} {:?}",
            LoginRequest {
                username: "alice".to_string(),
                password: "password123".to_string(),
            }
        );
        assert!(!debug.contains("password123"));
    }
}
