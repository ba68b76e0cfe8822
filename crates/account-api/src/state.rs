//! Application state management

use crate::auth::jwt::{SigningKey, TokenCodec};
use crate::auth::policy::AccessPolicy;
use crate::auth::service::{AccountService, NotificationService};
use account_core::config::AppConfig;
use account_core::{CredentialStore, NotificationStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    /// Ready status
    pub is_ready: AtomicBool,
    /// Token signing and verification, shared read-only
    pub codec: Arc<TokenCodec>,
    /// Credential lookups for the request authenticator
    pub store: Arc<dyn CredentialStore>,
    /// Route access table
    pub policy: AccessPolicy,
    pub accounts: AccountService,
    pub notifications: NotificationService,
}

impl AppState {
    /// Build state over a store that holds both credentials and notifications
    pub fn new<S>(config: AppConfig, signing_key: &SigningKey, store: Arc<S>) -> Self
    where
        S: CredentialStore + NotificationStore + 'static,
    {
        let codec = Arc::new(TokenCodec::new(
            signing_key,
            Duration::from_secs(config.auth.token_ttl_secs),
        ));
        let credentials: Arc<dyn CredentialStore> = store.clone();
        let notifications: Arc<dyn NotificationStore> = store;

        let accounts = AccountService::new(
            credentials.clone(),
            codec.clone(),
            config.password.clone(),
            config.auth.allow_privileged_registration,
        );
        let notifications = NotificationService::new(credentials.clone(), notifications);

        Self {
            config,
            start_time: Instant::now(),
            is_ready: AtomicBool::new(true),
            codec,
            store: credentials,
            policy: AccessPolicy::service_default(),
            accounts,
            notifications,
        }
    }

    /// Replace the access table
    pub fn with_policy(mut self, policy: AccessPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Check if service is ready
    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    /// Set ready status
    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::SeqCst);
    }
}
