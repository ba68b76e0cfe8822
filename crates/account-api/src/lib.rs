//! Account API - user-account HTTP service
//!
//! Registration, login, role management and notifications behind stateless
//! bearer-token authentication and a role-based access table.
//!
//! Every request passes through the same layer stack, outermost first:
//! CORS, tracing, security headers, error path stamping, authentication,
//! policy enforcement, then the route handler.

pub mod audit;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use crate::auth::{authenticate_request, enforce_policy};
use crate::error::{not_found, stamp_error_path};
use crate::middleware::security_headers_middleware;
use crate::state::AppState;
use axum::{
    http::{header, Method},
    middleware as axum_middleware, Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the service router over shared state
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .merge(routes::api_routes())
        .merge(openapi::swagger_ui_router())
        .fallback(not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            enforce_policy,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            authenticate_request,
        ))
        .layer(axum_middleware::from_fn(stamp_error_path))
        .layer(axum_middleware::from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        if parsed.is_empty() {
            tracing::warn!("CORS_ORIGINS contains no valid origins, allowing any");
            AllowOrigin::any()
        } else {
            AllowOrigin::list(parsed)
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
}

/// Helpers shared by unit and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    use crate::auth::jwt::SigningKey;
    use crate::state::AppState;
    use account_core::{
        AppConfig, CredentialStore, MemoryStore, NotificationStore, PasswordConfig,
    };
    use std::sync::Arc;

    /// Argon2 parameters cheap enough for tests
    pub fn light_password_config() -> PasswordConfig {
        PasswordConfig {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }

    /// State over the given store with a freshly generated signing key
    pub fn test_state_with_store<S>(store: Arc<S>, password: PasswordConfig) -> Arc<AppState>
    where
        S: CredentialStore + NotificationStore + 'static,
    {
        let mut config = AppConfig::default();
        config.password = password;
        Arc::new(AppState::new(config, &SigningKey::generate(), store))
    }

    /// State over a seeded in-memory store
    pub async fn test_state() -> (Arc<AppState>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store
            .seed_roles()
            .await
            .expect("memory store seeding cannot fail");
        let state = test_state_with_store(store.clone(), light_password_config());
        (state, store)
    }
}

/// Router over a seeded in-memory store, for tests
#[cfg(any(test, feature = "test-utils"))]
pub async fn create_router_for_testing() -> (Router, Arc<AppState>) {
    let (state, _) = testing::test_state().await;
    (create_router(state.clone()), state)
}
