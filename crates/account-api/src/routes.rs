//! API route definitions
//!
//! Routes carry no authorization of their own; access is decided by the
//! `AccessPolicy` table for every request.

use crate::handlers::{admin, health, notifications, user};
use crate::state::AppState;
use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;

/// Liveness and readiness probes
pub fn health_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
}

/// `/api/user/**`
pub fn user_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(user::register_handler))
        .route("/login", post(user::login_handler))
        .route("/profile", get(user::profile_handler))
        .route(
            "/exists/username/:username",
            get(user::username_exists_handler),
        )
        .route("/exists/email/:email", get(user::email_exists_handler))
        .route("/:username", get(user::get_user_handler))
        .route("/:username/roles", patch(user::update_roles_handler))
}

/// `/api/admin/**`
pub fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dashboard", get(admin::dashboard_handler))
        .route("/user/:username/roles", patch(admin::update_roles_handler))
}

/// `/api/notifications/**`
pub fn notification_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/send/:username",
            post(notifications::send_notification_handler),
        )
        .route("/:username", get(notifications::list_notifications_handler))
}

/// All API routes
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(health_routes())
        .nest("/api/user", user_routes())
        .nest("/api/admin", admin_routes())
        .nest("/api/notifications", notification_routes())
}
