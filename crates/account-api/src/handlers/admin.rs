//! Administration handlers
//!
//! Everything under `/api/admin` requires ADMIN; the access policy enforces it
//! before these run.

use super::user::apply_role_update;
use crate::auth::middleware::AuthenticatedUser;
use crate::auth::service::UpdateRolesRequest;
use crate::error::{ApiJson, AppError};
use crate::state::AppState;
use account_core::UserProfile;
use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

/// Admin landing page
#[utoipa::path(
    get,
    path = "/api/admin/dashboard",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Dashboard greeting", body = String),
        (status = 403, description = "ADMIN role required", body = crate::error::ErrorDetails),
    )
)]
pub async fn dashboard_handler(AuthenticatedUser(admin): AuthenticatedUser) -> String {
    tracing::debug!(username = %admin.username, "Admin dashboard accessed");
    "Welcome to the admin dashboard!".to_string()
}

/// Replace a user's role set
#[utoipa::path(
    patch,
    path = "/api/admin/user/{username}/roles",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(("username" = String, Path, description = "Username")),
    request_body = UpdateRolesRequest,
    responses(
        (status = 200, description = "Roles updated", body = UserProfile),
        (status = 400, description = "Unknown role or empty role set", body = crate::error::ErrorDetails),
        (status = 403, description = "ADMIN role required", body = crate::error::ErrorDetails),
        (status = 404, description = "User not found", body = crate::error::ErrorDetails),
    )
)]
pub async fn update_roles_handler(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(admin): AuthenticatedUser,
    Path(username): Path<String>,
    ApiJson(request): ApiJson<UpdateRolesRequest>,
) -> Result<Json<UserProfile>, AppError> {
    apply_role_update(&state, &admin.username, &username, &request).await
}
