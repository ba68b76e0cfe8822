//! User account handlers
//!
//! Registration, login, profile lookup, existence checks and role updates.

use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::auth::middleware::AuthenticatedUser;
use crate::auth::service::{LoginRequest, LoginResponse, RegisterRequest, UpdateRolesRequest};
use crate::error::{ApiJson, AppError};
use crate::state::AppState;
use account_core::UserProfile;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

/// Register a new user account
///
/// USER is always granted. ADMIN and MANAGER can only be requested when
/// privileged self-registration is enabled.
#[utoipa::path(
    post,
    path = "/api/user/register",
    tag = "user",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully", body = UserProfile),
        (status = 400, description = "Invalid input or unknown role", body = crate::error::ErrorDetails),
        (status = 403, description = "Privileged role requested", body = crate::error::ErrorDetails),
        (status = 409, description = "Username or email already exists", body = crate::error::ErrorDetails),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let username = request.username.clone();
    let ip_address = extract_ip_address(&headers);

    match state.accounts.register(request).await {
        Ok(user) => {
            audit_log(&AuditEvent::RegistrationSuccess {
                user_id: user.id,
                username: user.username.clone(),
                roles: user.roles.iter().map(ToString::to_string).collect(),
                ip_address,
            });
            Ok((StatusCode::CREATED, Json(user.to_profile())))
        }
        Err(e) => {
            audit_log(&AuditEvent::RegistrationFailure {
                username,
                reason: e.to_string(),
                ip_address,
            });
            Err(e.into())
        }
    }
}

/// Log in and receive a session token
#[utoipa::path(
    post,
    path = "/api/user/login",
    tag = "user",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorDetails),
        (status = 404, description = "User not found", body = crate::error::ErrorDetails),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let username = request.username.clone();
    let ip_address = extract_ip_address(&headers);
    let user_agent = extract_user_agent(&headers);

    match state.accounts.login(request).await {
        Ok(response) => {
            audit_log(&AuditEvent::LoginSuccess {
                username,
                ip_address,
                user_agent,
            });
            Ok(Json(response))
        }
        Err(e) => {
            audit_log(&AuditEvent::LoginFailure {
                username,
                reason: e.to_string(),
                ip_address,
                user_agent,
            });
            Err(e.into())
        }
    }
}

/// Profile of the authenticated caller
#[utoipa::path(
    get,
    path = "/api/user/profile",
    tag = "user",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user profile", body = UserProfile),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorDetails),
        (status = 403, description = "USER role required", body = crate::error::ErrorDetails),
    )
)]
pub async fn profile_handler(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(principal): AuthenticatedUser,
) -> Result<Json<UserProfile>, AppError> {
    Ok(Json(state.accounts.profile(&principal).await?))
}

/// Look up a user by username
#[utoipa::path(
    get,
    path = "/api/user/{username}",
    tag = "user",
    security(("bearer_auth" = [])),
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 200, description = "User found", body = UserProfile),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorDetails),
        (status = 404, description = "User not found", body = crate::error::ErrorDetails),
    )
)]
pub async fn get_user_handler(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<Json<UserProfile>, AppError> {
    Ok(Json(state.accounts.get_user(&username).await?.to_profile()))
}

/// Check whether a username is taken
#[utoipa::path(
    get,
    path = "/api/user/exists/username/{username}",
    tag = "user",
    params(("username" = String, Path, description = "Username")),
    responses((status = 200, description = "Whether the username exists", body = bool))
)]
pub async fn username_exists_handler(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<Json<bool>, AppError> {
    Ok(Json(state.accounts.username_exists(&username).await?))
}

/// Check whether an email is registered
#[utoipa::path(
    get,
    path = "/api/user/exists/email/{email}",
    tag = "user",
    params(("email" = String, Path, description = "Email address")),
    responses((status = 200, description = "Whether the email exists", body = bool))
)]
pub async fn email_exists_handler(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
) -> Result<Json<bool>, AppError> {
    Ok(Json(state.accounts.email_exists(&email).await?))
}

/// Replace a user's role set (ADMIN only)
#[utoipa::path(
    patch,
    path = "/api/user/{username}/roles",
    tag = "user",
    security(("bearer_auth" = [])),
    params(("username" = String, Path, description = "Username")),
    request_body = UpdateRolesRequest,
    responses(
        (status = 200, description = "Roles updated", body = UserProfile),
        (status = 400, description = "Unknown role or empty role set", body = crate::error::ErrorDetails),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorDetails),
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

pub(crate) async fn apply_role_update(
    state: &AppState,
    actor: &str,
    username: &str,
    request: &UpdateRolesRequest,
) -> Result<Json<UserProfile>, AppError> {
    let user = state.accounts.update_roles(username, &request.roles).await?;

    audit_log(&AuditEvent::RolesUpdated {
        username: user.username.clone(),
        roles: user.roles.iter().map(ToString::to_string).collect(),
        updated_by: actor.to_string(),
    });

    Ok(Json(user.to_profile()))
}
