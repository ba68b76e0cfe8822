//! Notification handlers

use crate::auth::service::SendNotificationRequest;
use crate::error::{ApiJson, AppError};
use crate::state::AppState;
use account_core::Notification;
use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

/// Send a notification to a user
#[utoipa::path(
    post,
    path = "/api/notifications/send/{username}",
    tag = "notifications",
    security(("bearer_auth" = [])),
    params(("username" = String, Path, description = "Recipient username")),
    request_body = SendNotificationRequest,
    responses(
        (status = 200, description = "Notification stored", body = Notification),
        (status = 400, description = "Blank message", body = crate::error::ErrorDetails),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorDetails),
        (status = 404, description = "User not found", body = crate::error::ErrorDetails),
    )
)]
pub async fn send_notification_handler(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
    ApiJson(request): ApiJson<SendNotificationRequest>,
) -> Result<Json<Notification>, AppError> {
    Ok(Json(
        state
            .notifications
            .send(&username, &request.message)
            .await?,
    ))
}

/// List a user's notifications, oldest first
#[utoipa::path(
    get,
    path = "/api/notifications/{username}",
    tag = "notifications",
    security(("bearer_auth" = [])),
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 200, description = "Notifications for the user", body = [Notification]),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorDetails),
        (status = 404, description = "User not found", body = crate::error::ErrorDetails),
    )
)]
pub async fn list_notifications_handler(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<Json<Vec<Notification>>, AppError> {
    Ok(Json(state.notifications.list(&username).await?))
}
