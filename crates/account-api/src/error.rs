//! API error handling
//!
//! Every error response carries an `ErrorDetails` body. Handlers do not know
//! the request path, so the body is rendered with an empty path and a copy of
//! the details travels in the response extensions; `stamp_error_path` fills
//! the path in on the way out.

use account_core::AccountError;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error response body
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetails {
    /// When the error was produced
    pub timestamp: DateTime<Utc>,
    /// Human-readable message
    pub message: String,
    /// Request path
    pub path: String,
}

impl ErrorDetails {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.into(),
            path: String::new(),
        }
    }

    /// Render with `status`, keeping a copy in the extensions for path stamping
    pub fn into_response_with(self, status: StatusCode) -> Response {
        let mut response = (status, Json(self.clone())).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response.extensions_mut().insert(self);
        response
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Conflict(String),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            AppError::Internal(detail) => {
                // Details stay in the logs
                tracing::error!(error = %detail, "Internal error");
                "Internal server error".to_string()
            }
            AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::BadRequest(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg) => msg,
        };

        ErrorDetails::new(message).into_response_with(status)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "Rejected request body");
        AppError::BadRequest("Malformed request body".to_string())
    }
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::NotFound(msg) => AppError::NotFound(msg),
            AccountError::Conflict(msg) => AppError::Conflict(msg),
            e @ AccountError::InvalidRole(_) => AppError::BadRequest(e.to_string()),
            e @ AccountError::Validation(_) => AppError::BadRequest(e.to_string()),
            e @ AccountError::PrivilegedRole(_) => AppError::Forbidden(e.to_string()),
            AccountError::Unauthorized(msg) => AppError::Unauthorized(msg),
            AccountError::Storage(msg) => AppError::Internal(format!("Storage error: {msg}")),
            AccountError::Other(err) => AppError::Internal(err.to_string()),
        }
    }
}

/// JSON body extractor whose rejections are rendered as `ErrorDetails`
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Router fallback for paths without a handler
pub async fn not_found() -> AppError {
    AppError::NotFound("No resource found at this path".to_string())
}

/// Fill in `ErrorDetails::path` for error responses produced further down the stack
///
/// The router's own 405 responses carry no details and get a generic body here.
pub async fn stamp_error_path(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let mut response = next.run(request).await;

    let mut details = match response.extensions_mut().remove::<ErrorDetails>() {
        Some(details) => details,
        None if response.status() == StatusCode::METHOD_NOT_ALLOWED => {
            ErrorDetails::new("Method not allowed")
        }
        None => return response,
    };

    details.path = path;
    let status = response.status();
    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    let stamped = Json(details).into_response();
    let (stamped_parts, body) = stamped.into_parts();
    parts.headers.extend(stamped_parts.headers);
    parts.status = status;
    Response::from_parts(parts, body)
}
