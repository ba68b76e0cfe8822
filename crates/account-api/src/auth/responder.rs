//! Responses for refused requests
//!
//! `AuthenticationRequired` becomes 401 with a `WWW-Authenticate: Bearer`
//! challenge, `InsufficientRole` becomes 403. Both use the common
//! `ErrorDetails` body and never say why a token was rejected.

use super::policy::AccessDenied;
use crate::error::ErrorDetails;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

impl AccessDenied {
    pub fn status(&self) -> StatusCode {
        match self {
            AccessDenied::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            AccessDenied::InsufficientRole { .. } => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for AccessDenied {
    fn into_response(self) -> Response {
        let status = self.status();
        ErrorDetails::new(self.to_string()).into_response_with(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use account_core::RoleName;
    use axum::http::header;
    use std::collections::BTreeSet;

    async fn body_of(response: Response) -> ErrorDetails {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_authentication_required_is_401_with_challenge() {
        let response = AccessDenied::AuthenticationRequired.into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );

        let details = body_of(response).await;
        assert_eq!(
            details.message,
            "Full authentication is required to access this resource"
        );
    }

    #[tokio::test]
    async fn test_insufficient_role_is_403() {
        let response = AccessDenied::InsufficientRole {
            required: BTreeSet::from([RoleName::Admin]),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
        assert!(response.extensions().get::<ErrorDetails>().is_some());

        let details = body_of(response).await;
        assert_eq!(details.message, "Access denied: requires one of ADMIN");
    }
}
