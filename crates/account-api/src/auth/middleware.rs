/// Request authentication
///
/// Extracts a bearer token from the Authorization header, verifies it, checks
/// that the subject still exists and binds the outcome to the request
/// extensions as an `Authentication`. Failures never reject the request here;
/// they leave it anonymous and the access policy decides.
use super::jwt::{TokenCodec, TokenError};
use super::policy::AccessDenied;
use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::state::AppState;
use account_core::{CredentialStore, Principal};
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Why a presented credential was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    Malformed,
    InvalidSignature,
    Expired,
    AccountMissing,
    StoreUnavailable,
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            AuthFailure::Malformed => "Malformed token",
            AuthFailure::InvalidSignature => "Invalid token signature",
            AuthFailure::Expired => "Token has expired",
            AuthFailure::AccountMissing => "Token subject no longer exists",
            AuthFailure::StoreUnavailable => "Credential store unavailable",
        };
        f.write_str(reason)
    }
}

/// Authentication outcome bound to a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authentication {
    Authenticated(Principal),
    /// No credential, or a rejected one with the reason kept for logging
    Anonymous(Option<AuthFailure>),
}

impl Authentication {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Authentication::Authenticated(principal) => Some(principal),
            Authentication::Anonymous(_) => None,
        }
    }
}

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolve request headers to an authentication outcome
pub async fn authenticate(
    headers: &HeaderMap,
    codec: &TokenCodec,
    store: &dyn CredentialStore,
) -> Authentication {
    let Some(token) = bearer_token(headers) else {
        return Authentication::Anonymous(None);
    };

    let claims = match codec.verify(token) {
        Ok(claims) => claims,
        Err(TokenError::InvalidSignature) => {
            return Authentication::Anonymous(Some(AuthFailure::InvalidSignature))
        }
        Err(_) => return Authentication::Anonymous(Some(AuthFailure::Malformed)),
    };

    if claims.is_expired() {
        return Authentication::Anonymous(Some(AuthFailure::Expired));
    }

    match store.exists_by_username(claims.username()).await {
        Ok(true) => {}
        Ok(false) => return Authentication::Anonymous(Some(AuthFailure::AccountMissing)),
        Err(e) => {
            tracing::warn!(error = %e, "Credential lookup failed during authentication");
            return Authentication::Anonymous(Some(AuthFailure::StoreUnavailable));
        }
    }

    Authentication::Authenticated(Principal::new(
        claims.username(),
        claims.roles().iter().copied(),
    ))
}

/// Authentication middleware
///
/// Runs once per request before the access policy. A principal already bound
/// by an earlier layer is kept as is.
pub async fn authenticate_request(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let already_bound = matches!(
        request.extensions().get::<Authentication>(),
        Some(Authentication::Authenticated(_))
    );
    if already_bound {
        return next.run(request).await;
    }

    let authentication =
        authenticate(request.headers(), &state.codec, state.store.as_ref()).await;

    if let Authentication::Anonymous(Some(reason)) = &authentication {
        audit_log(&AuditEvent::InvalidToken {
            ip_address: extract_ip_address(request.headers()),
            user_agent: extract_user_agent(request.headers()),
            reason: reason.to_string(),
        });
    }

    request.extensions_mut().insert(authentication);
    next.run(request).await
}

/// Extractor for the authenticated caller
///
/// ```ignore
/// async fn profile(AuthenticatedUser(principal): AuthenticatedUser) -> String {
///     format!("Hello, {}!", principal.username)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AccessDenied;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Authentication>() {
            Some(Authentication::Authenticated(principal)) => {
                Ok(AuthenticatedUser(principal.clone()))
            }
            _ => Err(AccessDenied::AuthenticationRequired),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::SigningKey;
    use crate::testing::{light_password_config, test_state_with_store};
    use account_core::{AccountError, MemoryStore, NewUser, RoleName, User};
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Extension, Router};
    use std::collections::BTreeSet;
    use std::time::Duration;
    use tower::ServiceExt;

    const HOUR: Duration = Duration::from_secs(3600);

    async fn store_with(username: &str) -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_user(NewUser {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password_hash: "hash".to_string(),
                roles: BTreeSet::from([RoleName::User]),
            })
            .await
            .unwrap();
        store
    }

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, value.parse().unwrap());
        headers
    }

    fn codec() -> TokenCodec {
        TokenCodec::new(&SigningKey::generate(), HOUR)
    }

    struct UnavailableStore;

    #[async_trait]
    impl CredentialStore for UnavailableStore {
        async fn find_by_username(&self, _: &str) -> account_core::Result<Option<User>> {
            Err(AccountError::Storage("connection refused".to_string()))
        }
        async fn exists_by_username(&self, _: &str) -> account_core::Result<bool> {
            Err(AccountError::Storage("connection refused".to_string()))
        }
        async fn exists_by_email(&self, _: &str) -> account_core::Result<bool> {
            Err(AccountError::Storage("connection refused".to_string()))
        }
        async fn insert_user(&self, _: NewUser) -> account_core::Result<User> {
            Err(AccountError::Storage("connection refused".to_string()))
        }
        async fn replace_roles(
            &self,
            _: &str,
            _: BTreeSet<RoleName>,
        ) -> account_core::Result<User> {
            Err(AccountError::Storage("connection refused".to_string()))
        }
        async fn seed_roles(&self) -> account_core::Result<usize> {
            Err(AccountError::Storage("connection refused".to_string()))
        }
        async fn available_roles(&self) -> account_core::Result<BTreeSet<RoleName>> {
            Err(AccountError::Storage("connection refused".to_string()))
        }
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(&headers_with("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(bearer_token(&headers_with("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(&headers_with("Bearer ")), None);
        assert_eq!(bearer_token(&headers_with("bearer abc")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn test_missing_header_is_anonymous_without_reason() {
        let store = store_with("alice").await;

        let outcome = authenticate(&HeaderMap::new(), &codec(), &store).await;
        assert_eq!(outcome, Authentication::Anonymous(None));
    }

    #[tokio::test]
    async fn test_valid_token_authenticates() {
        let store = store_with("alice").await;
        let codec = codec();
        let token = codec
            .issue("alice", [RoleName::User, RoleName::Manager], HOUR)
            .unwrap();

        let outcome = authenticate(&headers_with(&format!("Bearer {token}")), &codec, &store).await;

        // Roles come from the token claims
        assert_eq!(
            outcome,
            Authentication::Authenticated(Principal::new(
                "alice",
                [RoleName::User, RoleName::Manager]
            ))
        );
    }

    #[tokio::test]
    async fn test_rejected_tokens_degrade_to_anonymous() {
        let store = store_with("alice").await;
        let codec = codec();

        let outcome = authenticate(&headers_with("Bearer not-a-token"), &codec, &store).await;
        assert_eq!(outcome, Authentication::Anonymous(Some(AuthFailure::Malformed)));

        let foreign = TokenCodec::new(&SigningKey::generate(), HOUR)
            .issue("alice", [RoleName::Admin], HOUR)
            .unwrap();
        let outcome =
            authenticate(&headers_with(&format!("Bearer {foreign}")), &codec, &store).await;
        assert_eq!(
            outcome,
            Authentication::Anonymous(Some(AuthFailure::InvalidSignature))
        );

        let expired = codec.issue("alice", [RoleName::User], Duration::ZERO).unwrap();
        let outcome =
            authenticate(&headers_with(&format!("Bearer {expired}")), &codec, &store).await;
        assert_eq!(outcome, Authentication::Anonymous(Some(AuthFailure::Expired)));

        let orphan = codec.issue("deleted", [RoleName::User], HOUR).unwrap();
        let outcome =
            authenticate(&headers_with(&format!("Bearer {orphan}")), &codec, &store).await;
        assert_eq!(
            outcome,
            Authentication::Anonymous(Some(AuthFailure::AccountMissing))
        );
    }

    #[tokio::test]
    async fn test_store_failure_is_anonymous() {
        let codec = codec();
        let token = codec.issue("alice", [RoleName::User], HOUR).unwrap();

        let outcome = authenticate(
            &headers_with(&format!("Bearer {token}")),
            &codec,
            &UnavailableStore,
        )
        .await;
        assert_eq!(
            outcome,
            Authentication::Anonymous(Some(AuthFailure::StoreUnavailable))
        );
    }

    async fn whoami(Extension(authentication): Extension<Authentication>) -> String {
        match authentication.principal() {
            Some(principal) => principal.username.clone(),
            None => "anonymous".to_string(),
        }
    }

    async fn bind_preset(mut request: Request, next: Next) -> Response {
        request
            .extensions_mut()
            .insert(Authentication::Authenticated(Principal::new(
                "preset",
                [RoleName::User],
            )));
        next.run(request).await
    }

    #[tokio::test]
    async fn test_middleware_binds_and_keeps_existing_principal() {
        let state = test_state_with_store(Arc::new(store_with("alice").await), light_password_config());
        let token = state.codec.issue("alice", [RoleName::User], HOUR).unwrap();

        let app = Router::new()
            .route("/whoami", get(whoami))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                authenticate_request,
            ));

        let request = Request::builder()
            .uri("/whoami")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"alice");

        // An earlier layer already bound a principal
        let preset = app.layer(middleware::from_fn(bind_preset));
        let request = Request::builder()
            .uri("/whoami")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let response = preset.oneshot(request).await.unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"preset");
    }
}
