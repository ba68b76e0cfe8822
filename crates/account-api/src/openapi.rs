//! OpenAPI documentation
//!
//! The document is generated with utoipa and served at
//! `/api-docs/openapi.json`, with Swagger UI at `/swagger-ui`.
//!
//! New endpoints need a `#[utoipa::path(...)]` annotation on the handler and
//! an entry in `paths(...)` below; request and response types need
//! `#[derive(ToSchema)]` and an entry in `components(schemas(...))`.

use axum::Router;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::service::{
    LoginRequest, LoginResponse, RegisterRequest, SendNotificationRequest, UpdateRolesRequest,
};
use crate::error::ErrorDetails;
use crate::handlers::health::{HealthResponse, ReadinessResponse};
use account_core::{Notification, RoleName, UserProfile};

/// Account service API document
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Account Service API",
        description = r#"
User registration, login, role management and notifications.

Protected endpoints expect an `Authorization: Bearer <token>` header. Tokens
are issued by `POST /api/user/login`.
"#
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness and readiness probes"),
        (name = "user", description = "Registration, login and user lookup"),
        (name = "admin", description = "Administration (ADMIN role)"),
        (name = "notifications", description = "User notifications")
    ),
    components(
        schemas(
            // Common
            ErrorDetails,
            RoleName,
            UserProfile,

            // Health
            HealthResponse,
            ReadinessResponse,

            // User
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            UpdateRolesRequest,

            // Notifications
            SendNotificationRequest,
            Notification,
        )
    ),
    paths(
        crate::handlers::health::health_check,
        crate::handlers::health::readiness_check,

        crate::handlers::user::register_handler,
        crate::handlers::user::login_handler,
        crate::handlers::user::profile_handler,
        crate::handlers::user::get_user_handler,
        crate::handlers::user::username_exists_handler,
        crate::handlers::user::email_exists_handler,
        crate::handlers::user::update_roles_handler,

        crate::handlers::admin::dashboard_handler,
        crate::handlers::admin::update_roles_handler,

        crate::handlers::notifications::send_notification_handler,
        crate::handlers::notifications::list_notifications_handler,
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` security scheme referenced by protected paths
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Swagger UI router
///
/// - `/swagger-ui` - interactive documentation
/// - `/api-docs/openapi.json` - OpenAPI JSON document
pub fn swagger_ui_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_valid() {
        let doc = ApiDoc::openapi();
        let json = serde_json::to_string_pretty(&doc).unwrap();

        assert!(json.contains("Account Service API"));
        assert!(json.contains("/api/user/register"));
        assert!(json.contains("/api/user/{username}/roles"));
        assert!(json.contains("/api/admin/dashboard"));
        assert!(json.contains("/api/notifications/send/{username}"));
    }

    #[test]
    fn test_bearer_scheme_registered() {
        let doc = ApiDoc::openapi();
        let json = serde_json::to_string(&doc).unwrap();

        assert!(json.contains("bearer_auth"));
        assert!(json.contains("\"bearerFormat\":\"JWT\""));
    }

    #[test]
    fn test_password_hash_not_in_schemas() {
        let json = serde_json::to_string(&ApiDoc::openapi()).unwrap();
        assert!(!json.contains("password_hash"));
    }

    #[test]
    fn test_swagger_ui_router_creates() {
        let _router: Router<()> = swagger_ui_router();
    }
}
