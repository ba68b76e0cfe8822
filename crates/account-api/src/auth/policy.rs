//! Route-level access policy
//!
//! An ordered table of `(method, path pattern) -> requirement` rules. Rules
//! are evaluated top to bottom and the first match wins, so an endpoint-level
//! override (for example a public login route under a protected prefix) must
//! be listed before the prefix rule. Paths that match no rule fall back to
//! the default requirement, which is "authenticated, any role".

use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::auth::middleware::Authentication;
use crate::state::AppState;
use account_core::{Principal, RoleName};
use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

/// What a request must present to pass a rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// Allowed regardless of authentication state
    Public,
    /// Any authenticated principal
    Authenticated,
    /// An authenticated principal holding at least one of the roles
    AnyRole(BTreeSet<RoleName>),
}

impl Requirement {
    pub fn role(role: RoleName) -> Self {
        Requirement::AnyRole(BTreeSet::from([role]))
    }
}

/// Reason a request was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessDenied {
    #[error("Full authentication is required to access this resource")]
    AuthenticationRequired,

    #[error("Access denied: requires one of {}", format_roles(.required))]
    InsufficientRole { required: BTreeSet<RoleName> },
}

pub(crate) fn format_roles(roles: &BTreeSet<RoleName>) -> String {
    roles
        .iter()
        .map(RoleName::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `{name}`: exactly one non-empty segment
    Variable,
    /// Trailing `**`: zero or more segments
    Rest,
}

/// Path pattern with literal segments, `{var}` placeholders and a trailing `**`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Self {
        let segments = split_path(pattern)
            .map(|s| {
                if s == "**" {
                    Segment::Rest
                } else if s.starts_with('{') && s.ends_with('}') {
                    Segment::Variable
                } else {
                    Segment::Literal(s.to_string())
                }
            })
            .collect();

        Self {
            raw: pattern.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, path: &str) -> bool {
        let mut parts = split_path(path);

        for segment in &self.segments {
            match segment {
                Segment::Rest => return true,
                Segment::Variable => {
                    if parts.next().is_none() {
                        return false;
                    }
                }
                Segment::Literal(literal) => match parts.next() {
                    Some(part) if part == literal => {}
                    _ => return false,
                },
            }
        }

        parts.next().is_none()
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// A single policy entry; `method: None` matches every method
#[derive(Debug, Clone)]
pub struct Rule {
    pub method: Option<Method>,
    pub pattern: PathPattern,
    pub requirement: Requirement,
}

impl Rule {
    fn matches(&self, method: &Method, path: &str) -> bool {
        self.method.as_ref().map_or(true, |m| m == method) && self.pattern.matches(path)
    }
}

/// Ordered, first-match-wins access table
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    rules: Vec<Rule>,
    default: Requirement,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessPolicy {
    /// Empty table; every path requires authentication
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            default: Requirement::Authenticated,
        }
    }

    /// Append a rule. Earlier rules take precedence.
    pub fn rule(mut self, method: Option<Method>, pattern: &str, requirement: Requirement) -> Self {
        self.rules.push(Rule {
            method,
            pattern: PathPattern::parse(pattern),
            requirement,
        });
        self
    }

    pub fn permit(self, method: Method, pattern: &str) -> Self {
        self.rule(Some(method), pattern, Requirement::Public)
    }

    pub fn permit_any_method(self, pattern: &str) -> Self {
        self.rule(None, pattern, Requirement::Public)
    }

    pub fn require_role(self, method: Option<Method>, pattern: &str, role: RoleName) -> Self {
        self.rule(method, pattern, Requirement::role(role))
    }

    pub fn authenticated(self, method: Option<Method>, pattern: &str) -> Self {
        self.rule(method, pattern, Requirement::Authenticated)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Requirement of the first matching rule, or the default
    pub fn requirement_for(&self, method: &Method, path: &str) -> &Requirement {
        self.rules
            .iter()
            .find(|rule| rule.matches(method, path))
            .map_or(&self.default, |rule| &rule.requirement)
    }

    /// Decide whether a request may proceed
    pub fn evaluate(
        &self,
        method: &Method,
        path: &str,
        principal: Option<&Principal>,
    ) -> Result<(), AccessDenied> {
        match self.requirement_for(method, path) {
            Requirement::Public => Ok(()),
            Requirement::Authenticated => principal
                .map(|_| ())
                .ok_or(AccessDenied::AuthenticationRequired),
            Requirement::AnyRole(required) => {
                let principal = principal.ok_or(AccessDenied::AuthenticationRequired)?;
                if principal.has_any_role(required) {
                    Ok(())
                } else {
                    Err(AccessDenied::InsufficientRole {
                        required: required.clone(),
                    })
                }
            }
        }
    }

    /// Access table for the account service routes
    pub fn service_default() -> Self {
        Self::new()
            // Probes and API documentation
            .permit(Method::GET, "/health")
            .permit(Method::GET, "/ready")
            .permit_any_method("/swagger-ui/**")
            .permit_any_method("/api-docs/**")
            // Endpoint-level overrides inside /api/user/**
            .permit(Method::POST, "/api/user/register")
            .permit(Method::POST, "/api/user/login")
            .permit(Method::GET, "/api/user/exists/username/{username}")
            .permit(Method::GET, "/api/user/exists/email/{email}")
            .require_role(
                Some(Method::PATCH),
                "/api/user/{username}/roles",
                RoleName::Admin,
            )
            .require_role(Some(Method::GET), "/api/user/profile", RoleName::User)
            .authenticated(Some(Method::GET), "/api/user/{username}")
            // Administration
            .require_role(None, "/api/admin/**", RoleName::Admin)
            // Notifications
            .authenticated(None, "/api/notifications/**")
    }
}

/// Policy enforcement middleware
///
/// Runs after `authenticate_request`. Refused requests never reach a handler.
pub async fn enforce_policy(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let principal = match request.extensions().get::<Authentication>() {
        Some(Authentication::Authenticated(principal)) => Some(principal),
        _ => None,
    };

    let method = request.method();
    let path = request.uri().path();

    if let Err(denied) = state.policy.evaluate(method, path, principal) {
        let required_roles = match &denied {
            AccessDenied::InsufficientRole { required } => Some(format_roles(required)),
            AccessDenied::AuthenticationRequired => None,
        };
        audit_log(&AuditEvent::AccessDenied {
            username: principal.map(|p| p.username.clone()),
            method: method.to_string(),
            path: path.to_string(),
            required_roles,
            ip_address: extract_ip_address(request.headers()),
            user_agent: extract_user_agent(request.headers()),
        });

        return denied.into_response();
    }

    next.run(request).await
}
