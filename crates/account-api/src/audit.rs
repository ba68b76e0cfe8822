//! Security audit logging for account events
//!
//! Logins, registrations, role changes and access-control failures are
//! logged at INFO level with the "audit" target, so they can be filtered
//! and routed separately from application logs.
//!
//! Events never carry passwords, password hashes or token material.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Security audit events for authentication and authorization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Successful login, a session token was issued
    LoginSuccess {
        username: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Failed login attempt
    LoginFailure {
        username: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Successful user registration
    RegistrationSuccess {
        user_id: Uuid,
        username: String,
        roles: Vec<String>,
        ip_address: Option<String>,
    },

    /// Failed registration attempt
    RegistrationFailure {
        username: String,
        reason: String,
        ip_address: Option<String>,
    },

    /// Role set of a user replaced by an administrator
    RolesUpdated {
        username: String,
        roles: Vec<String>,
        updated_by: String,
    },

    /// Administrator account created at startup
    AdminProvisioned { user_id: Uuid, username: String },

    /// Request refused by the access policy
    AccessDenied {
        username: Option<String>,
        method: String,
        path: String,
        required_roles: Option<String>,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Invalid or expired token presented
    InvalidToken {
        ip_address: Option<String>,
        user_agent: Option<String>,
        reason: String,
    },
}

/// Log a security audit event with structured fields
///
/// The full event is also attached as a JSON string for log aggregators.
pub fn audit_log(event: &AuditEvent) {
    let timestamp = Utc::now();

    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    match event {
        AuditEvent::LoginSuccess {
            username,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                username = %username,
                ip_address = ?ip_address,
                "Login successful"
            );
        }
        AuditEvent::LoginFailure {
            username,
            reason,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                username = %username,
                reason = %reason,
                ip_address = ?ip_address,
                "Login failed"
            );
        }
        AuditEvent::RegistrationSuccess {
            user_id,
            username,
            roles,
            ip_address,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                username = %username,
                roles = ?roles,
                ip_address = ?ip_address,
                "Registration successful"
            );
        }
        AuditEvent::RegistrationFailure {
            username,
            reason,
            ip_address,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                username = %username,
                reason = %reason,
                ip_address = ?ip_address,
                "Registration failed"
            );
        }
        AuditEvent::RolesUpdated {
            username,
            roles,
            updated_by,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                username = %username,
                roles = ?roles,
                updated_by = %updated_by,
                "Roles updated"
            );
        }
        AuditEvent::AdminProvisioned { user_id, username } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                username = %username,
                "Administrator provisioned"
            );
        }
        AuditEvent::AccessDenied {
            username,
            method,
            path,
            required_roles,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                username = ?username,
                method = %method,
                path = %path,
                required_roles = ?required_roles,
                ip_address = ?ip_address,
                "Access denied"
            );
        }
        AuditEvent::InvalidToken {
            ip_address, reason, ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                ip_address = ?ip_address,
                reason = %reason,
                "Invalid token"
            );
        }
    }
}

/// Extract the client IP address from proxy headers
///
/// Checks X-Forwarded-For, then X-Real-IP.
pub fn extract_ip_address(headers: &axum::http::HeaderMap) -> Option<String> {
    if let Some(xff) = headers.get("x-forwarded-for") {
        if let Ok(xff_str) = xff.to_str() {
            // Take the first IP in the chain (client IP)
            if let Some(first_ip) = xff_str.split(',').next() {
                return Some(first_ip.trim().to_string());
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return Some(ip_str.to_string());
        }
    }

    None
}

/// Extract user agent from request headers
pub fn extract_user_agent(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_event_serialization() {
        let event = AuditEvent::LoginSuccess {
            username: "alice".to_string(),
            ip_address: Some("192.168.1.1".to_string()),
            user_agent: Some("Mozilla/5.0".to_string()),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event_type\":\"login_success\""));
        assert!(json.contains("alice"));
    }

    #[test]
    fn test_access_denied_serialization() {
        let event = AuditEvent::AccessDenied {
            username: None,
            method: "PATCH".to_string(),
            path: "/api/user/alice/roles".to_string(),
            required_roles: Some("ADMIN".to_string()),
            ip_address: None,
            user_agent: None,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("access_denied"));
        assert!(json.contains("/api/user/alice/roles"));
    }

    #[test]
    fn test_audit_log_does_not_panic() {
        audit_log(&AuditEvent::LoginFailure {
            username: "alice".to_string(),
            reason: "Invalid password".to_string(),
            ip_address: Some("192.168.1.1".to_string()),
            user_agent: Some("Test Agent".to_string()),
        });
        audit_log(&AuditEvent::RegistrationSuccess {
            user_id: Uuid::new_v4(),
            username: "bob".to_string(),
            roles: vec!["USER".to_string()],
            ip_address: None,
        });
        audit_log(&AuditEvent::RolesUpdated {
            username: "bob".to_string(),
            roles: vec!["USER".to_string(), "MANAGER".to_string()],
            updated_by: "root".to_string(),
        });
        audit_log(&AuditEvent::AdminProvisioned {
            user_id: Uuid::new_v4(),
            username: "root".to_string(),
        });
        audit_log(&AuditEvent::InvalidToken {
            ip_address: None,
            user_agent: None,
            reason: "Malformed token".to_string(),
        });
    }

    #[test]
    fn test_extract_ip_from_x_forwarded_for() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            "203.0.113.1, 198.51.100.1".parse().unwrap(),
        );

        assert_eq!(extract_ip_address(&headers), Some("203.0.113.1".to_string()));
    }

    #[test]
    fn test_extract_ip_from_x_real_ip() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert("x-real-ip", "203.0.113.1".parse().unwrap());

        assert_eq!(extract_ip_address(&headers), Some("203.0.113.1".to_string()));
    }

    #[test]
    fn test_extract_missing_headers() {
        let headers = axum::http::HeaderMap::new();

        assert_eq!(extract_ip_address(&headers), None);
        assert_eq!(extract_user_agent(&headers), None);
    }
}
