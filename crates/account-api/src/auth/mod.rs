//! Authentication and authorization module
//!
//! - `jwt`: session token signing and verification
//! - `password`: Argon2 password hashing
//! - `middleware`: binds the request principal from the bearer token
//! - `policy`: route access table and its enforcement layer
//! - `responder`: uniform 401/403 error bodies
//! - `service`: registration, login, role updates and notifications

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod policy;
pub mod responder;
pub mod service;

pub use jwt::{Claims, KeyError, SigningKey, TokenCodec, TokenError};
pub use middleware::{
    authenticate, authenticate_request, bearer_token, AuthFailure, AuthenticatedUser,
    Authentication,
};
pub use password::{hash_password, hash_password_with_config, verify_password, PasswordError};
pub use policy::{enforce_policy, AccessDenied, AccessPolicy, PathPattern, Requirement, Rule};
pub use service::{
    AccountService, LoginRequest, LoginResponse, NotificationService, RegisterRequest,
    SendNotificationRequest, UpdateRolesRequest,
};
