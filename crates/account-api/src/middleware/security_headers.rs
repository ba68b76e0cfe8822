//! Security headers middleware
//!
//! Every response, including refused and failed ones, carries:
//! - X-Content-Type-Options: nosniff
//! - X-Frame-Options: DENY
//! - Strict-Transport-Security (one year, subdomains included)
//! - Content-Security-Policy: default-src 'self'
//! - Referrer-Policy: strict-origin-when-cross-origin
//! - Cache-Control: no-store, since bodies may carry session tokens

use axum::{
    extract::Request,
    http::{header, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

const SECURITY_HEADERS: [(HeaderName, &str); 6] = [
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::X_FRAME_OPTIONS, "DENY"),
    (
        header::STRICT_TRANSPORT_SECURITY,
        "max-age=31536000; includeSubDomains",
    ),
    (header::CONTENT_SECURITY_POLICY, "default-src 'self'"),
    (header::REFERRER_POLICY, "strict-origin-when-cross-origin"),
    (header::CACHE_CONTROL, "no-store"),
];

/// Add the security headers to the response
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let is_docs = request.uri().path().starts_with("/swagger-ui");
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    for (name, value) in SECURITY_HEADERS {
        // Swagger UI needs inline scripts and styles
        if is_docs && name == header::CONTENT_SECURITY_POLICY {
            continue;
        }
        headers.insert(name, HeaderValue::from_static(value));
    }

    response
}
