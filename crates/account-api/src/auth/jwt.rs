//! Session token issuance and verification
//!
//! Tokens are HS256-signed JWTs carrying the username, role list and
//! issued-at/expiry timestamps. Verification checks structure and signature
//! only; expiry is a separate check (`Claims::is_expired`) that every caller
//! must make before trusting the claims.

use account_core::RoleName;
use base64::Engine;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Minimum key length accepted for HMAC-SHA256 signing
pub const MIN_KEY_BYTES: usize = 32;

/// Claims embedded in a session token.
///
/// Fields are private: a `Claims` value is obtained from `TokenCodec::verify`,
/// so the projections below always read verified data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - username
    sub: String,
    /// Roles granted at login
    roles: Vec<RoleName>,
    /// Issued at timestamp (Unix epoch)
    iat: u64,
    /// Expiration timestamp (Unix epoch)
    exp: u64,
}

impl Claims {
    pub fn username(&self) -> &str {
        &self.sub
    }

    pub fn roles(&self) -> &[RoleName] {
        &self.roles
    }

    pub fn issued_at(&self) -> u64 {
        self.iat
    }

    pub fn expires_at(&self) -> u64 {
        self.exp
    }

    /// True once the current time has reached `exp`
    pub fn is_expired(&self) -> bool {
        match unix_now() {
            Ok(now) => now >= self.exp,
            Err(_) => true,
        }
    }
}

/// Token generation and validation errors
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Failed to encode token: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),

    #[error("Malformed token")]
    Malformed,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token has expired")]
    Expired,

    #[error("System time error: {0}")]
    SystemTime(#[from] std::time::SystemTimeError),
}

/// Signing key errors
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Signing key is not valid base64")]
    InvalidEncoding,

    #[error("Signing key must be at least {MIN_KEY_BYTES} bytes, got {0}")]
    TooShort(usize),
}

/// Process-wide HMAC secret.
///
/// Loaded once at startup and shared read-only. `Debug` never prints the bytes.
#[derive(Clone)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, KeyError> {
        if bytes.len() < MIN_KEY_BYTES {
            return Err(KeyError::TooShort(bytes.len()));
        }
        Ok(Self(bytes))
    }

    /// Decode a standard base64 key as supplied through configuration
    pub fn from_base64(encoded: &str) -> Result<Self, KeyError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|_| KeyError::InvalidEncoding)?;
        Self::from_bytes(bytes)
    }

    /// Generate a random 256-bit key
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; MIN_KEY_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.0)
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

/// Signs and verifies session tokens with a single signing key
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    default_ttl: Duration,
}

impl TokenCodec {
    pub fn new(key: &SigningKey, default_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked separately through Claims::is_expired
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(key.as_bytes()),
            decoding_key: DecodingKey::from_secret(key.as_bytes()),
            validation,
            default_ttl,
        }
    }

    /// Lifetime applied by `issue_session`
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Issue a signed token for `subject` valid for `ttl`
    pub fn issue(
        &self,
        subject: &str,
        roles: impl IntoIterator<Item = RoleName>,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let now = unix_now()?;
        let claims = Claims {
            sub: subject.to_string(),
            roles: roles.into_iter().collect(),
            iat: now,
            exp: now.saturating_add(ttl.as_secs()),
        };

        self.sign(&claims)
    }

    /// Issue a token with the configured session lifetime
    pub fn issue_session(
        &self,
        subject: &str,
        roles: impl IntoIterator<Item = RoleName>,
    ) -> Result<String, TokenError> {
        self.issue(subject, roles, self.default_ttl)
    }

    /// Parse a token and check its signature.
    ///
    /// Does not check expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            },
        )?;

        Ok(token_data.claims)
    }

    /// `verify` followed by the expiry check
    pub fn verify_current(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.verify(token)?;
        if claims.is_expired() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        Ok(encode(
            &Header::new(Algorithm::HS256),
            claims,
            &self.encoding_key,
        )?)
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

fn unix_now() -> Result<u64, std::time::SystemTimeError> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}
