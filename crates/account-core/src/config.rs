//! Account service configuration management
//!
//! Handles configuration from environment variables and TOML files.
//! The token signing key has no default and must always be supplied externally.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Database connection
    pub database: DatabaseConfig,

    /// Token and registration settings
    pub auth: AuthConfig,

    /// Password hashing cost parameters
    pub password: PasswordConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_env()?;
        Ok(self)
    }

    /// Fail early when a value the service cannot run without is absent
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.signing_key.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::MissingRequired("JWT_SECRET".to_string()));
        }
        if self.auth.token_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "JWT_EXPIRATION_SECS".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        // Server
        if let Ok(host) = std::env::var("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = parse_env("API_PORT")? {
            self.server.port = port;
        }
        if let Ok(origins) = std::env::var("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(String::from)
                .collect();
        }

        // PostgreSQL
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = Some(url);
        }
        if let Some(size) = parse_env("DATABASE_POOL_SIZE")? {
            self.database.pool_size = size;
        }

        // Auth
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            self.auth.signing_key = Some(secret);
        }
        if let Some(ttl) = parse_env("JWT_EXPIRATION_SECS")? {
            self.auth.token_ttl_secs = ttl;
        }
        if let Some(allow) = parse_env("AUTH_ALLOW_PRIVILEGED_REGISTRATION")? {
            self.auth.allow_privileged_registration = allow;
        }
        if let (Ok(username), Ok(email), Ok(password)) = (
            std::env::var("BOOTSTRAP_ADMIN_USERNAME"),
            std::env::var("BOOTSTRAP_ADMIN_EMAIL"),
            std::env::var("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            self.auth.bootstrap_admin = Some(BootstrapAdmin {
                username,
                email,
                password,
            });
        }

        // Password hashing
        if let Some(cost) = parse_env("PASSWORD_MEMORY_COST")? {
            self.password.memory_cost = cost;
        }
        if let Some(cost) = parse_env("PASSWORD_TIME_COST")? {
            self.password.time_cost = cost;
        }
        if let Some(parallelism) = parse_env("PASSWORD_PARALLELISM")? {
            self.password.parallelism = parallelism;
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = parse_env("LOG_JSON")? {
            self.logging.json_format = json;
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Allowed CORS origins. Empty allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: Vec::new(),
        }
    }
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL. `None` selects the in-memory store.
    pub url: Option<String>,

    /// PostgreSQL connection pool size
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            pool_size: 10,
        }
    }
}

/// Token and registration settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Base64-encoded HMAC signing key
    #[serde(skip_serializing)]
    pub signing_key: Option<String>,

    /// Session token lifetime in seconds (default: 3600 = 1 hour)
    pub token_ttl_secs: u64,

    /// Allow ADMIN/MANAGER to be requested at self-registration
    pub allow_privileged_registration: bool,

    /// Administrator account created at startup when absent
    #[serde(skip_serializing)]
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            signing_key: None,
            token_ttl_secs: 3600,
            allow_privileged_registration: false,
            bootstrap_admin: None,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("signing_key", &self.signing_key.as_ref().map(|_| "<redacted>"))
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field(
                "allow_privileged_registration",
                &self.allow_privileged_registration,
            )
            .field("bootstrap_admin", &self.bootstrap_admin)
            .finish()
    }
}

/// Credentials for the administrator provisioned at startup
#[derive(Clone, Serialize, Deserialize)]
pub struct BootstrapAdmin {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Argon2id cost parameters
///
/// Defaults follow the OWASP minimum (19 MiB, 2 iterations, 1 lane).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordConfig {
    /// Memory cost in KiB
    pub memory_cost: u32,
    /// Iterations
    pub time_cost: u32,
    /// Lanes
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_cost: 19456,
            time_cost: 2,
            parallelism: 1,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
