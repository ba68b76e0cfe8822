//! Account CLI - operator tools
//!
//! Usage:
//!   account keygen
//!   account hash-password <password>
//!   account inspect-token <token>

use account_api::auth::{hash_password_with_config, SigningKey, TokenCodec};
use account_core::AppConfig;
use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "account")]
#[command(about = "Account service operator tools")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a fresh base64-encoded 256-bit signing key
    Keygen,
    /// Hash a password with the configured Argon2 parameters
    HashPassword {
        /// Password to hash
        password: String,
    },
    /// Verify a session token and print its claims
    InspectToken {
        /// Token, with or without the `Bearer ` prefix
        token: String,

        /// Base64 signing key
        #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
        secret: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Keygen => {
            println!("{}", SigningKey::generate().to_base64());
        }
        Commands::HashPassword { password } => {
            let config = AppConfig::from_env()?;
            let hash = tokio::task::spawn_blocking(move || {
                hash_password_with_config(&password, &config.password)
            })
            .await??;
            println!("{hash}");
        }
        Commands::InspectToken { token, secret } => {
            let report = inspect_token(&token, &secret)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

/// Verify `token` against `secret` and describe its claims
fn inspect_token(token: &str, secret: &str) -> anyhow::Result<Value> {
    let key = SigningKey::from_base64(secret).context("Invalid signing key")?;
    // The TTL only applies to issuing
    let codec = TokenCodec::new(&key, Duration::ZERO);

    let token = token.trim();
    let token = token.strip_prefix("Bearer ").unwrap_or(token);
    let claims = codec.verify(token).context("Token rejected")?;

    Ok(json!({
        "subject": claims.username(),
        "roles": claims.roles(),
        "issued_at": timestamp(claims.issued_at()),
        "expires_at": timestamp(claims.expires_at()),
        "expired": claims.is_expired(),
    }))
}

fn timestamp(secs: u64) -> Option<String> {
    let secs = i64::try_from(secs).ok()?;
    DateTime::<Utc>::from_timestamp(secs, 0).map(|t| t.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;
    use account_core::RoleName;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_inspect_token_with_secret_flag() {
        let cli = Cli::try_parse_from(["account", "inspect-token", "abc", "--secret", "c2VjcmV0"])
            .unwrap();
        match cli.command {
            Commands::InspectToken { token, secret } => {
                assert_eq!(token, "abc");
                assert_eq!(secret, "c2VjcmV0");
            }
            _ => panic!("expected inspect-token"),
        }
    }

    #[test]
    fn test_inspect_valid_token() {
        let key = SigningKey::generate();
        let codec = TokenCodec::new(&key, Duration::from_secs(3600));
        let token = codec
            .issue_session("alice", [RoleName::User, RoleName::Admin])
            .unwrap();

        let report = inspect_token(&format!("Bearer {token}"), &key.to_base64()).unwrap();
        assert_eq!(report["subject"], "alice");
        assert_eq!(report["roles"], json!(["USER", "ADMIN"]));
        assert_eq!(report["expired"], false);
        assert!(report["expires_at"].is_string());
    }

    #[test]
    fn test_inspect_expired_token_still_reports() {
        let key = SigningKey::generate();
        let token = TokenCodec::new(&key, Duration::from_secs(3600))
            .issue("alice", [RoleName::User], Duration::ZERO)
            .unwrap();

        let report = inspect_token(&token, &key.to_base64()).unwrap();
        assert_eq!(report["expired"], true);
    }

    #[test]
    fn test_inspect_rejects_wrong_key() {
        let token = TokenCodec::new(&SigningKey::generate(), Duration::from_secs(3600))
            .issue_session("alice", [RoleName::User])
            .unwrap();

        let other = SigningKey::generate().to_base64();
        assert!(inspect_token(&token, &other).is_err());
        assert!(inspect_token(&token, "not base64!").is_err());
    }

    #[test]
    fn test_generated_key_round_trips() {
        let encoded = SigningKey::generate().to_base64();
        assert!(SigningKey::from_base64(&encoded).is_ok());
    }
}
