//! Account API Server
//!
//! Author: hephaex@gmail.com

use account_api::audit::{audit_log, AuditEvent};
use account_api::auth::SigningKey;
use account_api::{create_router, state::AppState};
use account_core::config::{AppConfig, ConfigError, LoggingConfig};
use account_core::{CredentialStore, MemoryStore, PgStore, RoleName};
use anyhow::Context;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = match std::env::var("ACCOUNT_CONFIG") {
        Ok(path) => AppConfig::from_file(path)?.with_env_override()?,
        Err(_) => AppConfig::from_env()?,
    };

    init_tracing(&config.logging);
    config.validate()?;

    let signing_key = config
        .auth
        .signing_key
        .as_deref()
        .map(SigningKey::from_base64)
        .transpose()
        .map_err(|e| ConfigError::InvalidValue {
            key: "JWT_SECRET".to_string(),
            value: e.to_string(),
        })?
        .context("JWT_SECRET is not set")?;

    // Create application state
    let state = match config.database.url.clone() {
        Some(url) => {
            let store = PgStore::connect(&url, config.database.pool_size).await?;
            tracing::info!("Connected to PostgreSQL");
            build_state(config, &signing_key, Arc::new(store)).await?
        }
        None => {
            tracing::warn!("DATABASE_URL not set, accounts are kept in memory only");
            build_state(config, &signing_key, Arc::new(MemoryStore::new())).await?
        }
    };
    drop(signing_key);

    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let app = create_router(state.clone());

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Account API Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);
    tracing::info!("OpenAPI document at http://{}/api-docs/openapi.json", addr);

    let shutdown_state = state.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            shutdown_state.set_ready(false);
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("account_api={0},account_core={0},tower_http=info", logging.level).into()
    });

    if logging.json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Seed the role table, provision the bootstrap administrator and wrap the store
async fn build_state<S>(
    config: AppConfig,
    signing_key: &SigningKey,
    store: Arc<S>,
) -> anyhow::Result<Arc<AppState>>
where
    S: account_core::NotificationStore + CredentialStore + 'static,
{
    let seeded = store.seed_roles().await?;
    if seeded > 0 {
        tracing::info!("Seeded {} roles", seeded);
    }

    let bootstrap = config.auth.bootstrap_admin.clone();
    let state = Arc::new(AppState::new(config, signing_key, store));

    if let Some(admin) = bootstrap {
        let roles = BTreeSet::from([RoleName::User, RoleName::Admin]);
        match state
            .accounts
            .provision(&admin.username, &admin.email, &admin.password, roles)
            .await?
        {
            Some(user) => audit_log(&AuditEvent::AdminProvisioned {
                user_id: user.id,
                username: user.username,
            }),
            None => tracing::debug!("Bootstrap administrator {} already exists", admin.username),
        }
    }

    Ok(state)
}
