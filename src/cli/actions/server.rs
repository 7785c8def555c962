use crate::{
    api::{self, AppConfig, AppState},
    forms::PasswordPolicy,
    storage::{memory::MemoryStore, postgres::PgStore},
};
use anyhow::{Context, Result, bail};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub session_ttl_seconds: i64,
    pub session_cookie_secure: bool,
    pub password_min_length: usize,
}

/// Which store a DSN selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Memory,
    Postgres,
}

fn backend(dsn: &str) -> Result<Backend> {
    let url = Url::parse(dsn).context("Invalid DSN")?;
    match url.scheme() {
        "memory" => Ok(Backend::Memory),
        "postgres" | "postgresql" => Ok(Backend::Postgres),
        other => bail!("Unsupported DSN scheme: {other}"),
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the DSN is invalid, the database is unreachable, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let config = AppConfig::new()
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_session_cookie_secure(args.session_cookie_secure)
        .with_password_policy(PasswordPolicy::new().with_min_length(args.password_min_length));

    let state = match backend(&args.dsn)? {
        Backend::Memory => {
            warn!("Using the in-memory store; all data is lost on exit");
            AppState::with_store(config, Arc::new(MemoryStore::new()))
        }
        Backend::Postgres => {
            let pool = PgPoolOptions::new()
                .min_connections(1)
                .max_connections(5)
                .max_lifetime(Duration::from_secs(60 * 2))
                .test_before_acquire(true)
                .connect(&args.dsn)
                .await
                .context("Failed to connect to database")?;
            info!("Connected to database");
            AppState::with_store(config, Arc::new(PgStore::new(pool)))
        }
    };

    api::new(args.port, state).await
}
