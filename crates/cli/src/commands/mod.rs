//! Command implementations and shared plumbing.

pub mod db;
pub mod profiles;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::ValueEnum;
use serde::Serialize;
use thiserror::Error;

use order_profiles_migrator::store::postgres::create_pool;
use order_profiles_migrator::{ConfigError, MigratorConfig, PgStore};

/// Errors shared by every command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to render output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to render output: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}

/// Load configuration and connect to the database.
pub async fn connect() -> Result<(MigratorConfig, PgStore), CommandError> {
    let config = MigratorConfig::from_env()?;

    tracing::info!("Connecting to database...");
    let pool = create_pool(&config.database_url, config.max_connections).await?;
    let store = PgStore::new(pool, config.lock_key);
    Ok((config, store))
}

/// Print a report to stdout in the requested format.
pub fn emit<T: Serialize>(value: &T, format: OutputFormat) -> Result<(), CommandError> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    };

    #[allow(clippy::print_stdout)]
    {
        println!("{rendered}");
    }
    Ok(())
}

/// A flag set once the user presses Ctrl-C.
///
/// The batch stops at the next chunk boundary.
pub fn cancel_on_ctrl_c() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let handle = Arc::clone(&flag);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current chunk");
            handle.store(true, Ordering::SeqCst);
        }
    });
    flag
}
