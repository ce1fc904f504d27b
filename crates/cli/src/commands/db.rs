//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! op-cli db migrate
//! ```
//!
//! # Environment Variables
//!
//! - `OP_DATABASE_URL` - `PostgreSQL` connection string (or `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Schema migrations live in `crates/migrator/migrations/`.

use thiserror::Error;

use order_profiles_migrator::store::postgres::run_migrations;

use super::{CommandError, connect};

/// Errors that can occur while applying the schema.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Apply pending schema migrations.
pub async fn migrate() -> Result<(), MigrationError> {
    let (_, store) = connect().await?;

    tracing::info!("Running migrations...");
    run_migrations(store.pool()).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
