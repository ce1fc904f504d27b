//! Migrator configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `OP_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `OP_CHUNK_SIZE` - Orders per batch chunk (default: 50, minimum 1)
//! - `OP_MAX_CONNECTIONS` - Connection pool size (default: 5)
//! - `OP_LOCK_KEY` - Advisory lock key guarding migration runs

use secrecy::SecretString;
use thiserror::Error;

use crate::executor::{DEFAULT_CHUNK_SIZE, ExecutorConfig};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Advisory lock key used when `OP_LOCK_KEY` is unset.
pub const DEFAULT_LOCK_KEY: i64 = 0x6f70_5f73_706c_6974;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Migrator configuration.
#[derive(Debug, Clone)]
pub struct MigratorConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    pub max_connections: u32,
    pub chunk_size: usize,
    pub lock_key: i64,
}

impl MigratorConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the database URL is missing or a numeric
    /// variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any variable source.
    ///
    /// # Errors
    ///
    /// Same as [`Self::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("OP_DATABASE_URL")
            .or_else(|| lookup("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("OP_DATABASE_URL".to_string()))?;

        let chunk_size: usize = parse_or(&lookup, "OP_CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?;
        if chunk_size == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "OP_CHUNK_SIZE".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            database_url,
            max_connections: parse_or(&lookup, "OP_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
            chunk_size,
            lock_key: parse_or(&lookup, "OP_LOCK_KEY", DEFAULT_LOCK_KEY)?,
        })
    }

    /// Executor settings derived from this configuration.
    #[must_use]
    pub const fn executor(&self) -> ExecutorConfig {
        ExecutorConfig::new(self.chunk_size)
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<MigratorConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        MigratorConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[("OP_DATABASE_URL", "postgres://localhost/orders")]).unwrap();
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.lock_key, DEFAULT_LOCK_KEY);
    }

    #[test]
    fn test_falls_back_to_database_url() {
        let config = config(&[("DATABASE_URL", "postgres://fallback/db")]).unwrap();
        assert_eq!(config.database_url.expose_secret(), "postgres://fallback/db");
    }

    #[test]
    fn test_missing_database_url() {
        let err = config(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref key) if key == "OP_DATABASE_URL"));
    }

    #[test]
    fn test_invalid_chunk_size() {
        let err = config(&[("DATABASE_URL", "postgres://x"), ("OP_CHUNK_SIZE", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "OP_CHUNK_SIZE"));

        let err = config(&[("DATABASE_URL", "postgres://x"), ("OP_CHUNK_SIZE", "many")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(..)));
    }

    #[test]
    fn test_chunk_size_flows_into_executor() {
        let config = config(&[("DATABASE_URL", "postgres://x"), ("OP_CHUNK_SIZE", " 7 ")]).unwrap();
        assert_eq!(config.executor().chunk_size(), 7);
    }
}
