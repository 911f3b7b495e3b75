//! Pool construction and migrations.

use crate::PostgresError;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

/// Connection pool settings.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// `postgres://` URL.
    pub url: String,

    /// Maximum pool size.
    ///
    /// Default: 10
    pub max_connections: u32,

    /// How long to wait for a free connection.
    ///
    /// Default: 5 seconds
    pub acquire_timeout: Duration,
}

impl PoolConfig {
    /// Settings for `url` with defaults.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }

    /// Set the maximum pool size.
    #[must_use]
    pub const fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the acquire timeout.
    #[must_use]
    pub const fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}

/// Build a pool.
///
/// # Errors
///
/// Returns [`PostgresError::Connect`] if the first connection fails.
pub async fn connect(config: &PoolConfig) -> Result<PgPool, PostgresError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(&config.url)
        .await
        .map_err(|e| PostgresError::Connect(e.to_string()))?;
    tracing::info!(max_connections = config.max_connections, "PostgreSQL pool ready");
    Ok(pool)
}

/// Apply the embedded migrations.
///
/// # Errors
///
/// Returns [`PostgresError::Migrate`] if a migration fails.
pub async fn migrate(pool: &PgPool) -> Result<(), PostgresError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| PostgresError::Migrate(e.to_string()))?;
    tracing::info!("Migrations applied");
    Ok(())
}
