//! Standardized database connection pool configuration
//!
//! One pool is created at startup and shared by every request task.

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

/// Database pool configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DbPoolConfig {
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of idle connections to maintain
    pub min_connections: u32,
    /// Maximum lifetime of a connection (prevents stale connections)
    pub max_lifetime: Duration,
    /// Maximum idle time before a connection is closed
    pub idle_timeout: Duration,
    /// Connection timeout
    pub acquire_timeout: Duration,
}

impl Default for DbPoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            max_lifetime: Duration::from_secs(1800), // 30 minutes
            idle_timeout: Duration::from_secs(600),  // 10 minutes
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

impl DbPoolConfig {
    /// Configuration for short-lived tooling and tests
    pub fn low_concurrency() -> Self {
        Self {
            max_connections: 2,
            min_connections: 0,
            ..Default::default()
        }
    }
}

/// Create a PostgreSQL connection pool with standardized configuration
pub async fn create_pool(
    connect_opts: PgConnectOptions,
    config: &DbPoolConfig,
) -> Result<PgPool, sqlx::Error> {
    info!(
        "Creating database pool: max={}, min={}, max_lifetime={:?}, idle_timeout={:?}",
        config.max_connections, config.min_connections, config.max_lifetime, config.idle_timeout
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .max_lifetime(config.max_lifetime)
        .idle_timeout(config.idle_timeout)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(connect_opts)
        .await?;

    info!("Database pool created successfully");
    Ok(pool)
}
