//! Rate persistence.
//!
//! - `pool`: pool configuration and creation
//! - `health`: reachability probe and pool statistics
//! - `rates`: the `rates` table (insert and read queries)

pub mod health;
pub mod pool;
pub mod rates;

pub use health::{check_pool_health, get_pool_stats, PoolStats};
pub use pool::{create_pool, DbPoolConfig};
pub use rates::{RateRepository, RateStore};

use thiserror::Error;

/// Errors raised by the rate store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create database connection pool: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("failed to ping database: {0}")]
    Unreachable(#[source] sqlx::Error),

    #[error("failed to run database migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("failed to {operation}: {source}")]
    Query {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

impl StoreError {
    pub(crate) fn query(operation: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| StoreError::Query { operation, source }
    }
}
