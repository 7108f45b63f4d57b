//! Rate database operations
//!
//! Inserts and queries over the flat `rates` time-series table. Rows are
//! only ever inserted; nothing here updates or deletes.

use super::health::{check_pool_health, get_pool_stats, PoolStats};
use super::pool::{create_pool, DbPoolConfig};
use super::StoreError;
use crate::models::{Rate, StoredRate};
use crate::utils::money::to_storage_scale;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgConnectOptions;
use sqlx::PgPool;
use tracing::{debug, info};

/// Storage operations the rate service depends on.
///
/// Every method is a single database round trip; dropping the future aborts it.
#[async_trait]
pub trait RateRepository: Send + Sync {
    /// Insert one rate. `created_at` is assigned by the database and prices
    /// are rounded to the column scale.
    async fn save(&self, rate: &Rate) -> Result<(), StoreError>;

    /// Row with the greatest timestamp, `None` when the table is empty
    async fn latest(&self) -> Result<Option<StoredRate>, StoreError>;

    /// Rows with `from <= timestamp <= to`, newest first
    async fn range_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<StoredRate>, StoreError>;

    /// Total number of stored rates
    async fn count(&self) -> Result<i64, StoreError>;
}

/// PostgreSQL-backed [`RateRepository`]
#[derive(Debug, Clone)]
pub struct RateStore {
    pool: PgPool,
}

impl RateStore {
    /// Create the pool and verify the database is reachable.
    pub async fn connect(
        connect_opts: PgConnectOptions,
        config: &DbPoolConfig,
    ) -> Result<Self, StoreError> {
        let pool = create_pool(connect_opts, config)
            .await
            .map_err(StoreError::Connect)?;

        check_pool_health(&pool)
            .await
            .map_err(StoreError::Unreachable)?;

        Ok(Self { pool })
    }

    /// Apply the embedded migrations (creates `rates` if absent)
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database schema is up to date");
        Ok(())
    }

    pub fn pool_stats(&self) -> PoolStats {
        get_pool_stats(&self.pool)
    }

    /// Close the pool, waiting for checked-out connections to be returned
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }
}

#[async_trait]
impl RateRepository for RateStore {
    async fn save(&self, rate: &Rate) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO rates (ask, bid, timestamp, created_at)
            VALUES ($1, $2, $3, NOW())
            "#,
        )
        .bind(to_storage_scale(rate.ask))
        .bind(to_storage_scale(rate.bid))
        .bind(rate.timestamp)
        .execute(&self.pool)
        .await
        .map_err(StoreError::query("save rate"))?;

        debug!(
            "Rate saved to database: ask={} bid={} timestamp={}",
            rate.ask,
            rate.bid,
            rate.timestamp.to_rfc3339()
        );

        Ok(())
    }

    async fn latest(&self) -> Result<Option<StoredRate>, StoreError> {
        let record = sqlx::query_as::<_, StoredRate>(
            r#"
            SELECT id, ask, bid, timestamp, created_at
            FROM rates
            ORDER BY timestamp DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::query("get latest rate"))?;

        Ok(record)
    }

    async fn range_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<StoredRate>, StoreError> {
        let records = sqlx::query_as::<_, StoredRate>(
            r#"
            SELECT id, ask, bid, timestamp, created_at
            FROM rates
            WHERE timestamp BETWEEN $1 AND $2
            ORDER BY timestamp DESC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::query("query rates by time range"))?;

        Ok(records)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM rates")
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::query("get rates count"))?;

        Ok(count)
    }
}
