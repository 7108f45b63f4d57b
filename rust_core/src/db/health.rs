//! Database connection health checks

use sqlx::PgPool;

/// Check if database pool is reachable
pub async fn check_pool_health(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").fetch_one(pool).await?;
    Ok(())
}

/// Get database pool statistics
pub fn get_pool_stats(pool: &PgPool) -> PoolStats {
    PoolStats {
        size: pool.size(),
        idle: pool.num_idle(),
    }
}

/// Database pool statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Total number of connections in the pool
    pub size: u32,
    /// Number of idle connections
    pub idle: usize,
}

impl PoolStats {
    pub fn active(&self) -> u32 {
        self.size.saturating_sub(self.idle as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_connections() {
        let stats = PoolStats { size: 5, idle: 2 };
        assert_eq!(stats.active(), 3);

        // idle can briefly exceed size while connections are being reaped
        let stats = PoolStats { size: 1, idle: 3 };
        assert_eq!(stats.active(), 0);
    }
}
