// Shared rate models for the Garantex rate services
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// Rates
// ============================================================================

/// A rate observation acquired from the exchange for a single request.
///
/// `ask` and `bid` are both taken from the top-of-book bid, so they are always
/// equal. Consumers depend on that shape; keep it until a real ask is agreed on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rate {
    pub ask: Decimal,
    pub bid: Decimal,
    /// Wall-clock time the rate was acquired (not the exchange timestamp)
    pub timestamp: DateTime<Utc>,
}

impl Rate {
    /// Build a rate from the best bid, mirroring it into `ask`.
    pub fn from_best_bid(bid: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            ask: bid,
            bid,
            timestamp,
        }
    }
}

/// A rate row read back from the `rates` table.
///
/// `ask` and `bid` carry at most 8 fractional digits; see
/// [`crate::utils::money::to_storage_scale`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StoredRate {
    pub id: i64,
    pub ask: Decimal,
    pub bid: Decimal,
    pub timestamp: DateTime<Utc>,
    /// Assigned by the database on insert
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Health
// ============================================================================

/// Status of a single dependency or of the service as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
