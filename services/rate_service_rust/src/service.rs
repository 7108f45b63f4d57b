//! Rate service: acquisition, best-effort persistence and composite health.

use crate::metrics::ServiceMetrics;
use chrono::{SecondsFormat, Utc};
use garantex_rust_core::clients::{ExchangeError, RateSource};
use garantex_rust_core::db::RateRepository;
use garantex_rust_core::models::{HealthStatus, Rate};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Upper bound on the exchange probe inside a health check
pub const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("failed to get rates from exchange: {0}")]
    Exchange(#[from] ExchangeError),
}

/// Result of a health check. Never an error; failures are encoded in `status`.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub details: BTreeMap<String, String>,
}

pub struct RateService {
    source: Arc<dyn RateSource>,
    store: Arc<dyn RateRepository>,
    metrics: Arc<ServiceMetrics>,
    probe_timeout: Duration,
}

impl RateService {
    pub fn new(
        source: Arc<dyn RateSource>,
        store: Arc<dyn RateRepository>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            source,
            store,
            metrics,
            probe_timeout: HEALTH_PROBE_TIMEOUT,
        }
    }

    /// Override the exchange probe timeout used by [`Self::health_check`]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn metrics(&self) -> &Arc<ServiceMetrics> {
        &self.metrics
    }

    /// Fetch a fresh rate and try to persist it.
    ///
    /// A failed save is logged and counted; the fetched rate is still
    /// returned.
    pub async fn get_rates(&self) -> Result<Rate, ServiceError> {
        let rate = match self.source.fetch_rate().await {
            Ok(rate) => {
                self.metrics.record_fetch(true);
                rate
            }
            Err(e) => {
                self.metrics.record_fetch(false);
                error!(
                    "Failed to get rates from {}: {}",
                    self.source.source_name(),
                    e
                );
                return Err(e.into());
            }
        };

        if let Err(e) = self.store.save(&rate).await {
            self.metrics.record_save_failure();
            error!("Failed to save rate to database: {}", e);
        }

        info!(
            "GetRates completed successfully: ask={} bid={}",
            rate.ask, rate.bid
        );

        Ok(rate)
    }

    /// Blend database and exchange reachability into one status.
    ///
    /// A database failure short-circuits to `unhealthy` without probing the
    /// exchange. Nothing is persisted.
    pub async fn health_check(&self) -> HealthReport {
        debug!("HealthCheck called");
        let mut details = BTreeMap::new();

        let records = match self.store.count().await {
            Ok(count) => count,
            Err(e) => {
                error!("Database health check failed: {}", e);
                details.insert("database".to_string(), "connection failed".to_string());
                details.insert("error".to_string(), e.to_string());
                details.insert("timestamp".to_string(), now_rfc3339());
                return HealthReport {
                    status: HealthStatus::Unhealthy,
                    details,
                };
            }
        };

        let exchange_status =
            match tokio::time::timeout(self.probe_timeout, self.source.fetch_rate()).await {
                Ok(Ok(_)) => HealthStatus::Healthy,
                Ok(Err(e)) => {
                    warn!("Exchange health check failed: {}", e);
                    HealthStatus::Unhealthy
                }
                Err(_) => {
                    warn!(
                        "Exchange health check timed out after {:?}",
                        self.probe_timeout
                    );
                    HealthStatus::Unhealthy
                }
            };

        let status = match exchange_status {
            HealthStatus::Healthy => HealthStatus::Healthy,
            _ => HealthStatus::Degraded,
        };

        details.insert("database".to_string(), HealthStatus::Healthy.to_string());
        details.insert("database_records".to_string(), records.to_string());
        details.insert("exchange".to_string(), exchange_status.to_string());
        details.insert("timestamp".to_string(), now_rfc3339());

        debug!("HealthCheck completed: status={}", status);
        HealthReport { status, details }
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::DateTime;
    use garantex_rust_core::db::StoreError;
    use garantex_rust_core::models::StoredRate;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    enum SourceBehavior {
        Ok(Decimal),
        Fail,
        Hang,
    }

    struct StubSource {
        behavior: SourceBehavior,
        calls: AtomicUsize,
    }

    impl StubSource {
        fn new(behavior: SourceBehavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl RateSource for StubSource {
        fn source_name(&self) -> &str {
            "stub"
        }

        async fn fetch_rate(&self) -> Result<Rate, ExchangeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                SourceBehavior::Ok(price) => Ok(Rate::from_best_bid(price, Utc::now())),
                SourceBehavior::Fail => Err(ExchangeError::UnexpectedStatus {
                    status: 503,
                    body: "maintenance".to_string(),
                }),
                SourceBehavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(ExchangeError::NoLiquidity)
                }
            }
        }
    }

    /// In-memory store; `fail` makes every operation error out.
    struct StubStore {
        fail: bool,
        saved: Mutex<Vec<Rate>>,
    }

    impl StubStore {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                fail,
                saved: Mutex::new(Vec::new()),
            })
        }

        fn failure(operation: &'static str) -> StoreError {
            StoreError::Query {
                operation,
                source: sqlx::Error::PoolTimedOut,
            }
        }
    }

    #[async_trait]
    impl RateRepository for StubStore {
        async fn save(&self, rate: &Rate) -> Result<(), StoreError> {
            if self.fail {
                return Err(Self::failure("save rate"));
            }
            self.saved.lock().unwrap().push(rate.clone());
            Ok(())
        }

        async fn latest(&self) -> Result<Option<StoredRate>, StoreError> {
            Ok(None)
        }

        async fn range_between(
            &self,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
        ) -> Result<Vec<StoredRate>, StoreError> {
            Ok(Vec::new())
        }

        async fn count(&self) -> Result<i64, StoreError> {
            if self.fail {
                return Err(Self::failure("get rates count"));
            }
            Ok(self.saved.lock().unwrap().len() as i64)
        }
    }

    fn service(source: Arc<StubSource>, store: Arc<StubStore>) -> RateService {
        RateService::new(source, store, Arc::new(ServiceMetrics::new()))
    }

    #[tokio::test]
    async fn test_get_rates_saves_and_returns_rate() {
        let store = StubStore::new(false);
        let svc = service(StubSource::new(SourceBehavior::Ok(Decimal::new(9585, 2))), store.clone());

        let rate = svc.get_rates().await.unwrap();

        assert_eq!(rate.bid, Decimal::new(9585, 2));
        assert_eq!(rate.ask, rate.bid);
        assert_eq!(store.saved.lock().unwrap().as_slice(), &[rate]);
    }

    #[tokio::test]
    async fn test_get_rates_survives_save_failure() {
        let svc = service(
            StubSource::new(SourceBehavior::Ok(Decimal::new(100, 0))),
            StubStore::new(true),
        );

        let rate = svc.get_rates().await.unwrap();

        assert_eq!(rate.bid, Decimal::new(100, 0));
        assert_eq!(svc.metrics().save_failures(), 1);
    }

    #[tokio::test]
    async fn test_get_rates_propagates_fetch_failure() {
        let store = StubStore::new(false);
        let svc = service(StubSource::new(SourceBehavior::Fail), store.clone());

        let err = svc.get_rates().await.unwrap_err();

        assert!(err.to_string().contains("failed to get rates from exchange"));
        assert!(err.to_string().contains("503"));
        // Nothing is persisted when the fetch fails
        assert!(store.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_health_unhealthy_when_database_fails() {
        let source = StubSource::new(SourceBehavior::Ok(Decimal::ONE));
        let svc = service(source.clone(), StubStore::new(true));

        let report = svc.health_check().await;

        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert_eq!(report.details["database"], "connection failed");
        assert!(report.details["error"].contains("get rates count"));
        assert!(!report.details.contains_key("exchange"));
        // Exchange is not probed once the database check failed
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_health_degraded_when_exchange_fails() {
        let svc = service(StubSource::new(SourceBehavior::Fail), StubStore::new(false));

        let report = svc.health_check().await;

        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.details["database"], "healthy");
        assert_eq!(report.details["database_records"], "0");
        assert_eq!(report.details["exchange"], "unhealthy");
    }

    #[tokio::test]
    async fn test_health_healthy_when_both_succeed() {
        let store = StubStore::new(false);
        let svc = service(StubSource::new(SourceBehavior::Ok(Decimal::ONE)), store.clone());
        svc.get_rates().await.unwrap();

        let report = svc.health_check().await;

        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.details["exchange"], "healthy");
        assert_eq!(report.details["database_records"], "1");
        assert!(DateTime::parse_from_rfc3339(&report.details["timestamp"]).is_ok());
        // The probe's rate is not persisted
        assert_eq!(store.saved.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_degraded_when_probe_times_out() {
        let svc = service(StubSource::new(SourceBehavior::Hang), StubStore::new(false));

        let report = svc.health_check().await;

        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.details["exchange"], "unhealthy");
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_probe_respects_custom_timeout() {
        let svc = service(StubSource::new(SourceBehavior::Hang), StubStore::new(false))
            .with_probe_timeout(Duration::from_millis(50));

        let started = tokio::time::Instant::now();
        let report = svc.health_check().await;

        assert_eq!(report.status, HealthStatus::Degraded);
        assert!(started.elapsed() < HEALTH_PROBE_TIMEOUT);
    }

    /// Sets its flag when dropped
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    /// Store whose `save` never completes
    #[derive(Default)]
    struct HangingStore {
        save_started: AtomicBool,
        save_dropped: Arc<AtomicBool>,
    }

    #[async_trait]
    impl RateRepository for HangingStore {
        async fn save(&self, _rate: &Rate) -> Result<(), StoreError> {
            let _guard = DropFlag(self.save_dropped.clone());
            self.save_started.store(true, Ordering::SeqCst);
            std::future::pending::<()>().await;
            Ok(())
        }

        async fn latest(&self) -> Result<Option<StoredRate>, StoreError> {
            Ok(None)
        }

        async fn range_between(
            &self,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
        ) -> Result<Vec<StoredRate>, StoreError> {
            Ok(Vec::new())
        }

        async fn count(&self) -> Result<i64, StoreError> {
            Ok(0)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_get_rates_drops_pending_save() {
        let store = Arc::new(HangingStore::default());
        let svc = RateService::new(
            StubSource::new(SourceBehavior::Ok(Decimal::ONE)),
            store.clone(),
            Arc::new(ServiceMetrics::new()),
        );

        let result = tokio::time::timeout(Duration::from_secs(1), svc.get_rates()).await;

        assert!(result.is_err());
        assert!(store.save_started.load(Ordering::SeqCst));
        assert!(store.save_dropped.load(Ordering::SeqCst));
        // Cancellation is not a save failure
        assert_eq!(svc.metrics().save_failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_outer_deadline_caps_health_probe() {
        let svc = service(StubSource::new(SourceBehavior::Hang), StubStore::new(false));

        let started = tokio::time::Instant::now();
        let result = tokio::time::timeout(Duration::from_millis(100), svc.health_check()).await;

        assert!(result.is_err());
        assert!(started.elapsed() < HEALTH_PROBE_TIMEOUT);
    }
}
