//! Process metrics and the pull-based `/metrics` endpoint.
//!
//! Counters are plain atomics updated on the request path and rendered in the
//! Prometheus text exposition format on scrape.

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use garantex_rust_core::db::{PoolStats, RateStore};
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const CONTENT_TYPE_TEXT: &str = "text/plain; version=0.0.4";

/// RPC methods tracked by the metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcMethod {
    GetRates,
    HealthCheck,
}

impl RpcMethod {
    pub const ALL: [RpcMethod; 2] = [RpcMethod::GetRates, RpcMethod::HealthCheck];

    pub fn as_str(&self) -> &'static str {
        match self {
            RpcMethod::GetRates => "GetRates",
            RpcMethod::HealthCheck => "HealthCheck",
        }
    }

    fn index(&self) -> usize {
        match self {
            RpcMethod::GetRates => 0,
            RpcMethod::HealthCheck => 1,
        }
    }
}

#[derive(Default)]
struct RpcCounters {
    requests: AtomicU64,
    failures: AtomicU64,
    duration_micros: AtomicU64,
}

/// Core metrics for the rate service.
pub struct ServiceMetrics {
    started_at: DateTime<Utc>,
    started: Instant,

    rpc: [RpcCounters; 2],

    // Exchange
    fetch_success: AtomicU64,
    fetch_failure: AtomicU64,

    // Persistence
    save_failures: AtomicU64,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            started: Instant::now(),
            rpc: [RpcCounters::default(), RpcCounters::default()],
            fetch_success: AtomicU64::new(0),
            fetch_failure: AtomicU64::new(0),
            save_failures: AtomicU64::new(0),
        }
    }

    /// Record one handled RPC.
    pub fn record_rpc(&self, method: RpcMethod, duration: Duration, failed: bool) {
        let counters = &self.rpc[method.index()];
        counters.requests.fetch_add(1, Ordering::Relaxed);
        counters
            .duration_micros
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        if failed {
            counters.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record the outcome of an exchange fetch made for GetRates.
    pub fn record_fetch(&self, success: bool) {
        if success {
            self.fetch_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.fetch_failure.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_save_failure(&self) {
        self.save_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rpc_requests(&self, method: RpcMethod) -> u64 {
        self.rpc[method.index()].requests.load(Ordering::Relaxed)
    }

    pub fn rpc_failures(&self, method: RpcMethod) -> u64 {
        self.rpc[method.index()].failures.load(Ordering::Relaxed)
    }

    pub fn save_failures(&self) -> u64 {
        self.save_failures.load(Ordering::Relaxed)
    }

    /// Render all metrics in the Prometheus text format.
    pub fn render_prometheus(&self, pool: Option<PoolStats>) -> String {
        let mut out = String::new();

        gauge(
            &mut out,
            "process_start_time_seconds",
            "Start time of the process since unix epoch in seconds.",
            self.started_at.timestamp() as f64,
        );
        gauge(
            &mut out,
            "process_uptime_seconds",
            "Seconds since the process started.",
            self.started.elapsed().as_secs_f64(),
        );

        header(&mut out, "rate_service_rpc_requests_total", "counter", "RPCs handled.");
        for method in RpcMethod::ALL {
            let _ = writeln!(
                out,
                "rate_service_rpc_requests_total{{method=\"{}\"}} {}",
                method.as_str(),
                self.rpc_requests(method)
            );
        }

        header(&mut out, "rate_service_rpc_failures_total", "counter", "RPCs that returned an error status.");
        for method in RpcMethod::ALL {
            let _ = writeln!(
                out,
                "rate_service_rpc_failures_total{{method=\"{}\"}} {}",
                method.as_str(),
                self.rpc_failures(method)
            );
        }

        header(&mut out, "rate_service_rpc_duration_seconds_sum", "counter", "Total RPC handling time.");
        for method in RpcMethod::ALL {
            let micros = self.rpc[method.index()].duration_micros.load(Ordering::Relaxed);
            let _ = writeln!(
                out,
                "rate_service_rpc_duration_seconds_sum{{method=\"{}\"}} {}",
                method.as_str(),
                micros as f64 / 1_000_000.0
            );
        }

        header(&mut out, "rate_service_exchange_fetch_total", "counter", "Exchange fetches made for GetRates.");
        let _ = writeln!(
            out,
            "rate_service_exchange_fetch_total{{result=\"success\"}} {}",
            self.fetch_success.load(Ordering::Relaxed)
        );
        let _ = writeln!(
            out,
            "rate_service_exchange_fetch_total{{result=\"failure\"}} {}",
            self.fetch_failure.load(Ordering::Relaxed)
        );

        header(&mut out, "rate_service_save_failures_total", "counter", "Rates that could not be persisted.");
        let _ = writeln!(out, "rate_service_save_failures_total {}", self.save_failures());

        if let Some(stats) = pool {
            gauge(&mut out, "rate_service_db_pool_connections", "Open pool connections.", stats.size as f64);
            gauge(&mut out, "rate_service_db_pool_idle", "Idle pool connections.", stats.idle as f64);
            gauge(&mut out, "rate_service_db_pool_active", "Checked-out pool connections.", stats.active() as f64);
        }

        out
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn header(out: &mut String, name: &str, kind: &str, help: &str) {
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} {}", name, kind);
}

fn gauge(out: &mut String, name: &str, help: &str, value: f64) {
    header(out, name, "gauge", help);
    let _ = writeln!(out, "{} {}", name, value);
}

#[derive(Clone)]
struct MetricsState {
    metrics: Arc<ServiceMetrics>,
    store: Option<RateStore>,
}

/// Router exposing `GET /metrics`
pub fn router(metrics: Arc<ServiceMetrics>, store: Option<RateStore>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(MetricsState { metrics, store })
}

async fn metrics_handler(State(state): State<MetricsState>) -> impl IntoResponse {
    let pool = state.store.as_ref().map(RateStore::pool_stats);
    (
        [(CONTENT_TYPE, CONTENT_TYPE_TEXT)],
        state.metrics.render_prometheus(pool),
    )
}
