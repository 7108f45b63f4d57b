//! Process composition: wiring, server tasks and graceful shutdown.

use crate::config::{AppConfig, LogFormat};
use crate::grpc::RateServiceGrpc;
use crate::metrics::{self, ServiceMetrics};
use crate::service::RateService;
use anyhow::{anyhow, Context, Result};
use garantex_rust_core::clients::ExchangeClient;
use garantex_rust_core::db::RateStore;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise the configured level applies.
pub fn init_tracing(config: &AppConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log.level)
            .with_context(|| format!("LOG_LEVEL {:?} is not a valid filter", config.log.level))?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match config.log.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {}", e))
}

pub struct App {
    config: AppConfig,
    store: RateStore,
    service: Arc<RateService>,
    metrics: Arc<ServiceMetrics>,
}

impl App {
    /// Connect to the database and build every component.
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("Connecting to database at {}", config.database.describe());
        let store = RateStore::connect(config.database.connect_options()?, &config.database.pool)
            .await
            .context("Failed to create rate store")?;

        if config.database.run_migrations {
            store
                .ensure_schema()
                .await
                .context("Failed to prepare database schema")?;
        }

        let exchange = ExchangeClient::new(&config.exchange.base_url, config.exchange.timeout)
            .context("Failed to create exchange client")?;

        let metrics = Arc::new(ServiceMetrics::new());
        let service = Arc::new(RateService::new(
            Arc::new(exchange),
            Arc::new(store.clone()),
            metrics.clone(),
        ));

        Ok(Self {
            config,
            store,
            service,
            metrics,
        })
    }

    /// Serve until SIGINT/SIGTERM or until a server stops on its own, then
    /// drain within the grace period and release the pool.
    pub async fn run(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let grpc_addr = SocketAddr::from(([0, 0, 0, 0], self.config.server.grpc_port));
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], self.config.server.metrics_port));

        let metrics_listener = TcpListener::bind(metrics_addr)
            .await
            .with_context(|| format!("Failed to bind metrics listener on {}", metrics_addr))?;

        let grpc_task = spawn_grpc(
            grpc_addr,
            RateServiceGrpc::new(self.service.clone()),
            self.config.server.request_timeout,
            shutdown_rx.clone(),
        );
        let metrics_task = spawn_metrics(
            metrics_listener,
            metrics::router(self.metrics.clone(), Some(self.store.clone())),
            shutdown_rx,
        );

        let outcome = supervise(
            grpc_task,
            metrics_task,
            shutdown_tx,
            self.config.server.shutdown_grace,
            shutdown_signal(),
        )
        .await;

        self.store.close().await;
        match &outcome {
            Ok(()) => info!("Application shutdown completed"),
            Err(e) => error!("Application stopped after a server failure: {:#}", e),
        }
        outcome
    }
}

/// Wait for `signal` or for either server to stop, then broadcast shutdown
/// and drain both within `grace`.
///
/// A server stopping before the signal is a failure and is returned as the
/// error. Errors seen while draining after the signal are only logged.
async fn supervise<S>(
    mut grpc_task: JoinHandle<Result<()>>,
    mut metrics_task: JoinHandle<Result<()>>,
    shutdown_tx: watch::Sender<bool>,
    grace: Duration,
    signal: S,
) -> Result<()>
where
    S: Future<Output = ()>,
{
    let mut grpc_done = false;
    let mut metrics_done = false;
    let outcome = tokio::select! {
        _ = signal => {
            info!("Received shutdown signal");
            Ok(())
        }
        result = &mut grpc_task => {
            grpc_done = true;
            early_exit("gRPC server", result)
        }
        result = &mut metrics_task => {
            metrics_done = true;
            early_exit("Metrics server", result)
        }
    };

    info!("Shutting down application...");
    let _ = shutdown_tx.send(true);

    let drain = async {
        if !grpc_done {
            log_task_exit("gRPC server", (&mut grpc_task).await);
        }
        if !metrics_done {
            log_task_exit("Metrics server", (&mut metrics_task).await);
        }
    };
    if tokio::time::timeout(grace, drain).await.is_err() {
        warn!("Servers did not stop within {:?}, aborting", grace);
        grpc_task.abort();
        metrics_task.abort();
    }

    outcome
}

/// Outcome of a server task that finished before any shutdown was requested
fn early_exit(name: &str, result: Result<Result<()>, JoinError>) -> Result<()> {
    match result {
        Ok(Ok(())) => Err(anyhow!("{} stopped unexpectedly", name)),
        Ok(Err(e)) => Err(e),
        Err(e) => Err(anyhow!("{} task panicked or was cancelled: {}", name, e)),
    }
}

fn spawn_grpc(
    addr: SocketAddr,
    handler: RateServiceGrpc,
    request_timeout: Duration,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<Result<()>> {
    tokio::spawn(async move {
        info!("Starting gRPC server on {}", addr);
        tonic::transport::Server::builder()
            .timeout(request_timeout)
            .add_service(handler.into_server())
            .serve_with_shutdown(addr, wait_for_shutdown(shutdown))
            .await
            .context("gRPC server failed")
    })
}

fn spawn_metrics(
    listener: TcpListener,
    router: axum::Router,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<Result<()>> {
    tokio::spawn(async move {
        info!("Starting metrics server on {:?}", listener.local_addr().ok());
        axum::serve(listener, router)
            .with_graceful_shutdown(wait_for_shutdown(shutdown))
            .await
            .context("Metrics server failed")
    })
}

fn log_task_exit(name: &str, result: Result<Result<()>, JoinError>) {
    match result {
        Ok(Ok(())) => info!("{} stopped", name),
        Ok(Err(e)) => error!("{}: {:#}", name, e),
        Err(e) => error!("{} task panicked or was cancelled: {}", name, e),
    }
}

/// Resolves once `true` is broadcast (or the sender is gone)
async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Unable to listen for shutdown signal: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("Unable to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
