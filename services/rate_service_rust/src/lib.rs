//! rate_service_rust - serves exchange rates and a composite health check over gRPC

pub mod app;
pub mod config;
pub mod grpc;
pub mod metrics;
pub mod service;

pub mod proto {
    tonic::include_proto!("rate_service.v1");
}

pub use app::App;
pub use config::AppConfig;
pub use service::{HealthReport, RateService, ServiceError};
