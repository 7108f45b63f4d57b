//! gRPC transport for [`RateService`].

use crate::metrics::RpcMethod;
use crate::proto::rate_service_server::{
    RateService as RateServiceRpc, RateServiceServer as GeneratedServer,
};
use crate::proto::{GetRatesRequest, GetRatesResponse, HealthCheckRequest, HealthCheckResponse};
use crate::service::RateService;
use garantex_rust_core::models::Rate;
use garantex_rust_core::utils::money::to_wire_f64;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tonic::{Request, Response, Status};
use tracing::{error, info};

/// tonic handler delegating to the shared [`RateService`]
#[derive(Clone)]
pub struct RateServiceGrpc {
    service: Arc<RateService>,
}

impl RateServiceGrpc {
    pub fn new(service: Arc<RateService>) -> Self {
        Self { service }
    }

    pub fn into_server(self) -> GeneratedServer<Self> {
        GeneratedServer::new(self)
    }

    /// Log and count one RPC around `handler`
    async fn observe<T, F>(&self, method: RpcMethod, handler: F) -> Result<T, Status>
    where
        F: Future<Output = Result<T, Status>>,
    {
        let start = Instant::now();
        info!("gRPC request started: method={}", method.as_str());

        let result = handler.await;
        let duration = start.elapsed();

        match &result {
            Ok(_) => info!(
                "gRPC request completed: method={} duration={:?}",
                method.as_str(),
                duration
            ),
            Err(status) => error!(
                "gRPC request failed: method={} duration={:?} error={}",
                method.as_str(),
                duration,
                status.message()
            ),
        }

        self.service
            .metrics()
            .record_rpc(method, duration, result.is_err());
        result
    }
}

pub(crate) fn rate_to_response(rate: &Rate) -> GetRatesResponse {
    GetRatesResponse {
        ask: to_wire_f64(rate.ask),
        bid: to_wire_f64(rate.bid),
        timestamp: Some(prost_types::Timestamp {
            seconds: rate.timestamp.timestamp(),
            nanos: rate.timestamp.timestamp_subsec_nanos() as i32,
        }),
    }
}

#[tonic::async_trait]
impl RateServiceRpc for RateServiceGrpc {
    async fn get_rates(
        &self,
        _request: Request<GetRatesRequest>,
    ) -> Result<Response<GetRatesResponse>, Status> {
        self.observe(RpcMethod::GetRates, async {
            let rate = self
                .service
                .get_rates()
                .await
                .map_err(|e| Status::internal(e.to_string()))?;
            Ok(Response::new(rate_to_response(&rate)))
        })
        .await
    }

    async fn health_check(
        &self,
        _request: Request<HealthCheckRequest>,
    ) -> Result<Response<HealthCheckResponse>, Status> {
        self.observe(RpcMethod::HealthCheck, async {
            let report = self.service.health_check().await;
            Ok(Response::new(HealthCheckResponse {
                status: report.status.to_string(),
                details: report.details.into_iter().collect(),
            }))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    #[test]
    fn test_rate_to_response() {
        let ts = Utc.timestamp_opt(1_700_000_000, 500_000_000).single().unwrap();
        let rate = Rate::from_best_bid(Decimal::new(10050, 2), ts);

        let response = rate_to_response(&rate);

        assert_eq!(response.ask, 100.5);
        assert_eq!(response.bid, 100.5);
        let timestamp = response.timestamp.unwrap();
        assert_eq!(timestamp.seconds, 1_700_000_000);
        assert_eq!(timestamp.nanos, 500_000_000);
    }
}
