//! Minimal client: prints the service health, then the current rate.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::Parser;
use rate_service_rust::proto::rate_service_client::RateServiceClient;
use rate_service_rust::proto::{GetRatesRequest, HealthCheckRequest};
use std::time::Duration;
use tonic::Request;

#[derive(Debug, Parser)]
#[command(name = "rate_client", about = "Call the rate service once")]
struct Args {
    /// gRPC endpoint of the rate service
    #[arg(long, default_value = "http://localhost:50051")]
    addr: String,

    /// Per-call deadline in seconds
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,
}

fn with_deadline<T>(message: T, timeout: Duration) -> Request<T> {
    let mut request = Request::new(message);
    request.set_timeout(timeout);
    request
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let timeout = Duration::from_secs(args.timeout_secs);

    let mut client = RateServiceClient::connect(args.addr.clone())
        .await
        .with_context(|| format!("Failed to connect to {}", args.addr))?;

    println!("=== Garantex Rate Service Client ===");

    println!("\n1. Health Check:");
    let health = client
        .health_check(with_deadline(HealthCheckRequest {}, timeout))
        .await
        .context("HealthCheck failed")?
        .into_inner();
    println!("Status: {}", health.status);
    let mut details: Vec<_> = health.details.into_iter().collect();
    details.sort();
    for (key, value) in details {
        println!("  {}: {}", key, value);
    }

    println!("\n2. Get Current Rates:");
    let rates = client
        .get_rates(with_deadline(GetRatesRequest {}, timeout))
        .await
        .context("GetRates failed")?
        .into_inner();
    println!("Ask: ${:.2}", rates.ask);
    println!("Bid: ${:.2}", rates.bid);
    if let Some(ts) = rates.timestamp {
        let when = DateTime::<Utc>::from_timestamp(ts.seconds, ts.nanos.max(0) as u32)
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_else(|| "invalid".to_string());
        println!("Timestamp: {}", when);
    }

    Ok(())
}
