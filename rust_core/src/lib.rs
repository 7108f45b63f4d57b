//! Garantex Core - rate acquisition and persistence.
//!
//! This crate provides:
//! - The depth API client that derives a rate from the best bid
//! - Rate models shared by the services
//! - The PostgreSQL rate store and its pool plumbing
//! - Decimal price helpers

pub mod clients;
pub mod db;
pub mod models;
pub mod utils;

pub use clients::{ExchangeClient, ExchangeError, RateSource};
pub use db::{RateRepository, RateStore, StoreError};
pub use models::{HealthStatus, Rate, StoredRate};
