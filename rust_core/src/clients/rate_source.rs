//! Rate Source Trait
//!
//! Defines the interface the rate service uses to acquire a fresh rate.
//! The production implementation is [`super::ExchangeClient`]; tests plug in
//! stubs.

use super::exchange::ExchangeError;
use crate::models::Rate;
use async_trait::async_trait;

/// Something that can produce one fresh [`Rate`] per call.
///
/// Implementations must be Send + Sync for use behind an `Arc` shared across
/// request tasks. Each call performs its own acquisition; nothing is cached.
/// Dropping the returned future abandons the acquisition.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Display name used in logs (e.g. "Grinex")
    fn source_name(&self) -> &str;

    /// Acquire the current rate
    async fn fetch_rate(&self) -> Result<Rate, ExchangeError>;
}
