pub mod exchange;
pub mod rate_source;

// Re-export commonly used types
pub use exchange::{DepthResponse, ExchangeClient, ExchangeError, OrderBookEntry};
pub use rate_source::RateSource;
