//! Low-latency crypto market-data feed
//!
//! Core library for pooled WebSocket ingestion, typed dispatch and
//! latency measurement.
//!
//! - **core**: market data types, symbol conversion, clock
//! - **ws**: connection lifecycle, heartbeat, subscription ledger, pool
//! - **exchanges**: venue decoders and subscribe payloads (OKX, Binance spot)
//! - **hot_path**: event dispatch to strategy callbacks
//! - **infrastructure**: config, logging, metrics, latency recorder
//! - **engine**: the `MarketFeed` façade tying it together

pub mod core;
pub mod engine;
pub mod exchanges;
pub mod hot_path;
pub mod infrastructure;
pub mod ws;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types
pub use engine::MarketFeed;
pub use infrastructure::config::Config;

use thiserror::Error;

/// Main error type for the feed
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Dial failed: {0}")]
    Dial(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("No connection available for {0}")]
    NoCapacity(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Private channel unavailable")]
    PrivateUnavailable,

    #[error("Bad symbol: {0}")]
    Symbol(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Outbound queue closed")]
    QueueClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, FeedError>;
