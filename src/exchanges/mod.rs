//! Exchange-specific implementations

pub mod binance;
pub mod okx;
pub mod parsing;
pub mod traits;

pub use binance::BinanceSpotHandler;
pub use okx::{Credentials, OkxPrivateHandler, OkxPublicHandler};
pub use traits::{Decoded, EventSink, Outbound, VenueHandler};

use crate::ws::subscription::StreamType;
use serde::{Deserialize, Serialize};

/// Exchange identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exchange {
    Okx,
    BinanceSpot,
}

impl Exchange {
    pub fn name(&self) -> &'static str {
        match self {
            Exchange::Okx => "okx",
            Exchange::BinanceSpot => "binance_spot",
        }
    }

    /// Default public WebSocket endpoint
    pub fn public_url(&self) -> &'static str {
        match self {
            Exchange::Okx => okx::PUBLIC_WS_URL,
            Exchange::BinanceSpot => binance::PUBLIC_WS_URL,
        }
    }

    /// Default private WebSocket endpoint, if the venue has one here
    pub fn private_url(&self) -> Option<&'static str> {
        match self {
            Exchange::Okx => Some(okx::PRIVATE_WS_URL),
            Exchange::BinanceSpot => None,
        }
    }

    /// Venue topic name for a stream, `None` if unsupported
    pub fn topic(&self, stream: StreamType) -> Option<&'static str> {
        match (self, stream) {
            (Exchange::Okx, StreamType::BookTicker) => Some(okx::TOPIC_BBO),
            (Exchange::Okx, StreamType::Trade) => Some(okx::TOPIC_TRADES),
            (Exchange::Okx, StreamType::OrderBook) => Some(okx::TOPIC_BOOKS5),
            (Exchange::Okx, StreamType::Order) => Some(okx::TOPIC_ORDERS),
            (Exchange::BinanceSpot, StreamType::BookTicker) => Some(binance::TOPIC_BOOK_TICKER),
            (Exchange::BinanceSpot, StreamType::Trade) => Some(binance::TOPIC_TRADE),
            (Exchange::BinanceSpot, _) => None,
        }
    }
}

impl std::fmt::Display for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
