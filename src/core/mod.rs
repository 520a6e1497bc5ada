//! Core types shared across the feed
//!
//! - market_data: typed events (BookTicker, Trade, Order, OrderBook)
//! - symbol: internal ↔ venue symbol conversion
//! - clock: microsecond wall-clock timestamps

pub mod clock;
pub mod market_data;
pub mod symbol;

pub use market_data::{
    BookTicker, MarketEvent, Order, OrderBook, OrderStatus, OrderType, PriceLevel, Side,
    Timestamped, Trade,
};
