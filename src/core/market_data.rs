//! Market data types
//!
//! Typed events produced by venue decoders and handed to strategy callbacks.
//! Every event carries three microsecond timestamps:
//! - `exchange_ts`: generation time reported by the venue
//! - `local_ts`: time the raw frame was read off the socket
//! - `event_ts`: time the typed value was fully decoded

use rust_decimal::Decimal;

/// Trade / order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    Buy = 1,
    Sell = 2,
}

impl Side {
    /// Parse side from string (Buy/Sell) or byte values
    #[inline]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes {
            b"BUY" | b"buy" | b"Buy" => Some(Self::Buy),
            b"SELL" | b"sell" | b"Sell" => Some(Self::Sell),
            _ => None,
        }
    }

    #[inline(always)]
    pub const fn is_buy(&self) -> bool {
        matches!(self, Self::Buy)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderType {
    Limit,
    Market,
    PostOnly,
    Fok,
    Ioc,
    Unknown,
}

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    Open,
    PartialFilled,
    Filled,
    Canceled,
    Failed,
    Closed,
    Rejected,
    Unknown,
}

impl OrderStatus {
    /// Terminal states: no further updates will arrive for the order
    #[inline]
    pub fn is_over(&self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Canceled | Self::Failed | Self::Closed | Self::Rejected
        )
    }
}

/// Access to the three event timestamps (microseconds since epoch)
pub trait Timestamped {
    fn exchange_ts(&self) -> i64;
    fn local_ts(&self) -> i64;
    fn event_ts(&self) -> i64;
}

macro_rules! impl_timestamped {
    ($($ty:ty),+) => {
        $(
            impl Timestamped for $ty {
                #[inline(always)]
                fn exchange_ts(&self) -> i64 {
                    self.exchange_ts
                }
                #[inline(always)]
                fn local_ts(&self) -> i64 {
                    self.local_ts
                }
                #[inline(always)]
                fn event_ts(&self) -> i64 {
                    self.event_ts
                }
            }
        )+
    };
}

/// Best bid/ask quote
#[derive(Debug, Clone, PartialEq)]
pub struct BookTicker {
    /// Internal symbol (e.g. `ETH_USDT_SWAP`)
    pub symbol: String,
    pub ask_price: f64,
    pub ask_qty: f64,
    pub bid_price: f64,
    pub bid_qty: f64,
    pub exchange_ts: i64,
    pub local_ts: i64,
    pub event_ts: i64,
}

impl BookTicker {
    /// Mid price, `None` if either side is empty
    pub fn mid_price(&self) -> Option<f64> {
        if self.ask_price <= 0.0 || self.bid_price <= 0.0 {
            return None;
        }
        Some((self.ask_price + self.bid_price) / 2.0)
    }
}

/// Public trade print
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub symbol: String,
    pub trade_id: String,
    pub side: Side,
    pub price: f64,
    pub size: f64,
    pub exchange_ts: i64,
    pub local_ts: i64,
    pub event_ts: i64,
}

/// Private order update
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub symbol: String,
    pub order_id: String,
    pub client_id: String,
    pub side: Side,
    pub order_type: OrderType,
    pub price: Decimal,
    pub orig_qty: Decimal,
    pub executed_qty: Decimal,
    pub avg_price: Decimal,
    pub fee: Decimal,
    pub status: OrderStatus,
    /// Creation time, milliseconds
    pub create_at: i64,
    /// Last update time, milliseconds
    pub update_at: i64,
    pub exchange_ts: i64,
    pub local_ts: i64,
    pub event_ts: i64,
}

impl Order {
    #[inline]
    pub fn is_over(&self) -> bool {
        self.status.is_over()
    }
}

/// Single price level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceLevel {
    pub price: f64,
    pub qty: f64,
}

/// Shallow order book snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBook {
    pub symbol: String,
    /// Best bid first
    pub bids: Vec<PriceLevel>,
    /// Best ask first
    pub asks: Vec<PriceLevel>,
    pub exchange_ts: i64,
    pub local_ts: i64,
    pub event_ts: i64,
}

impl_timestamped!(BookTicker, Trade, Order, OrderBook);

/// Decoded market event
#[derive(Debug, Clone, PartialEq)]
pub enum MarketEvent {
    BookTicker(BookTicker),
    Trades(Vec<Trade>),
    Orders(Vec<Order>),
    OrderBook(OrderBook),
    /// Data push on a channel the decoder does not model
    Unknown { channel: String },
}

impl MarketEvent {
    /// Category name (for logging)
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BookTicker(_) => "book_ticker",
            Self::Trades(_) => "trades",
            Self::Orders(_) => "orders",
            Self::OrderBook(_) => "order_book",
            Self::Unknown { .. } => "unknown",
        }
    }
}
