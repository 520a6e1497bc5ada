//! Binance spot message parser
//!
//! Parses raw `trade` and `bookTicker` stream payloads by byte scanning.
//! Symbols stay borrowed from the frame; the handler maps them to internal
//! names.

use super::{find_field, parse_bool, parse_f64, parse_timestamp_ms, parse_u64};

/// Raw trade fields
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinanceTrade<'a> {
    pub symbol: &'a [u8],
    pub trade_id: u64,
    pub price: f64,
    pub qty: f64,
    /// Trade time, microseconds
    pub trade_time: i64,
    pub is_buyer_maker: bool,
}

/// Raw best bid/ask fields
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinanceTicker<'a> {
    pub symbol: &'a [u8],
    pub update_id: u64,
    pub bid_price: f64,
    pub bid_qty: f64,
    pub ask_price: f64,
    pub ask_qty: f64,
}

/// Binance message parser
pub struct BinanceParser;

impl BinanceParser {
    /// Parse a trade message
    ///
    /// Binance trade format:
    /// {
    ///   "e": "trade",
    ///   "E": 1672515782136,
    ///   "s": "BNBBTC",
    ///   "t": 12345,
    ///   "p": "0.001",
    ///   "q": "100",
    ///   "T": 1672515782136,
    ///   "m": true,
    ///   "M": true
    /// }
    #[inline]
    pub fn parse_trade(data: &[u8]) -> Option<BinanceTrade<'_>> {
        if find_field(data, b"e")? != b"trade" {
            return None;
        }

        Some(BinanceTrade {
            symbol: find_field(data, b"s")?,
            trade_id: parse_u64(find_field(data, b"t")?)?,
            price: parse_f64(find_field(data, b"p")?)?,
            qty: parse_f64(find_field(data, b"q")?)?,
            trade_time: parse_timestamp_ms(find_field(data, b"T")?)?,
            is_buyer_maker: find_field(data, b"m").and_then(parse_bool).unwrap_or(false),
        })
    }

    /// Parse a bookTicker message
    ///
    /// Binance spot bookTicker format (no event type, no timestamp):
    /// {
    ///   "u": 400900217,
    ///   "s": "BNBUSDT",
    ///   "b": "25.35190000",
    ///   "B": "31.21000000",
    ///   "a": "25.36520000",
    ///   "A": "40.66000000"
    /// }
    #[inline]
    pub fn parse_ticker(data: &[u8]) -> Option<BinanceTicker<'_>> {
        Some(BinanceTicker {
            update_id: parse_u64(find_field(data, b"u")?)?,
            symbol: find_field(data, b"s")?,
            bid_price: parse_f64(find_field(data, b"b")?)?,
            bid_qty: parse_f64(find_field(data, b"B")?)?,
            ask_price: parse_f64(find_field(data, b"a")?)?,
            ask_qty: parse_f64(find_field(data, b"A")?)?,
        })
    }

    /// Detect message type without full parsing
    #[inline]
    pub fn detect_message_type(data: &[u8]) -> BinanceMessageType {
        match find_field(data, b"e") {
            Some(b"trade") => return BinanceMessageType::Trade,
            Some(_) => return BinanceMessageType::Unknown,
            None => {}
        }
        if find_field(data, b"u").is_some() && find_field(data, b"b").is_some() {
            BinanceMessageType::BookTicker
        } else if find_field(data, b"result").is_some() {
            BinanceMessageType::SubscriptionResponse
        } else if find_field(data, b"error").is_some() {
            BinanceMessageType::Error
        } else {
            BinanceMessageType::Unknown
        }
    }
}

/// Binance message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinanceMessageType {
    Trade,
    BookTicker,
    SubscriptionResponse,
    Error,
    Unknown,
}


// Hot Path Checklist verified:
// ✓ No heap allocations (symbols borrowed from the frame)
// ✓ No panics (all operations return Option)
// ✓ Byte-scanning type detection
