//! Binance spot venue handler
//!
//! Subscribe frames use the `SUBSCRIBE` method with one stream per frame.
//! Binance pings at the protocol level, so there is no application
//! keepalive. Trades and book tickers are decoded by byte scanning.

use crate::core::{clock, symbol, BookTicker, MarketEvent, Side, Trade};
use crate::exchanges::parsing::{BinanceMessageType, BinanceParser};
use crate::exchanges::traits::{Decoded, Outbound, VenueHandler};
use crate::exchanges::Exchange;
use crate::{FeedError, Result};

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// Binance spot WebSocket URL
pub const PUBLIC_WS_URL: &str = "wss://stream.binance.com:9443/ws";

pub const TOPIC_BOOK_TICKER: &str = "bookTicker";
pub const TOPIC_TRADE: &str = "trade";

/// Binance spot handler
pub struct BinanceSpotHandler {
    /// Request id for SUBSCRIBE frames
    next_id: AtomicU64,
    /// Venue symbol (`ETHUSDT`) → internal symbol (`ETH_USDT`)
    symbols: RwLock<HashMap<String, String>>,
}

impl BinanceSpotHandler {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            symbols: RwLock::new(HashMap::new()),
        }
    }

    /// Internal name for a venue symbol; unknown symbols pass through
    fn internal_symbol(&self, venue: &[u8]) -> String {
        let venue = String::from_utf8_lossy(venue);
        match self.symbols.read().get(venue.as_ref()) {
            Some(internal) => internal.clone(),
            None => venue.into_owned(),
        }
    }

    fn decode_trade(&self, frame: &[u8], local_ts: i64) -> Result<Decoded> {
        let raw = BinanceParser::parse_trade(frame)
            .ok_or_else(|| FeedError::Decode("malformed binance trade".to_string()))?;

        // m=true: buyer is maker → the aggressor sold
        let side = if raw.is_buyer_maker { Side::Sell } else { Side::Buy };

        let trade = Trade {
            symbol: self.internal_symbol(raw.symbol),
            trade_id: raw.trade_id.to_string(),
            side,
            price: raw.price,
            size: raw.qty,
            exchange_ts: raw.trade_time,
            local_ts,
            event_ts: clock::now_micros(),
        };
        Ok(Decoded::Event(MarketEvent::Trades(vec![trade])))
    }

    fn decode_ticker(&self, frame: &[u8], local_ts: i64) -> Result<Decoded> {
        let raw = BinanceParser::parse_ticker(frame)
            .ok_or_else(|| FeedError::Decode("malformed binance bookTicker".to_string()))?;

        // The spot bookTicker stream carries no venue timestamp
        let ticker = BookTicker {
            symbol: self.internal_symbol(raw.symbol),
            ask_price: raw.ask_price,
            ask_qty: raw.ask_qty,
            bid_price: raw.bid_price,
            bid_qty: raw.bid_qty,
            exchange_ts: local_ts,
            local_ts,
            event_ts: clock::now_micros(),
        };
        Ok(Decoded::Event(MarketEvent::BookTicker(ticker)))
    }
}

impl Default for BinanceSpotHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl VenueHandler for BinanceSpotHandler {
    fn exchange(&self) -> Exchange {
        Exchange::BinanceSpot
    }

    fn ping(&self) -> Option<Outbound> {
        None
    }

    fn subscribe(&self, symbol: &str, topic: &str) -> Result<Outbound> {
        let venue = symbol::to_binance_symbol(symbol)
            .ok_or_else(|| FeedError::Symbol(symbol.to_string()))?;
        self.symbols
            .write()
            .insert(venue.clone(), symbol.to_string());

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(Outbound::Json(serde_json::json!({
            "method": "SUBSCRIBE",
            "params": [format!("{}@{}", venue.to_lowercase(), topic)],
            "id": id,
        })))
    }

    fn handle(&self, frame: &[u8], local_ts: i64) -> Result<Decoded> {
        match BinanceParser::detect_message_type(frame) {
            BinanceMessageType::Trade => self.decode_trade(frame, local_ts),
            BinanceMessageType::BookTicker => self.decode_ticker(frame, local_ts),
            BinanceMessageType::SubscriptionResponse => Ok(Decoded::Control),
            BinanceMessageType::Error => {
                warn!(frame = %String::from_utf8_lossy(frame), "binance error response");
                Ok(Decoded::Control)
            }
            BinanceMessageType::Unknown => Ok(Decoded::Event(MarketEvent::Unknown {
                channel: "binance".to_string(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_frame() {
        let handler = BinanceSpotHandler::new();
        let frame = handler.subscribe("ETH_USDT", TOPIC_BOOK_TICKER).unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame.into_text().unwrap()).unwrap();

        assert_eq!(value["method"], "SUBSCRIBE");
        assert_eq!(value["params"][0], "ethusdt@bookTicker");
        assert_eq!(value["id"], 1);

        let next = handler.subscribe("BTC_USDT", TOPIC_TRADE).unwrap();
        let value: serde_json::Value = serde_json::from_str(&next.into_text().unwrap()).unwrap();
        assert_eq!(value["id"], 2);
    }

    #[test]
    fn test_subscribe_rejects_swap_symbol() {
        let handler = BinanceSpotHandler::new();
        assert!(matches!(
            handler.subscribe("ETH_USDT_SWAP", TOPIC_TRADE),
            Err(FeedError::Symbol(_))
        ));
    }

    #[test]
    fn test_no_application_ping() {
        assert!(BinanceSpotHandler::new().ping().is_none());
    }

    #[test]
    fn test_decode_trade_maps_symbol() {
        let handler = BinanceSpotHandler::new();
        handler.subscribe("BTC_USDT", TOPIC_TRADE).unwrap();

        let frame = br#"{"e":"trade","E":1672515782136,"s":"BTCUSDT","t":42,"p":"25000.5","q":"0.2","T":1672515782134,"m":false,"M":true}"#;
        let decoded = handler.handle(frame, 1_672_515_782_200_000).unwrap();

        match decoded {
            Decoded::Event(MarketEvent::Trades(trades)) => {
                assert_eq!(trades.len(), 1);
                let t = &trades[0];
                assert_eq!(t.symbol, "BTC_USDT");
                assert_eq!(t.trade_id, "42");
                assert_eq!(t.side, Side::Buy);
                assert_eq!(t.exchange_ts, 1_672_515_782_134_000);
                assert_eq!(t.local_ts, 1_672_515_782_200_000);
                assert!(t.event_ts >= t.local_ts);
            }
            other => panic!("unexpected decode: {:?}", other),
        }
    }

    #[test]
    fn test_decode_book_ticker() {
        let handler = BinanceSpotHandler::new();
        handler.subscribe("ETH_USDT", TOPIC_BOOK_TICKER).unwrap();

        let frame = br#"{"u":1,"s":"ETHUSDT","b":"1800.1","B":"3","a":"1800.2","A":"4"}"#;
        match handler.handle(frame, 100).unwrap() {
            Decoded::Event(MarketEvent::BookTicker(t)) => {
                assert_eq!(t.symbol, "ETH_USDT");
                assert_eq!(t.bid_price, 1800.1);
                assert_eq!(t.ask_qty, 4.0);
                assert_eq!(t.exchange_ts, 100);
                assert_eq!(t.local_ts, 100);
            }
            other => panic!("unexpected decode: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_symbol_passes_through() {
        let handler = BinanceSpotHandler::new();
        let frame = br#"{"u":1,"s":"SOLUSDT","b":"1","B":"1","a":"2","A":"1"}"#;
        match handler.handle(frame, 0).unwrap() {
            Decoded::Event(MarketEvent::BookTicker(t)) => assert_eq!(t.symbol, "SOLUSDT"),
            other => panic!("unexpected decode: {:?}", other),
        }
    }

    #[test]
    fn test_control_and_malformed_frames() {
        let handler = BinanceSpotHandler::new();
        assert_eq!(
            handler.handle(br#"{"result":null,"id":1}"#, 0).unwrap(),
            Decoded::Control
        );
        assert!(matches!(
            handler.handle(br#"{"e":"trade","s":"BTCUSDT"}"#, 0),
            Err(FeedError::Decode(_))
        ));
    }
}
