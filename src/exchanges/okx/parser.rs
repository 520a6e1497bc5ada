//! OKX v5 frame decoding
//!
//! The channel is located by byte scanning first, then only the matching
//! typed payload is deserialized. Side, order type and order status
//! translation are pure functions.

use super::types::{BookData, OrderData, TradeData, WsEvent, WsPush};
use super::{TOPIC_BBO, TOPIC_BOOKS5, TOPIC_ORDERS, TOPIC_TRADES};
use crate::core::{
    clock, symbol, BookTicker, MarketEvent, Order, OrderBook, OrderStatus, OrderType, PriceLevel,
    Side, Trade,
};
use crate::exchanges::parsing::find_field;
use crate::exchanges::traits::Decoded;
use crate::{FeedError, Result};

use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::{debug, error, info, warn};

/// Decode one OKX frame read at `local_ts` (µs)
pub fn decode_frame(frame: &[u8], local_ts: i64) -> Result<Decoded> {
    if frame == b"pong" {
        return Ok(Decoded::Pong);
    }

    if find_field(frame, b"event").is_some() {
        return decode_event(frame);
    }

    let channel = find_field(frame, b"channel")
        .ok_or_else(|| FeedError::Decode("okx frame without channel".to_string()))?;

    match channel {
        c if c == TOPIC_BBO.as_bytes() => decode_bbo(frame, local_ts),
        c if c == TOPIC_TRADES.as_bytes() => decode_trades(frame, local_ts),
        c if c == TOPIC_BOOKS5.as_bytes() => decode_books(frame, local_ts),
        c if c == TOPIC_ORDERS.as_bytes() => decode_orders(frame, local_ts),
        other => Ok(Decoded::Event(MarketEvent::Unknown {
            channel: String::from_utf8_lossy(other).into_owned(),
        })),
    }
}

fn decode_event(frame: &[u8]) -> Result<Decoded> {
    let ev: WsEvent = serde_json::from_slice(frame)?;
    let channel = ev.arg.as_ref().map(|a| a.channel.as_str()).unwrap_or("");
    match ev.event.as_str() {
        "error" => error!(code = ?ev.code, msg = ?ev.msg, "okx error event"),
        "login" if ev.code.as_deref() == Some("0") => {
            info!(conn_id = ?ev.conn_id, "okx login accepted")
        }
        "login" => error!(code = ?ev.code, msg = ?ev.msg, "okx login rejected"),
        "subscribe" => debug!(channel, "okx subscription acknowledged"),
        other => warn!(event = other, channel, "okx event"),
    }
    Ok(Decoded::Control)
}

fn push<T: serde::de::DeserializeOwned>(frame: &[u8]) -> Result<WsPush<T>> {
    serde_json::from_slice(frame).map_err(|e| FeedError::Decode(format!("okx push: {}", e)))
}

fn internal_symbol(inst_id: &str) -> Result<String> {
    symbol::from_okx_inst_id(inst_id).ok_or_else(|| FeedError::Symbol(inst_id.to_string()))
}

fn inst_id_of<'a>(arg_inst: Option<&'a str>, data_inst: Option<&'a str>) -> Result<&'a str> {
    data_inst
        .or(arg_inst)
        .ok_or_else(|| FeedError::Decode("okx push without instId".to_string()))
}

fn parse_f64(s: &str) -> Result<f64> {
    if s.is_empty() {
        return Ok(0.0);
    }
    s.parse()
        .map_err(|_| FeedError::Decode(format!("bad number {:?}", s)))
}

fn parse_decimal(s: &str) -> Result<Decimal> {
    if s.is_empty() {
        return Ok(Decimal::ZERO);
    }
    Decimal::from_str(s).map_err(|_| FeedError::Decode(format!("bad decimal {:?}", s)))
}

fn parse_millis(s: &str) -> Result<i64> {
    if s.is_empty() {
        return Ok(0);
    }
    s.parse()
        .map_err(|_| FeedError::Decode(format!("bad timestamp {:?}", s)))
}

fn level(raw: &[String]) -> Result<PriceLevel> {
    match raw {
        [price, qty, ..] => Ok(PriceLevel {
            price: parse_f64(price)?,
            qty: parse_f64(qty)?,
        }),
        _ => Err(FeedError::Decode("short okx book level".to_string())),
    }
}

fn levels(raw: &[Vec<String>]) -> Result<Vec<PriceLevel>> {
    raw.iter().map(|l| level(l)).collect()
}

fn decode_bbo(frame: &[u8], local_ts: i64) -> Result<Decoded> {
    let msg: WsPush<BookData> = push(frame)?;
    let data = msg
        .data
        .first()
        .ok_or_else(|| FeedError::Decode("empty bbo-tbt push".to_string()))?;
    let inst_id = inst_id_of(msg.arg.inst_id.as_deref(), data.inst_id.as_deref())?;

    let empty = PriceLevel { price: 0.0, qty: 0.0 };
    let ask = data.asks.first().map(|l| level(l)).transpose()?.unwrap_or(empty);
    let bid = data.bids.first().map(|l| level(l)).transpose()?.unwrap_or(empty);

    let ticker = BookTicker {
        symbol: internal_symbol(inst_id)?,
        ask_price: ask.price,
        ask_qty: ask.qty,
        bid_price: bid.price,
        bid_qty: bid.qty,
        exchange_ts: clock::millis_to_micros(parse_millis(&data.ts)?),
        local_ts,
        event_ts: clock::now_micros(),
    };
    Ok(Decoded::Event(MarketEvent::BookTicker(ticker)))
}

fn decode_books(frame: &[u8], local_ts: i64) -> Result<Decoded> {
    let msg: WsPush<BookData> = push(frame)?;
    let data = msg
        .data
        .first()
        .ok_or_else(|| FeedError::Decode("empty books5 push".to_string()))?;
    let inst_id = inst_id_of(msg.arg.inst_id.as_deref(), data.inst_id.as_deref())?;

    let book = OrderBook {
        symbol: internal_symbol(inst_id)?,
        bids: levels(&data.bids)?,
        asks: levels(&data.asks)?,
        exchange_ts: clock::millis_to_micros(parse_millis(&data.ts)?),
        local_ts,
        event_ts: clock::now_micros(),
    };
    Ok(Decoded::Event(MarketEvent::OrderBook(book)))
}

fn decode_trades(frame: &[u8], local_ts: i64) -> Result<Decoded> {
    let msg: WsPush<TradeData> = push(frame)?;
    let trades = msg
        .data
        .iter()
        .map(|t| {
            Ok(Trade {
                symbol: internal_symbol(&t.inst_id)?,
                trade_id: t.trade_id.clone(),
                side: side_from_okx(&t.side)
                    .ok_or_else(|| FeedError::Decode(format!("bad side {:?}", t.side)))?,
                price: parse_f64(&t.px)?,
                size: parse_f64(&t.sz)?,
                exchange_ts: clock::millis_to_micros(parse_millis(&t.ts)?),
                local_ts,
                event_ts: clock::now_micros(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Decoded::Event(MarketEvent::Trades(trades)))
}

fn decode_orders(frame: &[u8], local_ts: i64) -> Result<Decoded> {
    let msg: WsPush<OrderData> = push(frame)?;
    let orders = msg
        .data
        .iter()
        .map(|o| order_from_okx(o, local_ts))
        .collect::<Result<Vec<_>>>()?;
    Ok(Decoded::Event(MarketEvent::Orders(orders)))
}

fn order_from_okx(o: &OrderData, local_ts: i64) -> Result<Order> {
    let update_at = parse_millis(&o.u_time)?;
    Ok(Order {
        symbol: internal_symbol(&o.inst_id)?,
        order_id: o.ord_id.clone(),
        client_id: o.cl_ord_id.clone(),
        side: side_from_okx(&o.side)
            .ok_or_else(|| FeedError::Decode(format!("bad side {:?}", o.side)))?,
        order_type: order_type_from_okx(&o.ord_type),
        price: parse_decimal(&o.px)?,
        orig_qty: parse_decimal(&o.sz)?,
        executed_qty: parse_decimal(&o.acc_fill_sz)?,
        avg_price: parse_decimal(&o.avg_px)?,
        fee: parse_decimal(&o.fee)?,
        status: status_from_okx(&o.state),
        create_at: parse_millis(&o.c_time)?,
        update_at,
        exchange_ts: clock::millis_to_micros(update_at),
        local_ts,
        event_ts: clock::now_micros(),
    })
}

/// OKX side → `Side`
pub fn side_from_okx(side: &str) -> Option<Side> {
    match side {
        "buy" => Some(Side::Buy),
        "sell" => Some(Side::Sell),
        _ => None,
    }
}

/// `Side` → OKX side
pub fn side_to_okx(side: Side) -> &'static str {
    match side {
        Side::Buy => "buy",
        Side::Sell => "sell",
    }
}

/// OKX `ordType` → `OrderType`
pub fn order_type_from_okx(ord_type: &str) -> OrderType {
    match ord_type {
        "limit" => OrderType::Limit,
        "market" => OrderType::Market,
        "post_only" => OrderType::PostOnly,
        "fok" => OrderType::Fok,
        "ioc" => OrderType::Ioc,
        _ => OrderType::Unknown,
    }
}

/// OKX order `state` → `OrderStatus`
pub fn status_from_okx(state: &str) -> OrderStatus {
    match state {
        "live" => OrderStatus::Open,
        "partially_filled" => OrderStatus::PartialFilled,
        "filled" => OrderStatus::Filled,
        "canceled" | "mmp_canceled" => OrderStatus::Canceled,
        _ => OrderStatus::Unknown,
    }
}
