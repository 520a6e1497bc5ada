//! OKX v5 WebSocket wire types

use serde::{Deserialize, Serialize};

/// Channel argument of a push or subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsArg {
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inst_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inst_id: Option<String>,
}

/// `{"op": ..., "args": [...]}` request
#[derive(Debug, Clone, Serialize)]
pub struct WsRequest<A> {
    pub op: &'static str,
    pub args: Vec<A>,
}

/// Login argument
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginArg {
    pub api_key: String,
    pub passphrase: String,
    pub timestamp: String,
    pub sign: String,
}

/// Event frame: subscription ack, login result or error
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsEvent {
    pub event: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub arg: Option<WsArg>,
    #[serde(default)]
    pub conn_id: Option<String>,
}

/// Data push on a channel
#[derive(Debug, Clone, Deserialize)]
pub struct WsPush<T> {
    pub arg: WsArg,
    #[serde(default)]
    pub action: Option<String>,
    pub data: Vec<T>,
}

/// `bbo-tbt` / `books5` entry; levels are `[price, qty, deprecated, orders]`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookData {
    #[serde(default)]
    pub inst_id: Option<String>,
    pub asks: Vec<Vec<String>>,
    pub bids: Vec<Vec<String>>,
    pub ts: String,
    #[serde(default)]
    pub seq_id: Option<i64>,
}

/// `trades` entry
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeData {
    pub inst_id: String,
    pub trade_id: String,
    pub px: String,
    pub sz: String,
    pub side: String,
    pub ts: String,
}

/// `orders` entry (fields this feed maps; the venue sends many more)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderData {
    pub inst_id: String,
    pub ord_id: String,
    pub cl_ord_id: String,
    pub side: String,
    pub ord_type: String,
    pub px: String,
    pub sz: String,
    pub acc_fill_sz: String,
    pub avg_px: String,
    pub fee: String,
    pub state: String,
    pub c_time: String,
    pub u_time: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_request_shape() {
        let req = WsRequest {
            op: "subscribe",
            args: vec![WsArg {
                channel: "trades".to_string(),
                inst_type: None,
                inst_id: Some("BTC-USDT".to_string()),
            }],
        };
        assert_eq!(
            serde_json::to_string(&req).unwrap(),
            r#"{"op":"subscribe","args":[{"channel":"trades","instId":"BTC-USDT"}]}"#
        );
    }

    #[test]
    fn test_event_frame() {
        let ev: WsEvent =
            serde_json::from_str(r#"{"event":"error","code":"60012","msg":"Invalid request"}"#)
                .unwrap();
        assert_eq!(ev.event, "error");
        assert_eq!(ev.code.as_deref(), Some("60012"));
        assert!(ev.arg.is_none());
    }

    #[test]
    fn test_order_data_missing_fields_default() {
        let order: OrderData =
            serde_json::from_str(r#"{"instId":"BTC-USDT-SWAP","ordId":"1","state":"live"}"#).unwrap();
        assert_eq!(order.inst_id, "BTC-USDT-SWAP");
        assert!(order.fee.is_empty());
    }
}
