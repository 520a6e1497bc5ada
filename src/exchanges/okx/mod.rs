//! OKX v5 venue handlers
//!
//! - `OkxPublicHandler`: book ticker, trades and order book channels
//! - `OkxPrivateHandler`: logs in on every dial, then order updates
//!
//! Both use the application keepalive (`"ping"` → `"pong"`) and share the
//! frame decoder in `parser`.

pub mod parser;
pub mod types;

use crate::core::{clock, symbol};
use crate::exchanges::traits::{Decoded, Outbound, VenueHandler};
use crate::exchanges::Exchange;
use crate::ws::ConnectMode;
use crate::{FeedError, Result};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::info;
use types::{LoginArg, WsArg, WsRequest};

pub const PUBLIC_WS_URL: &str = "wss://ws.okx.com:8443/ws/v5/public";
pub const PRIVATE_WS_URL: &str = "wss://ws.okx.com:8443/ws/v5/private";

pub const TOPIC_BBO: &str = "bbo-tbt";
pub const TOPIC_TRADES: &str = "trades";
pub const TOPIC_BOOKS5: &str = "books5";
pub const TOPIC_ORDERS: &str = "orders";

/// Instrument type for the private orders channel
const ORDERS_INST_TYPE: &str = "ANY";

/// Path signed by the WebSocket login
const LOGIN_VERIFY_PATH: &str = "/users/self/verify";

/// API credentials for the private channel
#[derive(Clone, Default)]
pub struct Credentials {
    pub api_key: String,
    pub secret_key: String,
    pub passphrase: String,
}

impl Credentials {
    pub fn new(
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
        passphrase: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: secret_key.into(),
            passphrase: passphrase.into(),
        }
    }

    /// True when every field is set
    pub fn is_complete(&self) -> bool {
        !self.api_key.is_empty() && !self.secret_key.is_empty() && !self.passphrase.is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("secret_key", &"<redacted>")
            .field("passphrase", &"<redacted>")
            .finish()
    }
}

/// `base64(HMAC-SHA256(secret, timestamp + "GET" + "/users/self/verify"))`
pub fn sign(secret: &str, timestamp: &str) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| FeedError::Config(format!("invalid secret key: {}", e)))?;
    mac.update(timestamp.as_bytes());
    mac.update(b"GET");
    mac.update(LOGIN_VERIFY_PATH.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Login request signed at `timestamp` (UTC seconds)
pub fn login_request(credentials: &Credentials, timestamp: &str) -> Result<Outbound> {
    let req = WsRequest {
        op: "login",
        args: vec![LoginArg {
            api_key: credentials.api_key.clone(),
            passphrase: credentials.passphrase.clone(),
            timestamp: timestamp.to_string(),
            sign: sign(&credentials.secret_key, timestamp)?,
        }],
    };
    Ok(Outbound::Text(serde_json::to_string(&req)?))
}

fn subscribe_request(arg: WsArg) -> Result<Outbound> {
    let req = WsRequest {
        op: "subscribe",
        args: vec![arg],
    };
    Ok(Outbound::Text(serde_json::to_string(&req)?))
}

fn inst_id(symbol: &str) -> Result<String> {
    symbol::to_okx_inst_id(symbol).ok_or_else(|| FeedError::Symbol(symbol.to_string()))
}

fn keepalive() -> Option<Outbound> {
    Some(Outbound::Text("ping".to_string()))
}

/// Public market data handler
#[derive(Debug, Default)]
pub struct OkxPublicHandler;

impl OkxPublicHandler {
    pub fn new() -> Self {
        Self
    }
}

impl VenueHandler for OkxPublicHandler {
    fn exchange(&self) -> Exchange {
        Exchange::Okx
    }

    fn ping(&self) -> Option<Outbound> {
        keepalive()
    }

    fn subscribe(&self, symbol: &str, topic: &str) -> Result<Outbound> {
        subscribe_request(WsArg {
            channel: topic.to_string(),
            inst_type: None,
            inst_id: Some(inst_id(symbol)?),
        })
    }

    #[inline]
    fn handle(&self, frame: &[u8], local_ts: i64) -> Result<Decoded> {
        parser::decode_frame(frame, local_ts)
    }
}

/// Private (authenticated) handler
#[derive(Debug)]
pub struct OkxPrivateHandler {
    credentials: Credentials,
}

impl OkxPrivateHandler {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

impl VenueHandler for OkxPrivateHandler {
    fn exchange(&self) -> Exchange {
        Exchange::Okx
    }

    fn on_connected(&self, mode: ConnectMode) -> Result<Vec<Outbound>> {
        let timestamp = clock::now_secs().to_string();
        info!(?mode, "okx private login");
        Ok(vec![login_request(&self.credentials, &timestamp)?])
    }

    fn ping(&self) -> Option<Outbound> {
        keepalive()
    }

    fn subscribe(&self, symbol: &str, topic: &str) -> Result<Outbound> {
        let inst_type = (topic == TOPIC_ORDERS).then(|| ORDERS_INST_TYPE.to_string());
        subscribe_request(WsArg {
            channel: topic.to_string(),
            inst_type,
            inst_id: Some(inst_id(symbol)?),
        })
    }

    #[inline]
    fn handle(&self, frame: &[u8], local_ts: i64) -> Result<Decoded> {
        parser::decode_frame(frame, local_ts)
    }
}
