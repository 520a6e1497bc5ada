//! Venue collaborator contract
//!
//! A `Connection` knows nothing about any exchange's wire format. It asks
//! its `VenueHandler` for:
//! - frames to send right after a dial (`on_connected`, e.g. login)
//! - the periodic application keepalive (`ping`)
//! - the subscribe frame for a (symbol, topic) pair (`subscribe`)
//! - the decode of every inbound data frame (`handle`)
//!
//! Decoded events go to an `EventSink` (the dispatcher).
//!
//! Handlers are shared trait objects across all connections of a venue, so
//! every method takes `&self` and must be cheap and non-blocking.

use crate::core::MarketEvent;
use crate::exchanges::Exchange;
use crate::ws::ConnectMode;
use crate::Result;

/// Outbound payload produced by a handler
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Sent verbatim as a text frame
    Text(String),
    /// Serialized to JSON text before sending
    Json(serde_json::Value),
}

impl Outbound {
    /// Wire text of the frame
    pub fn into_text(self) -> Result<String> {
        match self {
            Outbound::Text(text) => Ok(text),
            Outbound::Json(value) => Ok(serde_json::to_string(&value)?),
        }
    }
}

/// Outcome of decoding one inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Typed market event
    Event(MarketEvent),
    /// Application-level pong (refreshes the heartbeat)
    Pong,
    /// Acks, login results, errors and other non-data frames
    Control,
}

/// Per-venue frame codec
pub trait VenueHandler: Send + Sync + 'static {
    /// Exchange identifier
    fn exchange(&self) -> Exchange;

    /// Frames to send after every successful dial
    fn on_connected(&self, _mode: ConnectMode) -> Result<Vec<Outbound>> {
        Ok(Vec::new())
    }

    /// Application keepalive; `None` means use protocol-level pings
    fn ping(&self) -> Option<Outbound>;

    /// Subscribe frame for one (symbol, topic) pair
    fn subscribe(&self, symbol: &str, topic: &str) -> Result<Outbound>;

    /// Decode one inbound text/binary frame read at `local_ts` (µs)
    fn handle(&self, frame: &[u8], local_ts: i64) -> Result<Decoded>;
}

/// Receiver of decoded events
pub trait EventSink: Send + Sync + 'static {
    fn on_event(&self, event: MarketEvent);
}
