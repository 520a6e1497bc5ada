//! WebSocket transport
//!
//! A `Connector` opens one session and hands back its two halves:
//! - `sink`: owned by the session's write loop
//! - `stream`: owned by the session's read loop
//!
//! `TungsteniteConnector` is the production connector (tokio-tungstenite
//! with rustls, TCP_NODELAY). The handshake bound belongs to the caller
//! (`Connection::dial`). Tests plug in an in-memory connector through the
//! same trait.

use async_trait::async_trait;
use futures_util::{Sink, Stream, StreamExt};
use std::pin::Pin;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream};

pub use tokio_tungstenite::tungstenite::Error as TransportError;

/// Write half of a session
pub type WsSink = Pin<Box<dyn Sink<Message, Error = TransportError> + Send>>;

/// Read half of a session
pub type WsStream = Pin<Box<dyn Stream<Item = Result<Message, TransportError>> + Send>>;

/// One established WebSocket session
pub struct Transport {
    pub sink: WsSink,
    pub stream: WsStream,
}

/// Errors that can occur while opening a session
#[derive(Debug, thiserror::Error)]
pub enum WebSocketError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Opens WebSocket sessions
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<Transport, WebSocketError>;
}

/// Production connector
#[derive(Debug, Clone, Default)]
pub struct TungsteniteConnector;

impl TungsteniteConnector {
    pub fn new() -> Self {
        Self
    }

    /// Disable Nagle's algorithm - send packets immediately
    fn optimize_tcp_stream(stream: &TcpStream) -> Result<(), WebSocketError> {
        stream
            .set_nodelay(true)
            .map_err(|e| WebSocketError::ConnectionFailed(e.to_string()))
    }
}

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<Transport, WebSocketError> {
        url::Url::parse(url).map_err(|e| WebSocketError::InvalidUrl(format!("{}: {}", url, e)))?;

        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| WebSocketError::ConnectionFailed(e.to_string()))?;

        match ws_stream.get_ref() {
            MaybeTlsStream::Plain(tcp) => Self::optimize_tcp_stream(tcp)?,
            MaybeTlsStream::Rustls(tls) => Self::optimize_tcp_stream(tls.get_ref().0)?,
            _ => {}
        }

        let (sink, stream) = ws_stream.split();
        Ok(Transport {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_websocket_error_display() {
        let err = WebSocketError::InvalidUrl("ws//bad".to_string());
        assert_eq!(err.to_string(), "Invalid URL: ws//bad");

        let err = WebSocketError::ConnectionFailed("refused".to_string());
        assert_eq!(err.to_string(), "Connection failed: refused");
    }

    #[tokio::test]
    async fn test_invalid_url_rejected_before_dial() {
        let connector = TungsteniteConnector::default();
        let result = connector.connect("not a url").await;
        assert!(matches!(result, Err(WebSocketError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_refused_connection() {
        let connector = TungsteniteConnector::new();
        // port 9 on localhost is almost never listening
        let result = connector.connect("ws://127.0.0.1:9/ws").await;
        assert!(result.is_err());
    }
}
