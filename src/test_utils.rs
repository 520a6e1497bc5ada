//! Test utilities: in-memory WebSocket sessions and a scripted venue
//!
//! `MockConnector` hands out `MockSession`s whose inbound side is driven by
//! the test (`push_text`, `fail`) and whose outbound frames are recorded.

use crate::core::MarketEvent;
use crate::exchanges::traits::{Decoded, EventSink, Outbound, VenueHandler};
use crate::exchanges::Exchange;
use crate::ws::connection::{ConnectMode, ConnectionConfig};
use crate::ws::transport::{Connector, Transport, TransportError, WebSocketError};
use crate::{FeedError, Result};

use async_trait::async_trait;
use futures_util::{sink, stream};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio_tungstenite::tungstenite::protocol::Message;

type Inbound = std::result::Result<Message, TransportError>;

/// One in-memory session
pub struct MockSession {
    inbound: mpsc::UnboundedSender<Inbound>,
    sent: Arc<Mutex<Vec<Message>>>,
}

impl MockSession {
    /// Every frame written to this session
    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().clone()
    }

    /// Text frames written to this session
    pub fn sent_texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|m| match m {
                Message::Text(text) => Some(text.as_str().to_string()),
                _ => None,
            })
            .collect()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    /// Deliver a text frame to the reader
    pub fn push_text(&self, text: &str) {
        self.push(Message::text(text));
    }

    pub fn push(&self, message: Message) {
        let _ = self.inbound.send(Ok(message));
    }

    /// Simulate transport loss
    pub fn fail(&self) {
        let _ = self.inbound.send(Err(TransportError::ConnectionClosed));
    }
}

/// Connector producing `MockSession`s
#[derive(Default)]
pub struct MockConnector {
    sessions: Mutex<Vec<Arc<MockSession>>>,
    fail_remaining: AtomicUsize,
    hang_remaining: AtomicUsize,
    attempts: AtomicUsize,
    /// When set, every write waits for one permit
    stall: Option<Arc<Semaphore>>,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Connector whose writes block until permits are added
    pub fn stalled(release: Arc<Semaphore>) -> Arc<Self> {
        Arc::new(Self {
            stall: Some(release),
            ..Self::default()
        })
    }

    /// Fail the next `n` dials
    pub fn fail_next(&self, n: usize) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    /// Never finish the handshake of the next `n` dials
    pub fn hang_next(&self, n: usize) {
        self.hang_remaining.store(n, Ordering::SeqCst);
    }

    /// Session `index` in dial order
    pub fn session(&self, index: usize) -> Arc<MockSession> {
        Arc::clone(&self.sessions.lock()[index])
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn dial_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> std::result::Result<Transport, WebSocketError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let hangs = self
            .hang_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if hangs {
            std::future::pending::<()>().await;
        }
        let refused = self
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(WebSocketError::ConnectionFailed(format!("{} refused", url)));
        }

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<Inbound>();
        let sent = Arc::new(Mutex::new(Vec::new()));

        let stream = stream::unfold(inbound_rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });

        let recorder = (Arc::clone(&sent), self.stall.clone());
        let sink = sink::unfold(recorder, |(sent, stall), msg: Message| async move {
            if let Some(permits) = &stall {
                if let Ok(permit) = permits.acquire().await {
                    permit.forget();
                }
            }
            sent.lock().push(msg);
            Ok::<_, TransportError>((sent, stall))
        });

        self.sessions.lock().push(Arc::new(MockSession {
            inbound: inbound_tx,
            sent,
        }));

        Ok(Transport {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}

/// Scripted venue handler
///
/// Frames: `"pong"` is a keepalive answer, `"boom"` panics, `"bad"` fails to
/// decode, anything else becomes `MarketEvent::Unknown`. Symbols starting
/// with `BAD` are rejected at subscribe time.
#[derive(Debug, Clone)]
pub struct TestHandler {
    app_ping: bool,
    login: bool,
    broken_login: bool,
}

impl Default for TestHandler {
    fn default() -> Self {
        Self {
            app_ping: true,
            login: false,
            broken_login: false,
        }
    }
}

impl TestHandler {
    /// Venue relying on protocol-level pings
    pub fn without_ping() -> Self {
        Self {
            app_ping: false,
            ..Self::default()
        }
    }

    /// Venue that logs in on every dial
    pub fn with_login() -> Self {
        Self {
            login: true,
            ..Self::default()
        }
    }

    /// Venue whose connect hook always fails
    pub fn with_broken_login() -> Self {
        Self {
            broken_login: true,
            ..Self::default()
        }
    }
}

impl VenueHandler for TestHandler {
    fn exchange(&self) -> Exchange {
        Exchange::Okx
    }

    fn on_connected(&self, mode: ConnectMode) -> Result<Vec<Outbound>> {
        if self.broken_login {
            return Err(FeedError::PrivateUnavailable);
        }
        if !self.login {
            return Ok(Vec::new());
        }
        let frame = match mode {
            ConnectMode::Initial => "login:initial",
            ConnectMode::Reconnect => "login:reconnect",
        };
        Ok(vec![Outbound::Text(frame.to_string())])
    }

    fn ping(&self) -> Option<Outbound> {
        self.app_ping.then(|| Outbound::Text("ping".to_string()))
    }

    fn subscribe(&self, symbol: &str, topic: &str) -> Result<Outbound> {
        if symbol.starts_with("BAD") {
            return Err(FeedError::Symbol(symbol.to_string()));
        }
        Ok(Outbound::Text(format!("sub:{}:{}", symbol, topic)))
    }

    fn handle(&self, frame: &[u8], _local_ts: i64) -> Result<Decoded> {
        match frame {
            b"pong" => Ok(Decoded::Pong),
            b"boom" => panic!("handler exploded"),
            b"bad" => Err(FeedError::Decode("unparseable frame".to_string())),
            other => Ok(Decoded::Event(MarketEvent::Unknown {
                channel: String::from_utf8_lossy(other).into_owned(),
            })),
        }
    }
}

/// Sink recording every event it receives
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<MarketEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<MarketEvent> {
        self.events.lock().clone()
    }
}

impl EventSink for RecordingSink {
    fn on_event(&self, event: MarketEvent) {
        self.events.lock().push(event);
    }
}

/// Connection tuning scaled down for tests
pub fn test_config() -> ConnectionConfig {
    ConnectionConfig {
        handshake_timeout: Duration::from_secs(1),
        ping_interval: Duration::from_secs(60),
        pong_timeout: Duration::from_secs(120),
        outbound_queue_capacity: 64,
        reconnect_delay: Duration::from_millis(20),
        resubscribe_delay: Duration::from_millis(5),
        auto_reconnect: true,
        private: false,
    }
}

/// Poll `condition` every 5ms until it holds or `limit` elapses
pub async fn wait_until(mut condition: impl FnMut() -> bool, limit: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
