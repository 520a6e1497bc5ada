//! Resilient WebSocket connection
//!
//! One `Connection` owns a sequence of sessions ("generations"). Every
//! successful dial bumps `epoch`, installs a fresh cancellation gate and
//! starts three tasks bound to that generation:
//! - read loop: decode frames, answer protocol pings, detect transport loss
//! - write loop: drain the control queue, then the outbound queue, in order
//! - heartbeat loop: send keepalives, fail the session on pong timeout
//!
//! A task exits as soon as its gate fires or the live epoch moves on, so a
//! stale generation never touches its replacement's socket.
//!
//! The outbound queue is bounded and lives as long as the connection:
//! producers wait when it is full, and frames queued during a reconnect go
//! out on the next session. Every (symbol, topic) subscribed is recorded in
//! the ledger and replayed in order after a reconnect. The ledger also keeps
//! the session each pair was last written on, so a subscribe frame still
//! queued at the loss and its replay copy go out once per session.

use crate::core::clock;
use crate::exchanges::traits::{Decoded, EventSink, Outbound, VenueHandler};
use crate::hot_path::dispatcher::panic_message;
use crate::infrastructure::metrics::FeedMetrics;
use crate::ws::heartbeat::Heartbeat;
use crate::ws::subscription::{Subscription, SubscriptionLedger};
use crate::ws::transport::{Connector, WsSink, WsStream};
use crate::{FeedError, Result};

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio::time::{interval_at, sleep, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, error, info, warn};

/// Upper bound on the best-effort close handshake when a session ends
const SINK_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never dialed, or last dial failed
    Disconnected,
    /// Dial in progress
    Connecting,
    /// Session live, loops running
    Connected,
    /// Close in progress
    Closing,
    /// Session torn down; terminal until the next dial
    Closed,
}

/// Why a dial happens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectMode {
    Initial,
    Reconnect,
}

/// Connection tuning
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Dial + handshake bound
    pub handshake_timeout: Duration,
    /// Keepalive period
    pub ping_interval: Duration,
    /// Max silence before the session is failed
    pub pong_timeout: Duration,
    /// Outbound queue capacity (frames)
    pub outbound_queue_capacity: usize,
    /// Fixed wait between reconnect attempts
    pub reconnect_delay: Duration,
    /// Spacing between replayed subscribe frames
    pub resubscribe_delay: Duration,
    /// Run the reconnect supervisor after an unintentional disconnect
    pub auto_reconnect: bool,
    /// Authenticated (private) channel
    pub private: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(10),
            ping_interval: Duration::from_secs(20),
            pong_timeout: Duration::from_secs(60),
            outbound_queue_capacity: 1024,
            reconnect_delay: Duration::from_secs(5),
            resubscribe_delay: Duration::from_millis(100),
            auto_reconnect: true,
            private: false,
        }
    }
}

/// Outbound queue entry; subscribe frames carry their pair
struct Queued {
    text: String,
    subscription: Option<Subscription>,
}

impl Queued {
    fn frame(text: String) -> Self {
        Self {
            text,
            subscription: None,
        }
    }

    fn subscribe(text: String, subscription: Subscription) -> Self {
        Self {
            text,
            subscription: Some(subscription),
        }
    }
}

struct Lifecycle {
    state: ConnectionState,
    /// Cancellation gate of the live generation
    gate: Option<watch::Sender<bool>>,
    /// Set by `close()`, cleared by the next explicit dial
    closed_by_caller: bool,
}

/// Resilient WebSocket connection
pub struct Connection {
    label: String,
    url: String,
    config: ConnectionConfig,
    handler: Arc<dyn VenueHandler>,
    sink: Arc<dyn EventSink>,
    connector: Arc<dyn Connector>,
    metrics: Arc<FeedMetrics>,
    epoch: AtomicU64,
    lifecycle: Mutex<Lifecycle>,
    ledger: Mutex<SubscriptionLedger>,
    heartbeat: Heartbeat,
    outbound_tx: mpsc::Sender<Queued>,
    /// Held by the live write loop for its whole lifetime
    outbound_rx: AsyncMutex<mpsc::Receiver<Queued>>,
    reconnecting: AtomicBool,
}

impl Connection {
    /// Create a disconnected connection. Call `dial` to open it.
    pub fn new(
        label: impl Into<String>,
        url: impl Into<String>,
        handler: Arc<dyn VenueHandler>,
        sink: Arc<dyn EventSink>,
        connector: Arc<dyn Connector>,
        config: ConnectionConfig,
        metrics: Arc<FeedMetrics>,
    ) -> Arc<Self> {
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_queue_capacity.max(1));
        let heartbeat = Heartbeat::with_intervals(config.ping_interval, config.pong_timeout);

        Arc::new(Self {
            label: label.into(),
            url: url.into(),
            config,
            handler,
            sink,
            connector,
            metrics,
            epoch: AtomicU64::new(0),
            lifecycle: Mutex::new(Lifecycle {
                state: ConnectionState::Disconnected,
                gate: None,
                closed_by_caller: false,
            }),
            ledger: Mutex::new(SubscriptionLedger::new()),
            heartbeat,
            outbound_tx,
            outbound_rx: AsyncMutex::new(outbound_rx),
            reconnecting: AtomicBool::new(false),
        })
    }

    /// Open a new session and start its loops
    ///
    /// On failure nothing is started and the state returns to `Disconnected`.
    /// A reconnect dial after `close()` fails without dialing and leaves the
    /// state `Closed`. The handshake is bounded by `handshake_timeout`.
    pub async fn dial(self: &Arc<Self>, mode: ConnectMode) -> Result<()> {
        {
            let mut lc = self.lifecycle.lock();
            if mode == ConnectMode::Reconnect && lc.closed_by_caller {
                lc.state = ConnectionState::Closed;
                return Err(FeedError::Dial("connection closed during reconnect".to_string()));
            }
            lc.state = ConnectionState::Connecting;
        }

        let transport = match timeout(
            self.config.handshake_timeout,
            self.connector.connect(&self.url),
        )
        .await
        {
            Ok(Ok(transport)) => transport,
            Ok(Err(e)) => return Err(self.dial_failed(e.to_string())),
            Err(_) => {
                return Err(self.dial_failed(format!(
                    "handshake timed out after {:?}",
                    self.config.handshake_timeout
                )))
            }
        };

        let (gate_tx, gate_rx) = watch::channel(false);
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        let epoch = {
            let mut lc = self.lifecycle.lock();
            if mode == ConnectMode::Reconnect && lc.closed_by_caller {
                lc.state = ConnectionState::Closed;
                return Err(FeedError::Dial("connection closed during reconnect".to_string()));
            }
            if let Some(previous) = lc.gate.replace(gate_tx) {
                let _ = previous.send(true);
            }
            lc.state = ConnectionState::Connected;
            lc.closed_by_caller = false;
            self.heartbeat.reset();
            self.epoch.fetch_add(1, Ordering::SeqCst) + 1
        };

        tokio::spawn(Arc::clone(self).read_loop(
            epoch,
            transport.stream,
            gate_rx.clone(),
            control_tx.clone(),
        ));
        tokio::spawn(Arc::clone(self).write_loop(epoch, transport.sink, gate_rx.clone(), control_rx));
        tokio::spawn(Arc::clone(self).heartbeat_loop(epoch, gate_rx, control_tx.clone()));

        info!(connection = %self.label, url = %self.url, epoch, ?mode, "connected");

        // Connect-time frames (login) jump ahead of anything already queued
        match self.handler.on_connected(mode) {
            Ok(frames) => {
                for frame in frames {
                    match frame.into_text() {
                        Ok(text) => {
                            let _ = control_tx.send(Message::text(text));
                        }
                        Err(e) => {
                            warn!(connection = %self.label, error = %e, "connect frame skipped")
                        }
                    }
                }
            }
            Err(e) => warn!(connection = %self.label, error = %e, "on_connected hook failed"),
        }

        Ok(())
    }

    fn dial_failed(&self, reason: String) -> FeedError {
        self.metrics.record_dial_failure();
        let mut lc = self.lifecycle.lock();
        if lc.state == ConnectionState::Connecting {
            lc.state = ConnectionState::Disconnected;
        }
        FeedError::Dial(format!("{}: {}", self.url, reason))
    }

    /// Close the live session
    ///
    /// Idempotent: returns false (and logs) when already closed. Also stops a
    /// running reconnect supervisor.
    pub fn close(&self) -> bool {
        let mut lc = self.lifecycle.lock();
        lc.closed_by_caller = true;
        if matches!(lc.state, ConnectionState::Closing | ConnectionState::Closed) {
            drop(lc);
            warn!(connection = %self.label, "already closed");
            return false;
        }
        lc.state = ConnectionState::Closing;
        if let Some(gate) = lc.gate.take() {
            let _ = gate.send(true);
        }
        lc.state = ConnectionState::Closed;
        drop(lc);

        info!(connection = %self.label, epoch = self.epoch(), "closed");
        true
    }

    /// Record a subscription and enqueue its frame
    ///
    /// No-op if the pair is already in the ledger. Does not wait for the
    /// venue's acknowledgement.
    pub async fn subscribe(&self, symbol: &str, topic: &str) -> Result<()> {
        if self.ledger.lock().contains(symbol, topic) {
            debug!(connection = %self.label, symbol, topic, "already subscribed");
            return Ok(());
        }

        let text = self.subscribe_frame(symbol, topic)?;
        if !self.ledger.lock().insert(symbol, topic) {
            return Ok(());
        }
        self.enqueue(Queued::subscribe(text, Subscription::new(symbol, topic)))
            .await
    }

    /// Build the subscribe frame for a pair without recording or sending it
    ///
    /// Fails when the venue rejects the symbol or topic.
    pub fn subscribe_frame(&self, symbol: &str, topic: &str) -> Result<String> {
        self.handler.subscribe(symbol, topic)?.into_text()
    }

    /// Serialize and enqueue a payload (waits while the queue is full)
    pub async fn write<T: Serialize + ?Sized>(&self, payload: &T) -> Result<()> {
        let text = serde_json::to_string(payload)?;
        self.enqueue(Queued::frame(text)).await
    }

    /// Enqueue a pre-serialized text frame
    pub async fn write_text(&self, text: impl Into<String>) -> Result<()> {
        self.enqueue(Queued::frame(text.into())).await
    }

    /// Enqueue a handler-produced payload
    pub async fn write_outbound(&self, payload: Outbound) -> Result<()> {
        self.enqueue(Queued::frame(payload.into_text()?)).await
    }

    #[inline]
    async fn enqueue(&self, entry: Queued) -> Result<()> {
        self.outbound_tx
            .send(entry)
            .await
            .map_err(|_| FeedError::QueueClosed)
    }

    #[inline(always)]
    fn is_stale(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) != epoch
    }

    /// Tear down generation `epoch` after a transport failure
    ///
    /// Only the first report for the live generation wins, so the supervisor
    /// starts at most once per loss.
    fn fail(self: &Arc<Self>, epoch: u64, reason: &str) {
        {
            let mut lc = self.lifecycle.lock();
            if self.is_stale(epoch) || lc.state != ConnectionState::Connected {
                return;
            }
            lc.state = ConnectionState::Closing;
            if let Some(gate) = lc.gate.take() {
                let _ = gate.send(true);
            }
            lc.state = ConnectionState::Closed;
        }

        warn!(connection = %self.label, epoch, reason, "connection lost");

        if self.config.auto_reconnect {
            self.spawn_reconnect();
        }
    }

    fn spawn_reconnect(self: &Arc<Self>) {
        if self.reconnecting.swap(true, Ordering::SeqCst) {
            return;
        }
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.reconnect().await;
        });
    }

    /// Retry dial with a fixed delay until it succeeds or the caller closes,
    /// then replay the ledger
    async fn reconnect(self: &Arc<Self>) {
        let mut attempt: u32 = 0;
        loop {
            if self.lifecycle.lock().closed_by_caller {
                info!(connection = %self.label, "reconnect abandoned, connection closed");
                self.reconnecting.store(false, Ordering::SeqCst);
                return;
            }
            attempt += 1;
            match self.dial(ConnectMode::Reconnect).await {
                Ok(()) => break,
                Err(e) => {
                    error!(
                        connection = %self.label,
                        attempt,
                        error = %e,
                        retry_in = ?self.config.reconnect_delay,
                        "reconnect failed"
                    );
                    sleep(self.config.reconnect_delay).await;
                }
            }
        }

        // A loss during replay must be able to start a fresh supervisor
        self.reconnecting.store(false, Ordering::SeqCst);
        self.metrics.record_reconnect();
        let epoch = self.epoch();
        info!(connection = %self.label, attempt, epoch, "reconnected");

        self.replay_subscriptions(epoch).await;
    }

    async fn replay_subscriptions(&self, epoch: u64) {
        let entries = self.ledger.lock().entries().to_vec();
        let total = entries.len();

        for (i, sub) in entries.into_iter().enumerate() {
            if self.is_stale(epoch) {
                debug!(connection = %self.label, "replay superseded by newer session");
                return;
            }
            // Already written on this session by a frame queued before the loss
            if self.ledger.lock().sent_in(&sub, epoch) {
                continue;
            }
            match self.subscribe_frame(&sub.symbol, &sub.topic) {
                Ok(text) => {
                    if let Err(e) = self.enqueue(Queued::subscribe(text, sub)).await {
                        error!(connection = %self.label, error = %e, "replay aborted");
                        return;
                    }
                }
                Err(e) => {
                    warn!(connection = %self.label, symbol = %sub.symbol, topic = %sub.topic, error = %e, "replay frame skipped");
                }
            }
            if i + 1 < total {
                sleep(self.config.resubscribe_delay).await;
            }
        }

        if total > 0 {
            info!(connection = %self.label, subscriptions = total, "subscriptions replayed");
        }
    }

    async fn read_loop(
        self: Arc<Self>,
        epoch: u64,
        mut stream: WsStream,
        mut gate: watch::Receiver<bool>,
        control: mpsc::UnboundedSender<Message>,
    ) {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancelled(&mut gate) => break,
                next = stream.next() => next,
            };
            if self.is_stale(epoch) {
                break;
            }

            match next {
                Some(Ok(Message::Text(text))) => self.on_frame(text.as_bytes()),
                Some(Ok(Message::Binary(data))) => self.on_frame(&data),
                Some(Ok(Message::Ping(payload))) => {
                    self.heartbeat.record_ping();
                    let _ = control.send(Message::Pong(payload));
                }
                Some(Ok(Message::Pong(_))) => self.heartbeat.record_pong(),
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| format!("closed by peer: {} {}", f.code, f.reason))
                        .unwrap_or_else(|| "closed by peer".to_string());
                    self.fail(epoch, &reason);
                    break;
                }
                Some(Ok(Message::Frame(_))) => {}
                Some(Err(e)) => {
                    self.fail(epoch, &format!("read error: {}", e));
                    break;
                }
                None => {
                    self.fail(epoch, "stream ended");
                    break;
                }
            }
        }
        debug!(connection = %self.label, epoch, "read loop exited");
    }

    /// Decode one data frame; decode errors and handler panics stay here
    fn on_frame(&self, frame: &[u8]) {
        let local_ts = clock::now_micros();
        self.metrics.record_frame_received();

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.handler.handle(frame, local_ts).map(|decoded| match decoded {
                Decoded::Event(event) => self.sink.on_event(event),
                Decoded::Pong => self.heartbeat.record_pong(),
                Decoded::Control => {}
            })
        }));

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.metrics.record_decode_failure();
                warn!(connection = %self.label, error = %e, "decode failed");
            }
            Err(panic) => {
                self.metrics.record_decode_failure();
                error!(
                    connection = %self.label,
                    panic = %panic_message(panic.as_ref()),
                    "handler panicked, frame dropped"
                );
            }
        }
    }

    async fn write_loop(
        self: Arc<Self>,
        epoch: u64,
        mut sink: WsSink,
        mut gate: watch::Receiver<bool>,
        mut control: mpsc::UnboundedReceiver<Message>,
    ) {
        let mut outbound = tokio::select! {
            biased;
            _ = cancelled(&mut gate) => {
                let _ = timeout(SINK_CLOSE_TIMEOUT, sink.close()).await;
                return;
            }
            guard = self.outbound_rx.lock() => guard,
        };

        loop {
            let (msg, subscription) = tokio::select! {
                biased;
                _ = cancelled(&mut gate) => break,
                Some(msg) = control.recv() => (msg, None),
                entry = outbound.recv() => match entry {
                    Some(entry) => (Message::text(entry.text), entry.subscription),
                    None => break,
                },
            };
            if self.is_stale(epoch) {
                break;
            }
            if let Some(sub) = &subscription {
                if self.ledger.lock().sent_in(sub, epoch) {
                    debug!(connection = %self.label, epoch, symbol = %sub.symbol, topic = %sub.topic, "duplicate subscribe dropped");
                    continue;
                }
            }

            let sent = tokio::select! {
                biased;
                _ = cancelled(&mut gate) => break,
                sent = sink.send(msg) => sent,
            };
            if let Err(e) = sent {
                self.fail(epoch, &format!("write error: {}", e));
                break;
            }
            if let Some(sub) = &subscription {
                self.ledger.lock().mark_sent(sub, epoch);
            }
            self.metrics.record_frame_sent();
        }

        drop(outbound);
        let _ = timeout(SINK_CLOSE_TIMEOUT, sink.close()).await;
        debug!(connection = %self.label, epoch, "write loop exited");
    }

    async fn heartbeat_loop(
        self: Arc<Self>,
        epoch: u64,
        mut gate: watch::Receiver<bool>,
        control: mpsc::UnboundedSender<Message>,
    ) {
        let period = self.config.ping_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancelled(&mut gate) => break,
                _ = ticker.tick() => {}
            }
            if self.is_stale(epoch) {
                break;
            }

            if self.heartbeat.is_pong_timed_out() {
                let silence = self.heartbeat.pong_elapsed();
                self.fail(epoch, &format!("pong timeout after {:?}", silence));
                break;
            }

            let keepalive = match self.handler.ping() {
                Some(payload) => match payload.into_text() {
                    Ok(text) => Message::text(text),
                    Err(e) => {
                        warn!(connection = %self.label, error = %e, "keepalive encode failed");
                        continue;
                    }
                },
                None => Message::Ping(Bytes::new()),
            };
            if control.send(keepalive).is_err() {
                break;
            }
        }
        debug!(connection = %self.label, epoch, "heartbeat loop exited");
    }

    /// Live generation number (0 before the first dial)
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> ConnectionState {
        self.lifecycle.lock().state
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// True while the reconnect supervisor is retrying
    pub fn is_reconnecting(&self) -> bool {
        self.reconnecting.load(Ordering::SeqCst)
    }

    /// Snapshot of the ledger, in replay order
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.ledger.lock().entries().to_vec()
    }

    pub fn subscription_count(&self) -> usize {
        self.ledger.lock().len()
    }

    pub fn is_subscribed(&self, symbol: &str, topic: &str) -> bool {
        self.ledger.lock().contains(symbol, topic)
    }

    pub fn heartbeat(&self) -> &Heartbeat {
        &self.heartbeat
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_private(&self) -> bool {
        self.config.private
    }
}

/// Resolves once the generation's gate fires (or its sender is gone)
async fn cancelled(gate: &mut watch::Receiver<bool>) {
    let _ = gate.wait_for(|closed| *closed).await;
}
