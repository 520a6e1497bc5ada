//! Heartbeat bookkeeping for connection keep-alive
//!
//! Tracks when the peer last pinged us and last answered our keepalive.
//! The connection's heartbeat loop reads `pong_elapsed()` every
//! `ping_interval` and fails the session once it exceeds `pong_timeout`.
//! Timestamps are stored as microseconds since a per-heartbeat anchor so
//! updates from the read loop stay lock-free.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Ping/pong timestamps for one connection
#[derive(Debug)]
pub struct Heartbeat {
    /// Ping interval (how often to send keepalives)
    ping_interval: Duration,
    /// Pong timeout (max silence before the session is considered dead)
    pong_timeout: Duration,
    anchor: Instant,
    /// Last protocol ping received from the peer
    last_ping: AtomicU64,
    /// Last pong (protocol or application level) received
    last_pong: AtomicU64,
}

impl Heartbeat {
    /// Default: keepalive every 20s, dead after 60s without a pong
    pub fn new() -> Self {
        Self::with_intervals(Duration::from_secs(20), Duration::from_secs(60))
    }

    pub fn with_intervals(ping_interval: Duration, pong_timeout: Duration) -> Self {
        Self {
            ping_interval,
            pong_timeout,
            anchor: Instant::now(),
            last_ping: AtomicU64::new(0),
            last_pong: AtomicU64::new(0),
        }
    }

    #[inline(always)]
    fn offset(&self) -> u64 {
        self.anchor.elapsed().as_micros() as u64
    }

    /// Stamp both clocks with now (called on every successful dial)
    pub fn reset(&self) {
        let now = self.offset();
        self.last_ping.store(now, Ordering::Relaxed);
        self.last_pong.store(now, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_ping(&self) {
        self.last_ping.store(self.offset(), Ordering::Relaxed);
    }

    #[inline]
    pub fn record_pong(&self) {
        self.last_pong.store(self.offset(), Ordering::Relaxed);
    }

    /// Time since the last pong
    pub fn pong_elapsed(&self) -> Duration {
        let last = self.last_pong.load(Ordering::Relaxed);
        Duration::from_micros(self.offset().saturating_sub(last))
    }

    /// Time since the peer last pinged us
    pub fn ping_elapsed(&self) -> Duration {
        let last = self.last_ping.load(Ordering::Relaxed);
        Duration::from_micros(self.offset().saturating_sub(last))
    }

    /// True once no pong arrived for longer than `pong_timeout`
    #[inline]
    pub fn is_pong_timed_out(&self) -> bool {
        self.pong_elapsed() > self.pong_timeout
    }

    pub fn ping_interval(&self) -> Duration {
        self.ping_interval
    }

    pub fn pong_timeout(&self) -> Duration {
        self.pong_timeout
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new()
    }
}
