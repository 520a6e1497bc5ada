//! Metrics collection for feed monitoring
//!
//! Lock-free counters using atomic operations.
//! Updated from connection loops and the dispatcher, snapshotted for
//! periodic logging in the cold path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime};

/// Feed metrics collector
///
/// Shared (`Arc`) by every connection of a feed and its dispatcher.
pub struct FeedMetrics {
    /// Data frames read from any socket
    frames_received: AtomicU64,
    /// Frames written to any socket
    frames_sent: AtomicU64,
    /// Frames the venue decoder rejected or panicked on
    decode_failures: AtomicU64,
    /// Failed dial attempts (initial and reconnect)
    dial_failures: AtomicU64,
    /// Successful reconnects
    reconnects: AtomicU64,
    /// Events delivered to a callback
    events_dispatched: AtomicU64,
    /// Events dropped because no callback was registered
    events_unhandled: AtomicU64,
    /// Callback invocations that panicked
    callback_panics: AtomicU64,
    /// Last frame timestamp (Unix millis)
    last_frame_time: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub frames_received: u64,
    pub frames_sent: u64,
    pub decode_failures: u64,
    pub dial_failures: u64,
    pub reconnects: u64,
    pub events_dispatched: u64,
    pub events_unhandled: u64,
    pub callback_panics: u64,
    pub frame_rate: f64, // frames per second
    pub uptime_seconds: u64,
}

impl FeedMetrics {
    pub fn new() -> Self {
        Self {
            frames_received: AtomicU64::new(0),
            frames_sent: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            dial_failures: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            events_dispatched: AtomicU64::new(0),
            events_unhandled: AtomicU64::new(0),
            callback_panics: AtomicU64::new(0),
            last_frame_time: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    #[inline]
    pub fn record_frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.last_frame_time.store(unix_millis(), Ordering::Relaxed);
    }

    #[inline]
    pub fn record_frame_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dial_failure(&self) {
        self.dial_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dispatched(&self) {
        self.events_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_unhandled(&self) {
        self.events_unhandled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_callback_panic(&self) {
        self.callback_panics.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current snapshot of metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        let received = self.frames_received.load(Ordering::Relaxed);
        let uptime = self.start_time.elapsed().as_secs();
        let rate = if uptime > 0 {
            received as f64 / uptime as f64
        } else {
            0.0
        };

        MetricsSnapshot {
            frames_received: received,
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            dial_failures: self.dial_failures.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            events_dispatched: self.events_dispatched.load(Ordering::Relaxed),
            events_unhandled: self.events_unhandled.load(Ordering::Relaxed),
            callback_panics: self.callback_panics.load(Ordering::Relaxed),
            frame_rate: rate,
            uptime_seconds: uptime,
        }
    }

    /// Time since the last frame in milliseconds, capped at 10000ms
    pub fn silence_ms(&self) -> u64 {
        let last = self.last_frame_time.load(Ordering::Relaxed);
        if last == 0 {
            return 10000; // No frames yet
        }
        unix_millis().saturating_sub(last).min(10000)
    }
}

impl Default for FeedMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
