//! Latency recorder
//!
//! Accumulates per-event timestamp deltas (µs) and, once per flush interval,
//! reduces them to P50/P90/P99/P999 summaries, logs them and starts over.
//! One recorder per event category (book ticker, trades, ...), each with
//! its own `source` label.
//!
//! The three deltas follow the event's timestamps:
//! - feed: exchange generation → frame read locally
//! - parse: frame read → typed event decoded
//! - process: typed event decoded → callback measurement point

use crate::core::Timestamped;
use std::time::{Duration, Instant};
use tracing::Level;

/// Default flush interval
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(60);

/// Percentiles reported per delay kind
pub const PERCENTILES: [f64; 4] = [0.5, 0.9, 0.99, 0.999];

/// One event's three deltas (µs)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatencySample {
    pub parse: i64,
    pub process: i64,
    pub feed: i64,
}

impl LatencySample {
    /// Deltas of `event` as observed at `now` (µs since epoch)
    #[inline]
    pub fn measure<T: Timestamped + ?Sized>(event: &T, now: i64) -> Self {
        Self {
            parse: event.event_ts() - event.local_ts(),
            process: now - event.event_ts(),
            feed: event.local_ts() - event.exchange_ts(),
        }
    }
}

/// Sample count and percentiles of one delay kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PercentileSummary {
    pub count: usize,
    pub p50: i64,
    pub p90: i64,
    pub p99: i64,
    pub p999: i64,
}

impl PercentileSummary {
    /// Summarize unsorted samples (sorts a copy)
    pub fn from_samples(samples: &[i64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let mut sorted = samples.to_vec();
        sorted.sort_unstable();
        let [p50, p90, p99, p999] = PERCENTILES.map(|p| percentile(&sorted, p));
        Self {
            count: sorted.len(),
            p50,
            p90,
            p99,
            p999,
        }
    }
}

/// Result of one flush
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatencyReport {
    pub source: String,
    pub parse: PercentileSummary,
    pub process: PercentileSummary,
    pub feed: PercentileSummary,
}

/// Value at index `floor((n - 1) * p)` of an ascending slice
#[inline]
pub fn percentile(sorted: &[i64], p: f64) -> i64 {
    if sorted.is_empty() {
        return 0;
    }
    let idx = ((sorted.len() - 1) as f64 * p).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Per-category latency accumulator
#[derive(Debug)]
pub struct LatencyRecorder {
    source: String,
    flush_interval: Duration,
    last_flush: Instant,
    parse: Vec<i64>,
    process: Vec<i64>,
    feed: Vec<i64>,
}

impl LatencyRecorder {
    pub fn new(source: impl Into<String>, flush_interval: Duration) -> Self {
        Self::starting_at(source, flush_interval, Instant::now())
    }

    /// Recorder whose first interval starts at `start`
    pub fn starting_at(source: impl Into<String>, flush_interval: Duration, start: Instant) -> Self {
        Self {
            source: source.into(),
            flush_interval,
            last_flush: start,
            parse: Vec::new(),
            process: Vec::new(),
            feed: Vec::new(),
        }
    }

    /// Append one sample to each buffer
    #[inline]
    pub fn add_latency(&mut self, parse: i64, process: i64, feed: i64) {
        self.parse.push(parse);
        self.process.push(process);
        self.feed.push(feed);
    }

    #[inline]
    pub fn add_sample(&mut self, sample: LatencySample) {
        self.add_latency(sample.parse, sample.process, sample.feed);
    }

    /// Summarize, log and reset once the interval has elapsed
    ///
    /// Returns `None` (and changes nothing) before the interval elapses or
    /// when no samples arrived.
    pub fn maybe_flush(&mut self, now: Instant) -> Option<LatencyReport> {
        if now.saturating_duration_since(self.last_flush) < self.flush_interval || self.is_empty() {
            return None;
        }

        let report = LatencyReport {
            source: self.source.clone(),
            parse: PercentileSummary::from_samples(&self.parse),
            process: PercentileSummary::from_samples(&self.process),
            feed: PercentileSummary::from_samples(&self.feed),
        };

        for (kind, s) in [
            ("parse", &report.parse),
            ("process", &report.process),
            ("feed", &report.feed),
        ] {
            crate::log_latency!(
                Level::INFO,
                source = %report.source,
                kind,
                count = s.count,
                p50 = s.p50,
                p90 = s.p90,
                p99 = s.p99,
                p999 = s.p999,
                "latency summary (us)"
            );
        }

        self.parse = Vec::new();
        self.process = Vec::new();
        self.feed = Vec::new();
        self.last_flush = now;

        Some(report)
    }

    pub fn len(&self) -> usize {
        self.parse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parse.is_empty()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn last_flush(&self) -> Instant {
        self.last_flush
    }

    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BookTicker;
    use proptest::prelude::*;

    fn recorder(start: Instant) -> LatencyRecorder {
        LatencyRecorder::starting_at("bookticker", DEFAULT_FLUSH_INTERVAL, start)
    }

    #[test]
    fn test_percentile_index() {
        let sorted: Vec<i64> = (1..=100).map(|i| i * 10).collect();
        assert_eq!(percentile(&sorted, 0.5), sorted[49]);
        assert_eq!(percentile(&sorted, 0.5), 500);
        assert_eq!(percentile(&sorted, 0.9), 900);
        assert_eq!(percentile(&sorted, 0.99), 990);
        assert_eq!(percentile(&sorted, 0.999), 990);
        assert_eq!(percentile(&[], 0.5), 0);
        assert_eq!(percentile(&[7], 0.999), 7);
    }

    #[test]
    fn test_flush_reports_and_resets() {
        let start = Instant::now();
        let mut rec = recorder(start);
        // reversed so the flush has to sort
        for v in (1..=100).rev() {
            rec.add_latency(v * 10, v, 2 * v);
        }

        let now = start + DEFAULT_FLUSH_INTERVAL;
        let report = rec.maybe_flush(now).unwrap();

        assert_eq!(report.source, "bookticker");
        assert_eq!(report.parse.count, 100);
        assert_eq!(report.parse.p50, 500);
        assert_eq!(report.process.p90, 90);
        assert_eq!(report.feed.p99, 198);
        assert!(rec.is_empty());
        assert_eq!(rec.last_flush(), now);

        // immediate second flush is a no-op
        rec.add_latency(1, 1, 1);
        assert!(rec.maybe_flush(now + Duration::from_millis(1)).is_none());
        assert_eq!(rec.len(), 1);
        assert_eq!(rec.last_flush(), now);
    }

    #[test]
    fn test_no_flush_before_interval() {
        let start = Instant::now();
        let mut rec = recorder(start);
        rec.add_latency(1, 2, 3);

        assert!(rec.maybe_flush(start + Duration::from_secs(59)).is_none());
        assert_eq!(rec.len(), 1);
        assert_eq!(rec.last_flush(), start);
    }

    #[test]
    fn test_no_flush_when_empty() {
        let start = Instant::now();
        let mut rec = recorder(start);

        assert!(rec.maybe_flush(start + Duration::from_secs(120)).is_none());
        assert_eq!(rec.last_flush(), start);
    }

    #[test]
    fn test_measure_sample() {
        let ticker = BookTicker {
            symbol: "BTC_USDT_SWAP".to_string(),
            ask_price: 2.0,
            ask_qty: 1.0,
            bid_price: 1.0,
            bid_qty: 1.0,
            exchange_ts: 1_000,
            local_ts: 1_800,
            event_ts: 1_850,
        };
        let sample = LatencySample::measure(&ticker, 1_900);
        assert_eq!(
            sample,
            LatencySample {
                parse: 50,
                process: 50,
                feed: 800,
            }
        );

        let mut rec = recorder(Instant::now());
        rec.add_sample(sample);
        assert_eq!(rec.len(), 1);
    }

    proptest! {
        #[test]
        fn prop_summary_is_ordered_and_from_samples(samples in prop::collection::vec(-1_000_000i64..1_000_000, 1..500)) {
            let s = PercentileSummary::from_samples(&samples);
            prop_assert_eq!(s.count, samples.len());
            prop_assert!(s.p50 <= s.p90 && s.p90 <= s.p99 && s.p99 <= s.p999);
            for v in [s.p50, s.p90, s.p99, s.p999] {
                prop_assert!(samples.contains(&v));
            }
        }

        #[test]
        fn prop_flush_empties_buffers(n in 1usize..200) {
            let start = Instant::now();
            let mut rec = recorder(start);
            for i in 0..n {
                rec.add_latency(i as i64, i as i64, i as i64);
            }
            let report = rec.maybe_flush(start + DEFAULT_FLUSH_INTERVAL);
            prop_assert!(report.is_some());
            prop_assert!(rec.is_empty());
        }
    }
}
