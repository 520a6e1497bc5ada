//! Market data latency monitor
//!
//! Subscribes to the configured exchange's book ticker and trade streams
//! (plus order book / private orders when enabled) and logs per-category
//! latency percentiles once per flush interval.
//!
//! # Architecture
//! - **ws**: pooled, self-healing WebSocket connections
//! - **exchanges**: venue decoders and subscribe payloads
//! - **hot_path**: event dispatch to the callbacks below
//! - **infrastructure**: config, logging, metrics, latency recorder

use anyhow::Context;
use hft_feed::core::{clock, Timestamped};
use hft_feed::infrastructure::latency::{LatencyRecorder, LatencySample};
use hft_feed::infrastructure::logging::init_logging;
use hft_feed::ws::TungsteniteConnector;
use hft_feed::{log_main, Config, MarketFeed};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Level;

/// Main application state
pub struct FeedApp {
    config: Config,
}

impl FeedApp {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Recorder shared by one category's callback
    fn recorder(&self, source: &str) -> Arc<Mutex<LatencyRecorder>> {
        Arc::new(Mutex::new(LatencyRecorder::new(
            source,
            self.config.flush_interval(),
        )))
    }

    /// Run until Ctrl-C
    pub async fn run(&self) -> anyhow::Result<()> {
        let feed_config = &self.config.feed;
        tracing::info!(
            exchange = %feed_config.exchange,
            symbols = feed_config.symbols.len(),
            "Starting market feed..."
        );

        let connector = Arc::new(TungsteniteConnector::new());
        let feed = MarketFeed::connect(&self.config, connector)
            .await
            .context("failed to start market feed")?;

        let symbols = feed_config.symbols.as_slice();

        if feed_config.book_ticker {
            let rec = self.recorder("bookticker");
            feed.subscribe_book_ticker(symbols, move |ticker| record(&rec, ticker))
                .await
                .context("book ticker subscription failed")?;
        }

        if feed_config.trades {
            let rec = self.recorder("trades");
            feed.subscribe_trades(symbols, move |trades| {
                for trade in trades {
                    record(&rec, trade);
                }
            })
            .await
            .context("trades subscription failed")?;
        }

        if feed_config.order_book {
            let rec = self.recorder("orderbook");
            feed.subscribe_order_book(symbols, move |book| record(&rec, book))
                .await
                .context("order book subscription failed")?;
        }

        if feed_config.orders {
            let rec = self.recorder("orders");
            if let Err(e) = feed
                .subscribe_orders(symbols, move |orders| {
                    for order in orders {
                        record(&rec, order);
                    }
                })
                .await
            {
                tracing::warn!(error = %e, "order updates disabled");
            }
        }

        tracing::info!(connections = feed.connection_count().await, "Subscriptions issued");

        let mut stats = tokio::time::interval(Duration::from_secs(feed_config.stats_every_secs.max(1)));
        stats.tick().await;
        loop {
            tokio::select! {
                _ = stats.tick() => {
                    let m = feed.metrics().snapshot();
                    let pool = feed.pool_stats().await;
                    log_main!(
                        Level::INFO,
                        frames = m.frames_received,
                        frame_rate = m.frame_rate,
                        dispatched = m.events_dispatched,
                        decode_failures = m.decode_failures,
                        reconnects = m.reconnects,
                        callback_panics = m.callback_panics,
                        connected = pool.connected,
                        reconnecting = pool.reconnecting,
                        "feed stats"
                    );
                }
                res = tokio::signal::ctrl_c() => {
                    res.context("failed to listen for Ctrl-C")?;
                    tracing::info!("Shutdown requested");
                    break;
                }
            }
        }

        feed.close().await;
        Ok(())
    }
}

/// Add one event's deltas and flush if the interval elapsed
fn record<T: Timestamped + ?Sized>(recorder: &Mutex<LatencyRecorder>, event: &T) {
    let sample = LatencySample::measure(event, clock::now_micros());
    let mut rec = recorder.lock();
    rec.add_sample(sample);
    rec.maybe_flush(Instant::now());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load config")?;

    // Guards flush the file appenders on drop
    let _guards = init_logging(&config.logging).context("failed to initialize logging")?;

    FeedApp::new(config).run().await
}
