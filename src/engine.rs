//! Core Application Engine
//!
//! `MarketFeed` ties the pieces together for one exchange:
//! - a `ConnectionPool` of public connections (grown lazily on subscribe)
//! - an optional authenticated connection for private order updates
//! - a shared `Dispatcher` receiving every decoded event
//!
//! Callbacks are registered before the matching subscriptions are issued,
//! so no event for a new subscription can arrive without a callback.

use crate::core::{BookTicker, Order, OrderBook, Trade};
use crate::exchanges::{
    BinanceSpotHandler, EventSink, Exchange, OkxPrivateHandler, OkxPublicHandler, VenueHandler,
};
use crate::hot_path::Dispatcher;
use crate::infrastructure::config::Config;
use crate::infrastructure::metrics::FeedMetrics;
use crate::ws::{
    ConnectMode, Connection, ConnectionFactory, ConnectionPool, Connector, PoolStats, StreamType,
};
use crate::{FeedError, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Market data feed for one exchange
pub struct MarketFeed {
    exchange: Exchange,
    pool: ConnectionPool,
    private: Option<Arc<Connection>>,
    dispatcher: Arc<Dispatcher>,
    metrics: Arc<FeedMetrics>,
}

impl MarketFeed {
    /// Build the feed and open the private channel when credentials exist
    ///
    /// Public connections are dialed on first subscribe. A failed private
    /// dial is logged and leaves the private channel absent.
    pub async fn connect(config: &Config, connector: Arc<dyn Connector>) -> Result<Self> {
        let exchange = config.feed.exchange;
        let metrics = Arc::new(FeedMetrics::new());
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&metrics)));

        let public_handler: Arc<dyn VenueHandler> = match exchange {
            Exchange::Okx => Arc::new(OkxPublicHandler::new()),
            Exchange::BinanceSpot => Arc::new(BinanceSpotHandler::new()),
        };

        let factory: ConnectionFactory = {
            let url = config.public_url();
            let conn_config = config.connection_config(false);
            let sink: Arc<dyn EventSink> = Arc::clone(&dispatcher) as Arc<dyn EventSink>;
            let connector = Arc::clone(&connector);
            let metrics = Arc::clone(&metrics);
            Arc::new(move |index| {
                Connection::new(
                    format!("{}-pub-{}", exchange, index),
                    url.clone(),
                    Arc::clone(&public_handler),
                    Arc::clone(&sink),
                    Arc::clone(&connector),
                    conn_config.clone(),
                    Arc::clone(&metrics),
                )
            })
        };
        let pool = ConnectionPool::new(config.pool.max_connections, factory);

        let private = Self::open_private(config, &connector, &dispatcher, &metrics).await;

        info!(
            exchange = %exchange,
            max_connections = pool.max_connections(),
            private = private.is_some(),
            "market feed ready"
        );

        Ok(Self {
            exchange,
            pool,
            private,
            dispatcher,
            metrics,
        })
    }

    async fn open_private(
        config: &Config,
        connector: &Arc<dyn Connector>,
        dispatcher: &Arc<Dispatcher>,
        metrics: &Arc<FeedMetrics>,
    ) -> Option<Arc<Connection>> {
        let exchange = config.feed.exchange;
        let Some(credentials) = config.credentials() else {
            info!(exchange = %exchange, "no credentials configured, private channel disabled");
            return None;
        };

        let (handler, url): (Arc<dyn VenueHandler>, String) = match (exchange, config.private_url()) {
            (Exchange::Okx, Some(url)) => (Arc::new(OkxPrivateHandler::new(credentials)), url),
            _ => {
                warn!(exchange = %exchange, "private channel not supported");
                return None;
            }
        };

        let conn = Connection::new(
            format!("{}-private", exchange),
            url,
            handler,
            Arc::clone(dispatcher) as Arc<dyn EventSink>,
            Arc::clone(connector),
            config.connection_config(true),
            Arc::clone(metrics),
        );

        match conn.dial(ConnectMode::Initial).await {
            Ok(()) => Some(conn),
            Err(e) => {
                error!(exchange = %exchange, error = %e, "private dial failed, private channel disabled");
                None
            }
        }
    }

    fn topic(&self, stream: StreamType) -> Result<&'static str> {
        self.exchange.topic(stream).ok_or_else(|| {
            FeedError::Unsupported(format!("{} on {}", stream.as_str(), self.exchange))
        })
    }

    /// Best bid/ask updates for `symbols`
    pub async fn subscribe_book_ticker<S, F>(&self, symbols: &[S], callback: F) -> Result<()>
    where
        S: AsRef<str>,
        F: Fn(&BookTicker) + Send + Sync + 'static,
    {
        let topic = self.topic(StreamType::BookTicker)?;
        self.dispatcher.set_book_ticker(callback);
        self.pool.subscribe(symbols, topic).await
    }

    /// Public trades for `symbols`
    pub async fn subscribe_trades<S, F>(&self, symbols: &[S], callback: F) -> Result<()>
    where
        S: AsRef<str>,
        F: Fn(&[Trade]) + Send + Sync + 'static,
    {
        let topic = self.topic(StreamType::Trade)?;
        self.dispatcher.set_trades(callback);
        self.pool.subscribe(symbols, topic).await
    }

    /// Shallow order book snapshots for `symbols`
    pub async fn subscribe_order_book<S, F>(&self, symbols: &[S], callback: F) -> Result<()>
    where
        S: AsRef<str>,
        F: Fn(&OrderBook) + Send + Sync + 'static,
    {
        let topic = self.topic(StreamType::OrderBook)?;
        self.dispatcher.set_order_book(callback);
        self.pool.subscribe(symbols, topic).await
    }

    /// Own order updates on the private channel
    pub async fn subscribe_orders<S, F>(&self, symbols: &[S], callback: F) -> Result<()>
    where
        S: AsRef<str>,
        F: Fn(&[Order]) + Send + Sync + 'static,
    {
        let topic = self.topic(StreamType::Order)?;
        let private = self.private.as_ref().ok_or(FeedError::PrivateUnavailable)?;
        self.dispatcher.set_orders(callback);
        for symbol in symbols {
            private.subscribe(symbol.as_ref(), topic).await?;
        }
        Ok(())
    }

    /// Write a raw payload on the first public connection
    pub async fn send_public<T: Serialize + ?Sized>(&self, payload: &T) -> Result<()> {
        let conn = self.pool.ensure_connection().await?;
        conn.write(payload).await
    }

    /// Public members plus the private connection, if any
    pub async fn connection_count(&self) -> usize {
        self.pool.len().await + usize::from(self.private.is_some())
    }

    pub async fn pool_stats(&self) -> PoolStats {
        self.pool.stats().await
    }

    pub fn exchange(&self) -> Exchange {
        self.exchange
    }

    pub fn has_private(&self) -> bool {
        self.private.is_some()
    }

    pub fn metrics(&self) -> Arc<FeedMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Close every connection (pool and private)
    pub async fn close(&self) {
        self.pool.close_all().await;
        if let Some(private) = &self.private {
            private.close();
        }
        info!(exchange = %self.exchange, "market feed closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::CredentialsConfig;
    use crate::test_utils::{wait_until, MockConnector};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    const BBO: &str = r#"{"arg":{"channel":"bbo-tbt","instId":"BTC-USDT-SWAP"},"data":[{"asks":[["43000.5","12","0","3"]],"bids":[["43000.1","7","0","2"]],"ts":"1700000000123","seqId":42}]}"#;

    fn okx_config() -> Config {
        let mut config = Config::default();
        config.feed.exchange = Exchange::Okx;
        config.pool.max_connections = 2;
        config.connection.reconnect_delay_ms = 20;
        config.connection.resubscribe_delay_ms = 5;
        config
    }

    fn with_credentials(mut config: Config) -> Config {
        config.credentials = Some(CredentialsConfig {
            api_key: "key".to_string(),
            secret_key: "secret".to_string(),
            passphrase: "phrase".to_string(),
        });
        config
    }

    #[tokio::test]
    async fn test_connect_is_lazy_without_credentials() {
        let connector = MockConnector::new();
        let feed = MarketFeed::connect(&okx_config(), connector.clone()).await.unwrap();

        assert!(!feed.has_private());
        assert_eq!(feed.connection_count().await, 0);
        assert_eq!(connector.dial_attempts(), 0);
    }

    #[tokio::test]
    async fn test_book_ticker_spreads_over_pool() {
        let connector = MockConnector::new();
        let feed = MarketFeed::connect(&okx_config(), connector.clone()).await.unwrap();

        feed.subscribe_book_ticker(&["BTC_USDT_SWAP", "ETH_USDT_SWAP", "SOL_USDT_SWAP"], |_| {})
            .await
            .unwrap();

        assert_eq!(feed.connection_count().await, 2);
        let stats = feed.pool_stats().await;
        assert_eq!(stats.total_connections, 2);
        assert_eq!(stats.subscriptions, 3);

        let first = connector.session(0);
        assert!(
            wait_until(|| first.sent_count() >= 2, Duration::from_secs(1)).await,
            "first member should carry two pairs"
        );
        assert_eq!(
            first.sent_texts()[0],
            r#"{"op":"subscribe","args":[{"channel":"bbo-tbt","instId":"BTC-USDT-SWAP"}]}"#
        );
        feed.close().await;
    }

    #[tokio::test]
    async fn test_callback_receives_decoded_events() {
        let connector = MockConnector::new();
        let feed = MarketFeed::connect(&okx_config(), connector.clone()).await.unwrap();

        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        feed.subscribe_book_ticker(&["BTC_USDT_SWAP"], move |ticker| {
            assert_eq!(ticker.symbol, "BTC_USDT_SWAP");
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();

        connector.session(0).push_text(BBO);
        let metrics = feed.metrics();
        assert!(
            wait_until(|| metrics.snapshot().events_dispatched == 1, Duration::from_secs(1)).await
        );
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        feed.close().await;
    }

    #[tokio::test]
    async fn test_rejected_symbol_does_not_block_the_rest() {
        let connector = MockConnector::new();
        let feed = MarketFeed::connect(&okx_config(), connector.clone()).await.unwrap();

        let result = feed.subscribe_trades(&["ETHUSDT", "BTC_USDT"], |_| {}).await;

        assert!(matches!(result, Err(FeedError::Symbol(_))));
        assert_eq!(feed.connection_count().await, 1);
        assert_eq!(feed.pool_stats().await.subscriptions, 1);
        let session = connector.session(0);
        assert!(
            wait_until(|| session.sent_count() == 1, Duration::from_secs(1)).await,
            "valid symbol should still be subscribed"
        );
        assert_eq!(
            session.sent_texts()[0],
            r#"{"op":"subscribe","args":[{"channel":"trades","instId":"BTC-USDT"}]}"#
        );
        feed.close().await;
    }

    #[tokio::test]
    async fn test_orders_without_private_channel() {
        let feed = MarketFeed::connect(&okx_config(), MockConnector::new())
            .await
            .unwrap();

        let result = feed.subscribe_orders(&["BTC_USDT_SWAP"], |_| {}).await;
        assert!(matches!(result, Err(FeedError::PrivateUnavailable)));
        assert!(!feed.dispatcher().has_callback("orders"));
    }

    #[tokio::test]
    async fn test_private_channel_logs_in_then_subscribes() {
        let connector = MockConnector::new();
        let feed = MarketFeed::connect(&with_credentials(okx_config()), connector.clone())
            .await
            .unwrap();

        assert!(feed.has_private());
        assert_eq!(feed.connection_count().await, 1);

        feed.subscribe_orders(&["BTC_USDT_SWAP"], |_| {}).await.unwrap();

        let session = connector.session(0);
        assert!(wait_until(|| session.sent_count() >= 2, Duration::from_secs(1)).await);
        let sent = session.sent_texts();
        assert!(sent[0].starts_with(r#"{"op":"login""#));
        assert_eq!(
            sent[1],
            r#"{"op":"subscribe","args":[{"channel":"orders","instType":"ANY","instId":"BTC-USDT-SWAP"}]}"#
        );
        feed.close().await;
    }

    #[tokio::test]
    async fn test_failed_private_dial_leaves_channel_absent() {
        let connector = MockConnector::new();
        connector.fail_next(1);
        let feed = MarketFeed::connect(&with_credentials(okx_config()), connector.clone())
            .await
            .unwrap();

        assert!(!feed.has_private());
        assert_eq!(connector.dial_attempts(), 1);
        assert!(matches!(
            feed.subscribe_orders(&["BTC_USDT_SWAP"], |_| {}).await,
            Err(FeedError::PrivateUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_binance_unsupported_streams() {
        let mut config = okx_config();
        config.feed.exchange = Exchange::BinanceSpot;
        let feed = MarketFeed::connect(&with_credentials(config), MockConnector::new())
            .await
            .unwrap();

        assert!(!feed.has_private());
        assert!(matches!(
            feed.subscribe_order_book(&["BTC_USDT"], |_| {}).await,
            Err(FeedError::Unsupported(_))
        ));
        assert!(!feed.dispatcher().has_callback("order_book"));
    }

    #[tokio::test]
    async fn test_send_public_uses_first_member() {
        let connector = MockConnector::new();
        let feed = MarketFeed::connect(&okx_config(), connector.clone()).await.unwrap();

        assert_ok!(feed.send_public(&serde_json::json!({"op": "ping"})).await);
        assert_ok!(feed.send_public(&serde_json::json!({"op": "ping"})).await);

        assert_eq!(feed.connection_count().await, 1);
        let session = connector.session(0);
        assert!(wait_until(|| session.sent_count() == 2, Duration::from_secs(1)).await);
        assert_eq!(session.sent_texts()[0], r#"{"op":"ping"}"#);
        feed.close().await;
    }

    #[tokio::test]
    async fn test_subscribe_without_capacity() {
        let connector = MockConnector::new();
        connector.fail_next(1);
        let feed = MarketFeed::connect(&okx_config(), connector.clone()).await.unwrap();

        let err = assert_err!(feed.subscribe_trades(&["BTC_USDT"], |_| {}).await);
        assert!(matches!(err, FeedError::NoCapacity(_)));
        assert_eq!(feed.connection_count().await, 0);
    }
}
