//! Configuration management for the feed
//!
//! Loads configuration from config.toml at startup (path overridable with
//! `CONFIG_PATH`). Every section is optional; missing values fall back to
//! the defaults below. OKX credentials may also come from the environment
//! (`OKX_API_KEY`, `OKX_SECRET_KEY`, `OKX_PASSPHRASE`), which wins over the
//! file.

use crate::exchanges::{Credentials, Exchange};
use crate::ws::ConnectionConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Feed configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub connection: ConnectionSettings,

    #[serde(default)]
    pub latency: LatencyConfig,

    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// Private channel credentials; absent means public data only
    #[serde(default)]
    pub credentials: Option<CredentialsConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// What to subscribe to
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedConfig {
    #[serde(default = "default_exchange")]
    pub exchange: Exchange,

    /// Internal symbols (`ETH_USDT_SWAP`, `ETH_USDT`)
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    #[serde(default = "default_true")]
    pub book_ticker: bool,

    #[serde(default = "default_true")]
    pub trades: bool,

    #[serde(default)]
    pub order_book: bool,

    /// Private order updates (needs credentials)
    #[serde(default)]
    pub orders: bool,

    /// Seconds between metrics log lines in the binary
    #[serde(default = "default_stats_every")]
    pub stats_every_secs: u64,
}

/// Connection pool settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
    /// Hard ceiling on public connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Per-connection tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionSettings {
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,

    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,

    #[serde(default = "default_pong_timeout_secs")]
    pub pong_timeout_secs: u64,

    #[serde(default = "default_queue_capacity")]
    pub outbound_queue_capacity: usize,

    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    #[serde(default = "default_resubscribe_delay_ms")]
    pub resubscribe_delay_ms: u64,

    /// Reconnect the private channel after a loss
    #[serde(default)]
    pub reconnect_private: bool,
}

/// Latency recorder settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LatencyConfig {
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
}

/// Endpoint overrides
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EndpointsConfig {
    #[serde(default)]
    pub public_url: Option<String>,

    #[serde(default)]
    pub private_url: Option<String>,
}

/// Credentials as written in the file
#[derive(Clone, Default, Deserialize, Serialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default)]
    pub passphrase: String,
}

impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("api_key", &self.api_key)
            .finish_non_exhaustive()
    }
}

/// Logging settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Root of the rolling log files
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,

    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also log to stdout
    #[serde(default = "default_true")]
    pub console: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            exchange: default_exchange(),
            symbols: default_symbols(),
            book_ticker: true,
            trades: true,
            order_book: false,
            orders: false,
            stats_every_secs: default_stats_every(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            handshake_timeout_ms: default_handshake_timeout_ms(),
            ping_interval_secs: default_ping_interval_secs(),
            pong_timeout_secs: default_pong_timeout_secs(),
            outbound_queue_capacity: default_queue_capacity(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            resubscribe_delay_ms: default_resubscribe_delay_ms(),
            reconnect_private: false,
        }
    }
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            flush_interval_secs: default_flush_interval_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            level: default_log_level(),
            console: true,
        }
    }
}

fn default_exchange() -> Exchange {
    Exchange::Okx
}

fn default_symbols() -> Vec<String> {
    vec!["BTC_USDT_SWAP".to_string(), "ETH_USDT_SWAP".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_stats_every() -> u64 {
    30
}

fn default_max_connections() -> usize {
    20
}

fn default_handshake_timeout_ms() -> u64 {
    10_000
}

fn default_ping_interval_secs() -> u64 {
    20
}

fn default_pong_timeout_secs() -> u64 {
    60
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_reconnect_delay_ms() -> u64 {
    5_000
}

fn default_resubscribe_delay_ms() -> u64 {
    100
}

fn default_flush_interval_secs() -> u64 {
    60 // 1 minute
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from config.toml file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// # Errors
    /// Returns error if file exists but cannot be parsed or is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        let mut config = Self::load_from(Path::new(&config_path))?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path (defaults if the file is missing)
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
            Err(e) => Err(ConfigError::IoError(e)),
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Overlay credentials from `OKX_*` variables
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let vars = [
            lookup("OKX_API_KEY"),
            lookup("OKX_SECRET_KEY"),
            lookup("OKX_PASSPHRASE"),
        ];
        if vars.iter().all(Option::is_none) {
            return;
        }

        let creds = self.credentials.get_or_insert_with(CredentialsConfig::default);
        let [api_key, secret_key, passphrase] = vars;
        if let Some(v) = api_key {
            creds.api_key = v;
        }
        if let Some(v) = secret_key {
            creds.secret_key = v;
        }
        if let Some(v) = passphrase {
            creds.passphrase = v;
        }
    }

    /// Reject values the feed cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool.max_connections == 0 {
            return Err(ConfigError::Invalid("pool.max_connections must be > 0".into()));
        }
        if self.connection.outbound_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "connection.outbound_queue_capacity must be > 0".into(),
            ));
        }
        if self.connection.ping_interval_secs == 0 {
            return Err(ConfigError::Invalid("connection.ping_interval_secs must be > 0".into()));
        }
        if self.connection.pong_timeout_secs <= self.connection.ping_interval_secs {
            return Err(ConfigError::Invalid(
                "connection.pong_timeout_secs must exceed ping_interval_secs".into(),
            ));
        }
        if self.latency.flush_interval_secs == 0 {
            return Err(ConfigError::Invalid("latency.flush_interval_secs must be > 0".into()));
        }
        for url in [&self.endpoints.public_url, &self.endpoints.private_url]
            .into_iter()
            .flatten()
        {
            let parsed = url::Url::parse(url)
                .map_err(|e| ConfigError::Invalid(format!("bad endpoint {}: {}", url, e)))?;
            if !matches!(parsed.scheme(), "ws" | "wss") {
                return Err(ConfigError::Invalid(format!("endpoint {} is not ws/wss", url)));
            }
        }
        Ok(())
    }

    /// Complete credentials, if configured
    pub fn credentials(&self) -> Option<Credentials> {
        let c = self.credentials.as_ref()?;
        let creds = Credentials::new(&c.api_key, &c.secret_key, &c.passphrase);
        creds.is_complete().then_some(creds)
    }

    pub fn public_url(&self) -> String {
        self.endpoints
            .public_url
            .clone()
            .unwrap_or_else(|| self.feed.exchange.public_url().to_string())
    }

    pub fn private_url(&self) -> Option<String> {
        self.endpoints
            .private_url
            .clone()
            .or_else(|| self.feed.exchange.private_url().map(str::to_string))
    }

    /// Connection tuning for a public (`private = false`) or private member
    pub fn connection_config(&self, private: bool) -> ConnectionConfig {
        let c = &self.connection;
        ConnectionConfig {
            handshake_timeout: Duration::from_millis(c.handshake_timeout_ms),
            ping_interval: Duration::from_secs(c.ping_interval_secs),
            pong_timeout: Duration::from_secs(c.pong_timeout_secs),
            outbound_queue_capacity: c.outbound_queue_capacity,
            reconnect_delay: Duration::from_millis(c.reconnect_delay_ms),
            resubscribe_delay: Duration::from_millis(c.resubscribe_delay_ms),
            auto_reconnect: !private || c.reconnect_private,
            private,
        }
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.latency.flush_interval_secs)
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading file
    IoError(std::io::Error),
    /// Parse error (invalid TOML)
    ParseError(String),
    /// Parsed but unusable
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::ParseError(e) => write!(f, "Failed to parse config: {}", e),
            ConfigError::Invalid(e) => write!(f, "Invalid config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError(e) => Some(e),
            ConfigError::ParseError(_) | ConfigError::Invalid(_) => None,
        }
    }
}

impl From<ConfigError> for crate::FeedError {
    fn from(e: ConfigError) -> Self {
        crate::FeedError::Config(e.to_string())
    }
}
