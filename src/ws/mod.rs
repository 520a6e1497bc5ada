//! WebSocket connectivity
//!
//! - transport: connector seam and the tokio-tungstenite implementation
//! - connection: one resilient session with read/write/heartbeat loops
//! - heartbeat: ping/pong bookkeeping
//! - subscription: ordered subscription ledger
//! - pool: lazily grown, round-robin connection pool

pub mod connection;
pub mod heartbeat;
pub mod pool;
pub mod subscription;
pub mod transport;

pub use connection::{ConnectMode, Connection, ConnectionConfig, ConnectionState};
pub use heartbeat::Heartbeat;
pub use pool::{ConnectionFactory, ConnectionPool, PoolStats, DEFAULT_MAX_CONNECTIONS};
pub use subscription::{StreamType, Subscription, SubscriptionLedger};
pub use transport::{Connector, Transport, TungsteniteConnector, WebSocketError};
