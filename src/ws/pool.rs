//! WebSocket connection pool
//!
//! Spreads subscriptions over up to `max_connections` public connections.
//! Below the ceiling every placement dials a fresh connection; once the
//! ceiling is reached placements round-robin over the existing members.
//! A failed dial never blocks placement: it falls back to round-robin
//! whenever at least one member exists.
//!
//! Each (symbol, topic) pair is owned by exactly one member, so ledgers are
//! disjoint and a reconnect replays only what that member carried. A pair
//! the venue rejects is never placed: no owner, no dial, no cursor move.

use crate::ws::connection::{ConnectMode, Connection, ConnectionState};
use crate::ws::subscription::Subscription;
use crate::{FeedError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// Default pool ceiling
pub const DEFAULT_MAX_CONNECTIONS: usize = 20;

/// Builds the connection for a given pool index (not yet dialed)
pub type ConnectionFactory = Arc<dyn Fn(usize) -> Arc<Connection> + Send + Sync>;

struct PoolInner {
    /// Members in creation order
    connections: Vec<Arc<Connection>>,
    /// Index of the member returned by the last placement
    cursor: usize,
    /// Owner index of every placed pair
    owners: HashMap<Subscription, usize>,
}

/// Connection pool for public market data
pub struct ConnectionPool {
    inner: RwLock<PoolInner>,
    max_connections: usize,
    factory: ConnectionFactory,
}

/// Pool statistics (cold path)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub total_connections: usize,
    pub connected: usize,
    pub disconnected: usize,
    pub reconnecting: usize,
    pub subscriptions: usize,
}

impl ConnectionPool {
    /// Create an empty pool. Nothing is dialed until first use.
    pub fn new(max_connections: usize, factory: ConnectionFactory) -> Self {
        Self {
            inner: RwLock::new(PoolInner {
                connections: Vec::with_capacity(max_connections),
                cursor: 0,
                owners: HashMap::new(),
            }),
            max_connections: max_connections.max(1),
            factory,
        }
    }

    /// First member, dialing one if the pool is empty
    pub async fn ensure_connection(&self) -> Result<Arc<Connection>> {
        let mut inner = self.inner.write().await;
        if let Some(first) = inner.connections.first() {
            return Ok(Arc::clone(first));
        }

        let conn = (self.factory)(0);
        if let Err(e) = conn.dial(ConnectMode::Initial).await {
            error!(index = 0, error = %e, "pool dial failed");
            return Err(e);
        }
        inner.connections.push(Arc::clone(&conn));
        inner.cursor = 0;
        info!(index = 0, connection = %conn.label(), "pool connection added");
        Ok(conn)
    }

    /// Member for the next placement
    ///
    /// Grows the pool while below the ceiling, otherwise (or when the dial
    /// fails) advances the round-robin cursor.
    pub async fn next_connection(&self) -> Result<Arc<Connection>> {
        let mut inner = self.inner.write().await;
        self.next_locked(&mut inner, None).await.map(|(_, conn)| conn)
    }

    /// Pick (and commit) the member for a placement
    ///
    /// With `pair` set, the candidate must accept the pair's subscribe frame
    /// before anything is dialed or the cursor moves.
    async fn next_locked(
        &self,
        inner: &mut PoolInner,
        pair: Option<&Subscription>,
    ) -> Result<(usize, Arc<Connection>)> {
        if inner.connections.len() < self.max_connections {
            let index = inner.connections.len();
            let conn = (self.factory)(index);
            if let Some(sub) = pair {
                conn.subscribe_frame(&sub.symbol, &sub.topic)?;
            }
            match conn.dial(ConnectMode::Initial).await {
                Ok(()) => {
                    inner.connections.push(Arc::clone(&conn));
                    inner.cursor = index;
                    info!(index, connection = %conn.label(), "pool connection added");
                    return Ok((index, conn));
                }
                Err(e) => {
                    if inner.connections.is_empty() {
                        error!(index, error = %e, "pool dial failed, no connection available");
                        return Err(FeedError::NoCapacity(e.to_string()));
                    }
                    error!(index, error = %e, "pool dial failed, reusing existing connections");
                }
            }
        }

        let index = (inner.cursor + 1) % inner.connections.len();
        let conn = Arc::clone(&inner.connections[index]);
        if let Some(sub) = pair {
            conn.subscribe_frame(&sub.symbol, &sub.topic)?;
        }
        inner.cursor = index;
        Ok((index, conn))
    }

    /// Place one subscription per symbol for `topic`
    ///
    /// Pairs already owned by a member are routed back to that member. A
    /// rejected symbol is skipped and the rest are still placed; the first
    /// such error is returned at the end. Running out of capacity stops
    /// placement immediately.
    pub async fn subscribe<S: AsRef<str>>(&self, symbols: &[S], topic: &str) -> Result<()> {
        let mut first_error = None;
        for symbol in symbols {
            let symbol = symbol.as_ref();
            match self.place(symbol, topic).await {
                Ok(()) => {}
                Err(e @ FeedError::NoCapacity(_)) => return Err(e),
                Err(e) => {
                    warn!(symbol, topic, error = %e, "subscription skipped");
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn place(&self, symbol: &str, topic: &str) -> Result<()> {
        let key = Subscription::new(symbol, topic);

        let (index, conn) = {
            let mut inner = self.inner.write().await;
            match inner.owners.get(&key).copied() {
                Some(index) => (index, Arc::clone(&inner.connections[index])),
                None => {
                    let (index, conn) = self.next_locked(&mut inner, Some(&key)).await?;
                    inner.owners.insert(key.clone(), index);
                    (index, conn)
                }
            }
        };

        if let Err(e) = conn.subscribe(symbol, topic).await {
            let mut inner = self.inner.write().await;
            if inner.owners.get(&key) == Some(&index) && !conn.is_subscribed(symbol, topic) {
                inner.owners.remove(&key);
            }
            return Err(e);
        }
        Ok(())
    }

    /// Pool index owning a pair
    pub async fn owner_of(&self, symbol: &str, topic: &str) -> Option<usize> {
        let inner = self.inner.read().await;
        inner.owners.get(&Subscription::new(symbol, topic)).copied()
    }

    /// Members in creation order
    pub async fn connections(&self) -> Vec<Arc<Connection>> {
        self.inner.read().await.connections.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.connections.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.connections.is_empty()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Get pool statistics
    pub async fn stats(&self) -> PoolStats {
        let inner = self.inner.read().await;
        let mut stats = PoolStats {
            total_connections: inner.connections.len(),
            subscriptions: inner.owners.len(),
            ..Default::default()
        };

        for conn in &inner.connections {
            if conn.is_reconnecting() {
                stats.reconnecting += 1;
            } else if conn.state() == ConnectionState::Connected {
                stats.connected += 1;
            } else {
                stats.disconnected += 1;
            }
        }
        stats
    }

    /// Close every member
    pub async fn close_all(&self) {
        let inner = self.inner.read().await;
        for conn in &inner.connections {
            conn.close();
        }
    }
}
