//! Subscription ledger
//!
//! Records every (symbol, topic) pair a connection has subscribed to, in
//! insertion order, so a reconnect can replay exactly what the connection
//! owned. Pairs are deduplicated and never removed (no unsubscribe).

use std::collections::{HashMap, HashSet};

/// Type of data stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamType {
    /// Best bid/ask stream
    BookTicker,
    /// Public trades
    Trade,
    /// Shallow order book
    OrderBook,
    /// Private order updates
    Order,
}

impl StreamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamType::BookTicker => "book_ticker",
            StreamType::Trade => "trade",
            StreamType::OrderBook => "order_book",
            StreamType::Order => "order",
        }
    }
}

/// One recorded subscription
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    pub symbol: String,
    pub topic: String,
}

impl Subscription {
    pub fn new(symbol: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            topic: topic.into(),
        }
    }
}

/// Ordered, deduplicated subscription record
#[derive(Debug, Default, Clone)]
pub struct SubscriptionLedger {
    /// Insertion order, replayed verbatim
    entries: Vec<Subscription>,
    /// Membership, with the last session epoch the pair was written on (0 = never)
    index: HashMap<Subscription, u64>,
}

impl SubscriptionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pair. Returns false if it was already present.
    pub fn insert(&mut self, symbol: &str, topic: &str) -> bool {
        let sub = Subscription::new(symbol, topic);
        if self.index.contains_key(&sub) {
            return false;
        }
        self.index.insert(sub.clone(), 0);
        self.entries.push(sub);
        true
    }

    pub fn contains(&self, symbol: &str, topic: &str) -> bool {
        self.index.contains_key(&Subscription::new(symbol, topic))
    }

    /// Record that the pair's frame went out on session `epoch`
    pub fn mark_sent(&mut self, sub: &Subscription, epoch: u64) {
        if let Some(sent) = self.index.get_mut(sub) {
            *sent = (*sent).max(epoch);
        }
    }

    /// True if the pair's frame already went out on session `epoch`
    pub fn sent_in(&self, sub: &Subscription, epoch: u64) -> bool {
        self.index.get(sub).is_some_and(|&sent| sent == epoch)
    }

    /// All pairs in insertion order
    pub fn entries(&self) -> &[Subscription] {
        &self.entries
    }

    /// Topics recorded for a symbol, in insertion order
    pub fn topics_for(&self, symbol: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|s| s.symbol == symbol)
            .map(|s| s.topic.as_str())
            .collect()
    }

    /// Distinct symbols, in first-seen order
    pub fn symbols(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .filter(|s| seen.insert(s.symbol.as_str()))
            .map(|s| s.symbol.as_str())
            .collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
