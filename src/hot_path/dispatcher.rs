//! Event dispatcher
//!
//! Routes decoded events to at most one callback per category. Callbacks
//! can be (re)registered while connections are delivering. A panicking
//! callback is logged and counted; delivery continues with the next event.

use crate::core::{BookTicker, MarketEvent, Order, OrderBook, Trade};
use crate::exchanges::traits::EventSink;
use crate::infrastructure::metrics::FeedMetrics;
use parking_lot::RwLock;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Callback slot with a warn-once flag for missing registrations
struct Slot<F: ?Sized> {
    callback: RwLock<Option<Arc<F>>>,
    warned: AtomicBool,
}

impl<F: ?Sized> Slot<F> {
    fn new() -> Self {
        Self {
            callback: RwLock::new(None),
            warned: AtomicBool::new(false),
        }
    }

    fn set(&self, callback: Arc<F>) {
        *self.callback.write() = Some(callback);
    }

    /// Clone out the callback so it runs without holding the lock
    #[inline]
    fn get(&self) -> Option<Arc<F>> {
        self.callback.read().clone()
    }

    fn is_set(&self) -> bool {
        self.callback.read().is_some()
    }
}

/// One callback per event category
pub struct Dispatcher {
    book_ticker: Slot<dyn Fn(&BookTicker) + Send + Sync>,
    trades: Slot<dyn Fn(&[Trade]) + Send + Sync>,
    orders: Slot<dyn Fn(&[Order]) + Send + Sync>,
    order_book: Slot<dyn Fn(&OrderBook) + Send + Sync>,
    metrics: Arc<FeedMetrics>,
}

impl Dispatcher {
    pub fn new(metrics: Arc<FeedMetrics>) -> Self {
        Self {
            book_ticker: Slot::new(),
            trades: Slot::new(),
            orders: Slot::new(),
            order_book: Slot::new(),
            metrics,
        }
    }

    pub fn set_book_ticker<F>(&self, callback: F)
    where
        F: Fn(&BookTicker) + Send + Sync + 'static,
    {
        self.book_ticker.set(Arc::new(callback));
    }

    pub fn set_trades<F>(&self, callback: F)
    where
        F: Fn(&[Trade]) + Send + Sync + 'static,
    {
        self.trades.set(Arc::new(callback));
    }

    pub fn set_orders<F>(&self, callback: F)
    where
        F: Fn(&[Order]) + Send + Sync + 'static,
    {
        self.orders.set(Arc::new(callback));
    }

    pub fn set_order_book<F>(&self, callback: F)
    where
        F: Fn(&OrderBook) + Send + Sync + 'static,
    {
        self.order_book.set(Arc::new(callback));
    }

    /// True if a callback is registered for the event's category
    pub fn has_callback(&self, kind: &str) -> bool {
        match kind {
            "book_ticker" => self.book_ticker.is_set(),
            "trades" => self.trades.is_set(),
            "orders" => self.orders.is_set(),
            "order_book" => self.order_book.is_set(),
            _ => false,
        }
    }

    /// Route one event to its callback
    pub fn dispatch(&self, event: &MarketEvent) {
        match event {
            MarketEvent::BookTicker(ticker) => {
                self.invoke(&self.book_ticker, event.kind(), |cb| cb(ticker))
            }
            MarketEvent::Trades(trades) => self.invoke(&self.trades, event.kind(), |cb| cb(trades)),
            MarketEvent::Orders(orders) => self.invoke(&self.orders, event.kind(), |cb| cb(orders)),
            MarketEvent::OrderBook(book) => {
                self.invoke(&self.order_book, event.kind(), |cb| cb(book))
            }
            MarketEvent::Unknown { channel } => {
                debug!(channel = %channel, "unhandled channel, event dropped");
            }
        }
    }

    #[inline]
    fn invoke<F: ?Sized>(&self, slot: &Slot<F>, kind: &'static str, call: impl FnOnce(&F)) {
        let Some(callback) = slot.get() else {
            self.metrics.record_unhandled();
            if !slot.warned.swap(true, Ordering::Relaxed) {
                warn!(kind, "no callback registered, events dropped");
            }
            return;
        };

        match catch_unwind(AssertUnwindSafe(|| call(callback.as_ref()))) {
            Ok(()) => self.metrics.record_dispatched(),
            Err(panic) => {
                self.metrics.record_callback_panic();
                error!(kind, panic = %panic_message(panic.as_ref()), "callback panicked");
            }
        }
    }
}

impl EventSink for Dispatcher {
    #[inline]
    fn on_event(&self, event: MarketEvent) {
        self.dispatch(&event);
    }
}

/// Best-effort text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
