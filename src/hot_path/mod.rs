//! Hot path operations
//!
//! Latency-critical delivery of decoded events:
//! - Event dispatch to strategy callbacks
//! - Panic isolation per callback

pub mod dispatcher;

pub use dispatcher::{panic_message, Dispatcher};
