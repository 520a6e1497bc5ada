//! Infrastructure - cold path only
//!
//! This module contains non-latency-critical code:
//! - Configuration management
//! - Logging and metrics
//! - Latency percentile reporting

pub mod config;
pub mod latency;
pub mod logging;
pub mod metrics;

pub use config::{Config, ConfigError};
pub use latency::{LatencyRecorder, LatencyReport, LatencySample, PercentileSummary};
pub use metrics::{FeedMetrics, MetricsSnapshot};
