//! Request logging and analytics for axum applications.
//!
//! Every completed exchange is classified, counted per `category:url` over a
//! sliding window, kept in a bounded newest-first buffer, printed to the
//! console and appended to a daily-rotated access log. The buffer is summarized
//! on demand at `/api/_analytics/logs` and shown by a polling dashboard at
//! `/api/_analytics/dashboard`.
//!
//! ```no_run
//! use std::sync::Arc;
//! use axum::{Router, routing::get};
//! use request_analytics::{Analytics, AnalyticsConfig, attach};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let (analytics, _writer) = Analytics::new(AnalyticsConfig::default())?;
//! let app = attach(Router::new().route("/", get(|| async { "hi" })), Arc::new(analytics));
//! # Ok(())
//! # }
//! ```

pub mod analytics;
pub mod classify;
pub mod config;
pub mod error;
pub mod file_log;
pub mod format;
pub mod invariants;
pub mod middleware;
pub mod models;
pub mod prometheus;
pub mod rate_tracker;
pub mod report;
pub mod ring_buffer;
pub mod server;

pub use analytics::Analytics;
pub use classify::{Filter, classify};
pub use config::{AnalyticsConfig, FileLogConfig};
pub use error::AnalyticsError;
pub use format::{Console, MemorySampler};
pub use models::{Category, LogEntry};
pub use rate_tracker::{ExpiryPolicy, RateTracker};
pub use report::{Report, aggregate};
pub use ring_buffer::RingBuffer;
pub use server::{attach, router, serve};
