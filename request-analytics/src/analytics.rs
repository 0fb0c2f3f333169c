use std::time::Instant;

use chrono::Local;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::{
    classify::{Filter, classify, is_analytics_path},
    config::AnalyticsConfig,
    error::AnalyticsError,
    file_log::{FileLine, FileSink},
    format::{Console, MemorySampler, console_line, format_size},
    invariants::RateKey,
    models::{Exchange, LogEntry},
    prometheus::PromMetrics,
    rate_tracker::RateTracker,
    report::{Report, aggregate},
    ring_buffer::RingBuffer,
};

/// Request log state shared by the middleware and the analytics endpoints.
pub struct Analytics {
    config: AnalyticsConfig,
    filter: Filter,
    rates: Mutex<RateTracker>,
    buffer: RwLock<RingBuffer<LogEntry>>,
    memory: MemorySampler,
    console: Option<Console>,
    file_sink: Option<FileSink>,
    metrics: PromMetrics,
}

impl Analytics {
    /// Builds the state and, when configured, starts the access log writer.
    /// The writer handle is returned so hosts can await it on shutdown.
    pub fn new(config: AnalyticsConfig) -> Result<(Self, Option<JoinHandle<()>>), AnalyticsError> {
        config.validate()?;
        let (file_sink, writer) = match &config.file_log {
            Some(file_log) => {
                let (sink, handle) = FileSink::spawn(file_log)?;
                (Some(sink), Some(handle))
            }
            None => (None, None),
        };
        let analytics = Self {
            filter: config.filter()?,
            rates: Mutex::new(RateTracker::new(config.rate_window(), config.expiry)),
            buffer: RwLock::new(RingBuffer::with_capacity(config.capacity)),
            memory: MemorySampler::default(),
            console: config.console.then(Console::stdout),
            file_sink,
            metrics: PromMetrics::new()?,
            config,
        };
        info!(
            capacity = analytics.config.capacity,
            expiry = ?analytics.config.expiry,
            "Request analytics ready"
        );
        Ok((analytics, writer))
    }

    /// Sends console lines to `console` instead of stdout.
    pub fn with_console(mut self, console: Console) -> Self {
        self.console = Some(console);
        self
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn record(&self, exchange: &Exchange) -> Option<LogEntry> {
        self.record_at(exchange, Instant::now())
    }

    /// Logs one completed exchange. Returns the buffered entry, or `None` when
    /// the path is excluded.
    pub fn record_at(&self, exchange: &Exchange, now: Instant) -> Option<LogEntry> {
        if is_analytics_path(&exchange.path) || !self.filter.should_log(&exchange.path) {
            return None;
        }

        let category = classify(&exchange.path);
        let count = self
            .rates
            .lock()
            .increment_at(RateKey::new(category, &exchange.path), now);

        let entry = LogEntry {
            timestamp: exchange.at.with_timezone(&Local).format("%H:%M:%S").to_string(),
            category,
            method: exchange.method.clone(),
            url: exchange.path.clone(),
            status: exchange.status,
            response_time: (exchange.elapsed_ms * 1000.0).round() / 1000.0,
            size: exchange
                .content_length
                .map_or_else(|| "-".into(), format_size),
            memory: self.memory.snapshot(),
            user_agent: exchange.user_agent_product(),
            requests_per_minute: Some(count),
        };

        self.buffer.write().push(entry.clone());
        self.metrics.observe(&entry);

        if let Some(console) = &self.console {
            console.print(&console_line(&entry));
        }
        if let Some(sink) = &self.file_sink {
            match FileLine::from_exchange(exchange).render() {
                Some(line) => sink.send(line),
                None => warn!(endpoint = %exchange.endpoint, "Could not render access log line"),
            }
        }
        Some(entry)
    }

    /// Filtered copy of the buffer, newest first.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.buffer
            .read()
            .iter()
            .filter(|entry| self.filter.should_log(&entry.url))
            .cloned()
            .collect()
    }

    pub fn active_endpoints(&self) -> usize {
        self.active_endpoints_at(Instant::now())
    }

    pub fn active_endpoints_at(&self, now: Instant) -> usize {
        self.rates.lock().active_endpoints_at(&self.filter, now)
    }

    pub fn report(&self) -> Report {
        self.report_at(Instant::now())
    }

    pub fn report_at(&self, now: Instant) -> Report {
        let entries = self.snapshot();
        aggregate(&entries, self.active_endpoints_at(now), self.config.recent_limit)
    }

    pub fn export_to_prometheus(&self) -> Result<String, prometheus::Error> {
        let buffered = self.buffer.read().len();
        self.metrics.encode(buffered, self.active_endpoints())
    }
}
