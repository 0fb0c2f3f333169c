use prometheus::{
    Histogram, HistogramOpts, IntCounterVec, IntGauge, Registry, TextEncoder, opts,
};

use crate::models::LogEntry;

const LATENCY_BUCKETS_MS: [f64; 12] = [
    50.0, 100.0, 200.0, 300.0, 400.0, 500.0, 600.0, 700.0, 800.0, 1000.0, 2500.0, 5000.0,
];

pub struct PromMetrics {
    pub requests: IntCounterVec,
    pub response_time: Histogram,
    pub buffered_entries: IntGauge,
    pub active_endpoints: IntGauge,
    pub registry: Registry,
}

impl PromMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            opts!("analytics_requests_total", "Logged requests by category and status"),
            &["category", "status"],
        )?;

        let response_time = Histogram::with_opts(
            HistogramOpts::new(
                "analytics_response_time_ms",
                "Response time of logged requests in milliseconds",
            )
            .buckets(LATENCY_BUCKETS_MS.to_vec()),
        )?;

        let buffered_entries = IntGauge::with_opts(opts!(
            "analytics_buffered_entries",
            "Entries currently held in the ring buffer"
        ))?;

        let active_endpoints = IntGauge::with_opts(opts!(
            "analytics_active_endpoints",
            "Distinct category:url keys in the current rate window"
        ))?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(response_time.clone()))?;
        registry.register(Box::new(buffered_entries.clone()))?;
        registry.register(Box::new(active_endpoints.clone()))?;

        Ok(Self {
            requests,
            response_time,
            buffered_entries,
            active_endpoints,
            registry,
        })
    }

    pub fn observe(&self, entry: &LogEntry) {
        let status = entry.status.to_string();
        self.requests
            .with_label_values(&[entry.category.as_str(), status.as_str()])
            .inc();
        self.response_time.observe(entry.response_time);
    }

    pub fn encode(&self, buffered: usize, active: usize) -> Result<String, prometheus::Error> {
        self.buffered_entries.set(buffered as i64);
        self.active_endpoints.set(active as i64);
        let mut buffer = String::new();
        TextEncoder::new().encode_utf8(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}
