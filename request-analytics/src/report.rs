use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{Category, LogEntry};

pub const DEFAULT_RECENT_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimePoint {
    pub timestamp: String,
    pub response_time: f64,
    pub status: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    /// Requests per 100 ms latency bucket, keyed by the bucket's lower bound.
    pub response_time_distribution: BTreeMap<u64, usize>,
    pub status_code_distribution: BTreeMap<u16, usize>,
    pub requests_by_category: BTreeMap<Category, usize>,
    pub time_series_data: Vec<TimePoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_requests: usize,
    pub average_response_time: f64,
    pub error_rate: f64,
    /// Distinct `category:url` keys seen in the current rate window. Serialized
    /// under the name the dashboard reads.
    #[serde(rename = "requestsPerMinute")]
    pub active_endpoints: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub recent_logs: Vec<LogEntry>,
    pub statistics: Statistics,
    pub summary: Summary,
}

/// Envelope returned by the logs endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

pub fn latency_bucket(response_time: f64) -> u64 {
    ((response_time / 100.0).floor().max(0.0) as u64) * 100
}

/// Computes every dashboard view over `entries`, which are newest first and
/// already scrubbed by the exclusion filter.
pub fn aggregate(entries: &[LogEntry], active_endpoints: usize, recent_limit: usize) -> Report {
    let mut response_time_distribution = BTreeMap::new();
    let mut status_code_distribution = BTreeMap::new();
    let mut requests_by_category = BTreeMap::new();
    let mut total_time = 0.0;
    let mut errors = 0usize;

    for entry in entries {
        *response_time_distribution
            .entry(latency_bucket(entry.response_time))
            .or_default() += 1;
        *status_code_distribution.entry(entry.status).or_default() += 1;
        *requests_by_category.entry(entry.category).or_default() += 1;
        total_time += entry.response_time;
        if entry.status >= 400 {
            errors += 1;
        }
    }

    let time_series_data = entries
        .iter()
        .map(|entry| TimePoint {
            timestamp: entry.timestamp.clone(),
            response_time: entry.response_time,
            status: entry.status,
        })
        .collect();

    let total = entries.len();
    let (average_response_time, error_rate) = if total == 0 {
        (0.0, 0.0)
    } else {
        (total_time / total as f64, errors as f64 / total as f64)
    };

    Report {
        recent_logs: entries.iter().take(recent_limit).cloned().collect(),
        statistics: Statistics {
            response_time_distribution,
            status_code_distribution,
            requests_by_category,
            time_series_data,
        },
        summary: Summary {
            total_requests: total,
            average_response_time,
            error_rate,
            active_endpoints,
        },
    }
}
