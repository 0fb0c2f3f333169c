use std::{path::PathBuf, time::Duration};

use serde::Deserialize;

use crate::{
    classify::{DEFAULT_EXCLUDED_PREFIXES, Filter},
    error::AnalyticsError,
    rate_tracker::{ExpiryPolicy, MAX_WINDOW},
    report::DEFAULT_RECENT_LIMIT,
    ring_buffer::DEFAULT_CAPACITY,
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FileLogConfig {
    pub dir: PathBuf,
    pub file_name: String,
}

impl Default for FileLogConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./logs"),
            file_name: "access.json".into(),
        }
    }
}

impl FileLogConfig {
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Serve the dashboard page.
    pub ui: bool,
    /// Serve the Prometheus exposition endpoint.
    pub metrics: bool,
    pub capacity: usize,
    pub recent_limit: usize,
    pub rate_window_secs: u64,
    pub expiry: ExpiryPolicy,
    /// Print one line per request to stdout.
    pub console: bool,
    pub file_log: Option<FileLogConfig>,
    pub excluded_prefixes: Vec<String>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            ui: true,
            metrics: true,
            capacity: DEFAULT_CAPACITY,
            recent_limit: DEFAULT_RECENT_LIMIT,
            rate_window_secs: 60,
            expiry: ExpiryPolicy::default(),
            console: true,
            file_log: Some(FileLogConfig::default()),
            excluded_prefixes: DEFAULT_EXCLUDED_PREFIXES.map(String::from).to_vec(),
        }
    }
}

impl AnalyticsConfig {
    /// Buffer-only settings: no stdout, no file.
    pub fn quiet() -> Self {
        Self {
            console: false,
            file_log: None,
            ..Self::default()
        }
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window_secs)
    }

    pub fn validate(&self) -> Result<(), AnalyticsError> {
        if self.rate_window_secs == 0 || self.rate_window() > MAX_WINDOW {
            return Err(AnalyticsError::RateWindow(self.rate_window_secs));
        }
        Ok(())
    }

    pub fn filter(&self) -> Result<Filter, AnalyticsError> {
        let prefixes = self
            .excluded_prefixes
            .iter()
            .map(|p| p.parse().map_err(AnalyticsError::ExcludedPrefix))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Filter::new(prefixes))
    }
}
