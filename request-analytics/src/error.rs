use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("failed to open access log {path}: {source}")]
    AccessLog {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("rate window must be between 1 and 86400 seconds, got {0}")]
    RateWindow(u64),

    #[error("invalid excluded prefix: {0}")]
    ExcludedPrefix(String),

    #[error("failed to register metric: {0}")]
    Metrics(#[from] prometheus::Error),
}
