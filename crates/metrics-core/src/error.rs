use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the metrics access layer.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// The requested group/metric/trace combination is not in the table.
    #[error("Metric not found: group='{group}', metric='{metric}', trace='{trace:?}'")]
    MetricNotFound {
        group: String,
        metric: String,
        trace: Option<String>,
    },

    /// The requested job does not exist at the data source.
    #[error("Job '{job_id}' not found: {detail}")]
    JobNotFound { job_id: String, detail: String },

    /// An invalid combination of construction-time arguments.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The metrics file does not exist.
    #[error("Metrics file not found: {0}")]
    FileNotFound(PathBuf),

    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Tabular text did not match the expected schema.
    #[error("Failed to parse metrics table: {0}")]
    TableParse(String),

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// The remote service answered with an unexpected HTTP status.
    #[error("Remote service returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// No usable access token could be obtained.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// A network request could not be completed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MetricsError {
    /// `true` for the recoverable not-found class of errors.
    ///
    /// [`DataManager::get_metrics`](crate::manager::DataManager::get_metrics)
    /// skips specs that fail with this class instead of propagating them.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            MetricsError::MetricNotFound { .. } | MetricsError::JobNotFound { .. }
        )
    }
}

/// Convenience alias used throughout the metrics crates.
pub type Result<T> = std::result::Result<T, MetricsError>;
