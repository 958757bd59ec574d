//! File-backed data source for exported metrics tables.

use std::path::PathBuf;

use metrics_core::{DataManager, MetricsError, MetricsTable, Result};
use tracing::debug;

use crate::DataSource;

/// Reads job metrics from a locally exported tabular file.
///
/// Exported files carry no hardware or job-execution metadata, so managers
/// produced by this source never have a job context; use the remote source
/// when benchmark numbers or node specs are needed.
#[derive(Debug)]
pub struct FileDataSource {
    path: PathBuf,
    delimiter: char,
}

impl FileDataSource {
    /// Open a comma-delimited metrics file.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_delimiter(path, ',')
    }

    /// Open a metrics file with a custom field delimiter.
    ///
    /// Fails immediately when the file does not exist; a fetch against a
    /// vanished path later still surfaces as a read error.
    pub fn with_delimiter(path: impl Into<PathBuf>, delimiter: char) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Err(MetricsError::FileNotFound(path));
        }
        Ok(Self { path, delimiter })
    }
}

impl DataSource for FileDataSource {
    fn fetch_job_data(&mut self, job_id: &str) -> Result<DataManager> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| {
            MetricsError::FileRead {
                path: self.path.clone(),
                source,
            }
        })?;

        let table = MetricsTable::parse_csv(&text, self.delimiter)?;
        let job_table = table.filter_job(job_id);
        if job_table.is_empty() {
            return Err(MetricsError::JobNotFound {
                job_id: job_id.to_string(),
                detail: format!("no matching rows in {}", self.path.display()),
            });
        }

        debug!(
            job_id,
            rows = job_table.len(),
            intervals = job_table.num_intervals(),
            "loaded job metrics from file"
        );

        Ok(DataManager::new(job_table, None))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
