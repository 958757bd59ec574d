//! Data sources for HPC job metrics.
//!
//! Each source turns a job identifier into a [`DataManager`]: either by
//! reading a locally exported metrics file or by querying the remote
//! measurement service, including its token-based authentication protocol.

pub mod file;
pub mod remote;
pub mod token;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

use metrics_core::{DataManager, Result};

pub use file::FileDataSource;
pub use remote::{AggregationLevel, RemoteConfig, RemoteDataSource};
pub use token::{Credentials, TokenManager, TokenState};
pub use transport::{HttpResponse, Transport, UreqTransport};

pub use metrics_core as core;

/// Capability shared by all metric data sources.
///
/// Implementations take `&mut self` because fetching may mutate session
/// state (the remote source refreshes its access token in place).
pub trait DataSource {
    /// Fetch all metrics for `job_id` and wrap them in a [`DataManager`].
    ///
    /// Fails with a not-found error when the job does not exist at this
    /// source, or an I/O-class error when the data cannot be retrieved.
    fn fetch_job_data(&mut self, job_id: &str) -> Result<DataManager>;
}
