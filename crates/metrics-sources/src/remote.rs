//! Remote measurement-service data source.
//!
//! Downloads job metrics over the service's REST API. A password-grant
//! OAuth token, cached on disk between runs, authenticates a CSV
//! measurement download; the result is then best-effort enriched with job
//! and node-hardware metadata from the listing endpoints.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use metrics_core::{DataManager, JobContext, MetricsError, MetricsTable, Result};
use serde_json::Value;
use tracing::debug;

use crate::token::{Credentials, TokenManager};
use crate::transport::{truncate_body, HttpResponse, Transport, UreqTransport};
use crate::DataSource;

// ── Defaults ──────────────────────────────────────────────────────────────────

/// Public demo instance of the measurement service.
pub const DEFAULT_API_BASE: &str = "https://demo.xbat.dev";
const DEFAULT_USERNAME: &str = "demo";
const DEFAULT_PASSWORD: &str = "demo";
const DEFAULT_CLIENT_ID: &str = "demo";

/// Network timeout for the metadata enrichment calls. The primary
/// measurement fetch is deliberately unbounded.
const METADATA_TIMEOUT: Duration = Duration::from_secs(30);

/// Default token-cache location under the user's home directory.
pub fn default_token_file() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".hpc-metrics")
        .join("token")
}

// ── AggregationLevel ──────────────────────────────────────────────────────────

/// Granularity at which a measurement is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggregationLevel {
    /// Whole job.
    #[default]
    Job,
    /// A single node; requires a node identifier.
    Node,
    /// A single core.
    Core,
}

impl AggregationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationLevel::Job => "job",
            AggregationLevel::Node => "node",
            AggregationLevel::Core => "core",
        }
    }
}

impl fmt::Display for AggregationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AggregationLevel {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "job" => Ok(AggregationLevel::Job),
            "node" => Ok(AggregationLevel::Node),
            "core" => Ok(AggregationLevel::Core),
            other => Err(MetricsError::Config(format!(
                "unknown aggregation level '{}'",
                other
            ))),
        }
    }
}

// ── RemoteConfig ──────────────────────────────────────────────────────────────

/// Connection parameters and query defaults for [`RemoteDataSource`].
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL of the service; a trailing slash is stripped on connect.
    pub api_base: String,
    /// Password-grant credentials.
    pub credentials: Credentials,
    /// Metric group filter; empty fetches all groups.
    pub group: String,
    /// Metric filter within the group; requires `group` to be set.
    pub metric: String,
    /// Aggregation level of the returned series.
    pub level: AggregationLevel,
    /// Node identifier; set exactly when `level` is [`AggregationLevel::Node`].
    pub node: String,
    /// Where the access token is cached between runs.
    pub token_file: PathBuf,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            credentials: Credentials {
                username: DEFAULT_USERNAME.to_string(),
                password: DEFAULT_PASSWORD.to_string(),
                client_id: DEFAULT_CLIENT_ID.to_string(),
            },
            group: String::new(),
            metric: String::new(),
            level: AggregationLevel::Job,
            node: String::new(),
            token_file: default_token_file(),
        }
    }
}

impl RemoteConfig {
    /// Check the argument-combination rules.
    fn validate(&self) -> Result<()> {
        if self.group.is_empty() && !self.metric.is_empty() {
            return Err(MetricsError::Config(
                "'metric' requires 'group' to be set".to_string(),
            ));
        }
        if self.level == AggregationLevel::Node && self.node.is_empty() {
            return Err(MetricsError::Config(
                "'node' must be provided when level is 'node'".to_string(),
            ));
        }
        if self.level != AggregationLevel::Node && !self.node.is_empty() {
            return Err(MetricsError::Config(
                "'node' is only valid when level is 'node'".to_string(),
            ));
        }
        Ok(())
    }
}

// ── RemoteDataSource ──────────────────────────────────────────────────────────

/// Data source that downloads job metrics from the measurement service.
///
/// Owns the mutable session state: the HTTP agent and the access token.
/// Instances are not designed for concurrent use from multiple threads;
/// share behind external synchronization if needed.
#[derive(Debug)]
pub struct RemoteDataSource<T: Transport = UreqTransport> {
    config: RemoteConfig,
    transport: T,
    tokens: TokenManager,
}

impl RemoteDataSource<UreqTransport> {
    /// Connect with the production HTTP transport.
    pub fn connect(config: RemoteConfig) -> Result<Self> {
        Self::with_transport(config, UreqTransport::new())
    }
}

impl<T: Transport> RemoteDataSource<T> {
    /// Connect with a caller-supplied transport.
    ///
    /// Validates the configuration, then runs the token startup sequence:
    /// load the cached token, validate it against the server, and fall back
    /// to the password grant. Failing to obtain a usable token here is
    /// fatal; nothing is deferred to the first fetch.
    pub fn with_transport(mut config: RemoteConfig, mut transport: T) -> Result<Self> {
        config.api_base = config.api_base.trim_end_matches('/').to_string();
        config.validate()?;

        let mut tokens = TokenManager::new(config.token_file.clone());
        tokens.load_cached();
        if !tokens.validate(&mut transport, &config.api_base) {
            tokens.request_new(&mut transport, &config.api_base, &config.credentials)?;
        }

        Ok(Self {
            config,
            transport,
            tokens,
        })
    }

    // ── Measurement fetch ─────────────────────────────────────────────────

    /// CSV endpoint URL for `job_id`, with the configured query parameters.
    ///
    /// Each parameter is appended only when non-empty; the level enum is
    /// never empty and defaults to `job`.
    fn measurement_url(&self, job_id: &str) -> String {
        let mut params: Vec<String> = Vec::new();
        if !self.config.group.is_empty() {
            params.push(format!("group={}", self.config.group));
        }
        if !self.config.metric.is_empty() {
            params.push(format!("metric={}", self.config.metric));
        }
        params.push(format!("level={}", self.config.level));
        if !self.config.node.is_empty() {
            params.push(format!("node={}", self.config.node));
        }

        format!(
            "{}/api/v1/measurements/{}/csv?{}",
            self.config.api_base,
            job_id,
            params.join("&")
        )
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.tokens.token().unwrap_or_default())
    }

    fn get_measurement(&mut self, url: &str) -> Result<HttpResponse> {
        let authorization = self.bearer();
        self.transport.get(
            url,
            &[("accept", "text/csv"), ("Authorization", &authorization)],
            None,
        )
    }

    // ── Context enrichment ────────────────────────────────────────────────

    /// Best-effort context lookup.
    ///
    /// Failures of any kind are absorbed at this boundary; the fetch
    /// degrades to a manager without context instead of failing.
    fn fetch_job_context(&mut self, job_id: &str) -> Option<JobContext> {
        match self.try_fetch_job_context(job_id) {
            Ok(context) => context,
            Err(e) => {
                debug!(job_id, error = %e, "context enrichment failed; continuing without context");
                None
            }
        }
    }

    fn try_fetch_job_context(&mut self, job_id: &str) -> Result<Option<JobContext>> {
        let Some(entry) = self.find_job_entry(job_id)? else {
            debug!(job_id, "job not present in the listing; no context");
            return Ok(None);
        };

        let mut hashes: Vec<String> = Vec::new();
        if let Some(nodes) = entry.get("nodes").and_then(Value::as_object) {
            for meta in nodes.values() {
                if let Some(hash) = meta.get("hash").and_then(Value::as_str) {
                    if !hash.is_empty() && !hashes.iter().any(|h| h == hash) {
                        hashes.push(hash.to_string());
                    }
                }
            }
        }
        if hashes.is_empty() {
            return Ok(None);
        }

        let hardware = self.fetch_node_hardware(&hashes)?;
        Ok(Some(JobContext::from_job_entry(job_id, &entry, &hardware)))
    }

    /// Entry from the job listing whose `jobId` matches, compared as strings.
    fn find_job_entry(&mut self, job_id: &str) -> Result<Option<Value>> {
        let url = format!("{}/api/v1/jobs?short=true", self.config.api_base);
        let authorization = self.bearer();
        let response = self.transport.get(
            &url,
            &[("Authorization", &authorization)],
            Some(METADATA_TIMEOUT),
        )?;
        if response.status != 200 {
            return Ok(None);
        }

        let payload: Value = serde_json::from_str(&response.body)?;
        let Some(jobs) = payload.get("data").and_then(Value::as_array) else {
            return Ok(None);
        };
        Ok(jobs
            .iter()
            .find(|entry| matches_job_id(entry.get("jobId"), job_id))
            .cloned())
    }

    /// Raw hardware descriptors for the given hashes, keyed by hash.
    ///
    /// A non-200 answer yields an empty mapping; the context is then built
    /// from the job entry alone.
    fn fetch_node_hardware(&mut self, hashes: &[String]) -> Result<Value> {
        let url = format!(
            "{}/api/v1/nodes?node_hashes={}",
            self.config.api_base,
            hashes.join(",")
        );
        let authorization = self.bearer();
        let response = self.transport.get(
            &url,
            &[("Authorization", &authorization)],
            Some(METADATA_TIMEOUT),
        )?;
        if response.status != 200 {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        Ok(serde_json::from_str(&response.body)?)
    }
}

/// String comparison of a listing's job identifier (numeric or string).
fn matches_job_id(value: Option<&Value>, job_id: &str) -> bool {
    match value {
        Some(Value::String(s)) => s == job_id,
        Some(Value::Number(n)) => n.to_string() == job_id,
        _ => false,
    }
}

impl<T: Transport> DataSource for RemoteDataSource<T> {
    fn fetch_job_data(&mut self, job_id: &str) -> Result<DataManager> {
        let url = self.measurement_url(job_id);

        let mut response = self.get_measurement(&url)?;
        if response.status == 401 {
            // The token may have expired mid-session; refresh once and retry.
            debug!(job_id, "measurement request rejected; refreshing token");
            self.tokens.request_new(
                &mut self.transport,
                &self.config.api_base,
                &self.config.credentials,
            )?;
            response = self.get_measurement(&url)?;
        }

        match response.status {
            200 => {}
            404 => {
                return Err(MetricsError::JobNotFound {
                    job_id: job_id.to_string(),
                    detail: "the job or the requested group/metric/level combination \
                             does not exist on the server"
                        .to_string(),
                })
            }
            status => {
                return Err(MetricsError::Api {
                    status,
                    body: truncate_body(&response.body),
                })
            }
        }

        let table = MetricsTable::parse_csv(&response.body, ',')?;
        let job_context = self.fetch_job_context(job_id);

        debug!(
            job_id,
            rows = table.len(),
            intervals = table.num_intervals(),
            has_context = job_context.is_some(),
            "fetched job metrics from remote service"
        );

        Ok(DataManager::new(table, job_context))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
