use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use metrics_sources::{Credentials, RemoteConfig};

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Fetch and inspect HPC job performance metrics
#[derive(Parser, Debug, Clone)]
#[command(
    name = "hpc-metrics",
    about = "Fetch and inspect HPC job performance metrics",
    version
)]
pub struct Settings {
    /// Job identifier to fetch
    pub job_id: String,

    /// Where to read metrics from
    #[arg(long, default_value = "file", value_parser = ["file", "remote"])]
    pub source: String,

    /// Path to an exported metrics file (file source)
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Field delimiter of the metrics file
    #[arg(long, default_value = ",")]
    pub delimiter: String,

    /// Base URL of the measurement service (remote source)
    #[arg(long, default_value = metrics_sources::remote::DEFAULT_API_BASE)]
    pub api_base: String,

    /// Username for the password-grant flow
    #[arg(long, default_value = "demo")]
    pub username: String,

    /// Password for the password-grant flow
    #[arg(long, default_value = "demo")]
    pub password: String,

    /// OAuth client identifier
    #[arg(long, default_value = "demo")]
    pub client_id: String,

    /// Metric group filter (empty fetches all groups)
    #[arg(long, default_value = "")]
    pub group: String,

    /// Metric filter within the group (requires --group)
    #[arg(long, default_value = "")]
    pub metric: String,

    /// Aggregation level
    #[arg(long, default_value = "job", value_parser = ["job", "node", "core"])]
    pub level: String,

    /// Node identifier (required with --level node)
    #[arg(long, default_value = "")]
    pub node: String,

    /// Access-token cache file (defaults to ~/.hpc-metrics/token)
    #[arg(long)]
    pub token_file: Option<PathBuf>,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,
}

impl Settings {
    /// The delimiter flag as a single character.
    pub fn delimiter_char(&self) -> Result<char> {
        let mut chars = self.delimiter.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => bail!("--delimiter must be a single character"),
        }
    }

    /// Map the remote-source flags onto a [`RemoteConfig`].
    pub fn remote_config(&self) -> Result<RemoteConfig> {
        Ok(RemoteConfig {
            api_base: self.api_base.clone(),
            credentials: Credentials {
                username: self.username.clone(),
                password: self.password.clone(),
                client_id: self.client_id.clone(),
            },
            group: self.group.clone(),
            metric: self.metric.clone(),
            level: self.level.parse()?,
            node: self.node.clone(),
            token_file: self
                .token_file
                .clone()
                .unwrap_or_else(metrics_sources::remote::default_token_file),
        })
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
