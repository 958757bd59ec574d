//! Static metadata for one HPC job and the hardware it ran on.
//!
//! Complements the time-series table with information that is fixed for the
//! lifetime of the job: job-level fields (state, runtime, configuration
//! variant), a hostname-to-hardware-hash mapping, and per-hash hardware
//! descriptors including benchmark capabilities. Nodes sharing a hardware
//! hash are represented once.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// Hardware descriptor fields relevant for relating node capabilities to
// time-series observations. Everything else the hardware endpoint reports
// is dropped at construction.
const CPU_KEYS: [&str; 13] = [
    "Model name",
    "CPU(s)",
    "Core(s) per socket",
    "Socket(s)",
    "Thread(s) per core",
    "NUMA node(s)",
    "CPU max MHz",
    "L1d cache",
    "L1i cache",
    "L2 cache",
    "L3 cache",
    "Architecture",
    "Vendor ID",
];

const MEMORY_KEYS: [&str; 6] = [
    "Type",
    "Size",
    "Speed",
    "Maximum Capacity",
    "Number Of Installed Devices",
    "Error Correction Type",
];

// ── Aggregate ─────────────────────────────────────────────────────────────────

/// How [`JobContext::get_benchmark`] combines values across nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    /// Arithmetic mean of the reporting nodes.
    #[default]
    Mean,
    /// Smallest reported value.
    Min,
    /// Largest reported value.
    Max,
}

// ── NodeInfo ──────────────────────────────────────────────────────────────────

/// Operating-system identification of one node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OsInfo {
    pub distro: Option<String>,
    pub kernel: Option<String>,
    pub architecture: Option<String>,
}

/// Filtered hardware descriptor for one node hash.
///
/// Each section is absent when the hardware endpoint did not report it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// CPU model, topology and cache sizes.
    pub cpu: Option<Map<String, Value>>,
    /// Memory type, size and speed.
    pub memory: Option<Map<String, Value>>,
    /// Named theoretical-peak performance numbers (bandwidth, flops).
    pub benchmarks: Option<BTreeMap<String, f64>>,
    /// Distro, kernel and architecture.
    pub os: Option<OsInfo>,
}

/// Keep only the hardware fields relevant for performance analysis.
fn extract_node_info(raw: &Value) -> NodeInfo {
    let filter_keys = |section: &Map<String, Value>, keys: &[&str]| {
        keys.iter()
            .filter_map(|k| section.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect::<Map<String, Value>>()
    };

    let cpu = raw
        .get("cpu")
        .and_then(Value::as_object)
        .map(|o| filter_keys(o, &CPU_KEYS));

    let memory = raw
        .get("memory")
        .and_then(Value::as_object)
        .map(|o| filter_keys(o, &MEMORY_KEYS));

    // Non-numeric benchmark entries are dropped.
    let benchmarks = raw.get("benchmarks").and_then(Value::as_object).map(|o| {
        o.iter()
            .filter_map(|(k, v)| v.as_f64().map(|f| (k.clone(), f)))
            .collect::<BTreeMap<String, f64>>()
    });

    let os = raw.get("os").map(|o| OsInfo {
        distro: o.get("distro").and_then(Value::as_str).map(String::from),
        kernel: o.get("kernel").and_then(Value::as_str).map(String::from),
        architecture: o
            .get("architecture")
            .and_then(Value::as_str)
            .map(String::from),
    });

    NodeInfo {
        cpu,
        memory,
        benchmarks,
        os,
    }
}

// ── JobContext ────────────────────────────────────────────────────────────────

/// Static context for a single HPC job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobContext {
    job_id: String,
    /// Flat job-level fields: runtime, capturetime, jobState, runNr,
    /// iteration, variantName, and the hostname-to-hash `nodes` mapping.
    job_metadata: Map<String, Value>,
    /// One filtered hardware descriptor per unique node hash.
    node_hardware: BTreeMap<String, NodeInfo>,
}

impl JobContext {
    /// Assemble a context from already-extracted parts.
    pub fn new(
        job_id: impl Into<String>,
        job_metadata: Map<String, Value>,
        node_hardware: BTreeMap<String, NodeInfo>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            job_metadata,
            node_hardware,
        }
    }

    /// Build a context from a raw job-listing entry and the raw
    /// hardware-by-hash response.
    ///
    /// Extracts the job-level fields (including the hostname-to-hash
    /// mapping built from the entry's node list), then filters the hardware
    /// descriptor of every unique hash that the job references and the
    /// hardware response knows about. Unknown hashes are dropped silently.
    pub fn from_job_entry(job_id: &str, job_entry: &Value, node_hardware_raw: &Value) -> Self {
        let job_info = job_entry.get("jobInfo");
        let configuration = job_entry.get("configuration");
        let variant = configuration
            .and_then(|c| c.get("jobscript"))
            .and_then(|j| j.get("variantName"))
            .or_else(|| configuration.and_then(|c| c.get("variantName")))
            .cloned()
            .unwrap_or(Value::Null);

        let field = |v: Option<&Value>| v.cloned().unwrap_or(Value::Null);

        let mut nodes = Map::new();
        if let Some(nodes_raw) = job_entry.get("nodes").and_then(Value::as_object) {
            for (hostname, meta) in nodes_raw {
                nodes.insert(hostname.clone(), field(meta.get("hash")));
            }
        }

        let mut job_metadata = Map::new();
        job_metadata.insert("runtime".to_string(), field(job_entry.get("runtime")));
        job_metadata.insert(
            "capturetime".to_string(),
            field(job_entry.get("capturetime")),
        );
        job_metadata.insert(
            "jobState".to_string(),
            field(job_info.and_then(|i| i.get("jobState"))),
        );
        job_metadata.insert("runNr".to_string(), field(job_entry.get("runNr")));
        job_metadata.insert("iteration".to_string(), field(job_entry.get("iteration")));
        job_metadata.insert("variantName".to_string(), variant);
        job_metadata.insert("nodes".to_string(), Value::Object(nodes.clone()));

        let mut node_hardware = BTreeMap::new();
        for hash in nodes.values().filter_map(Value::as_str) {
            if hash.is_empty() || node_hardware.contains_key(hash) {
                continue;
            }
            if let Some(raw) = node_hardware_raw.get(hash) {
                node_hardware.insert(hash.to_string(), extract_node_info(raw));
            }
        }

        Self {
            job_id: job_id.to_string(),
            job_metadata,
            node_hardware,
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    /// The job identifier.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Top-level field from the job metadata.
    pub fn get_metadata(&self, key: &str) -> Option<&Value> {
        self.job_metadata.get(key)
    }

    /// Unique node hardware hashes used by this job, in stable order.
    pub fn get_node_hashes(&self) -> Vec<&str> {
        self.node_hardware.keys().map(String::as_str).collect()
    }

    /// Hardware descriptor for one node hash.
    pub fn get_node_info(&self, node_hash: &str) -> Option<&NodeInfo> {
        self.node_hardware.get(node_hash)
    }

    /// Aggregate one benchmark value across all nodes that report it.
    ///
    /// Nodes lacking the key are ignored; `None` when no node reports it,
    /// since aggregation over an empty set has no value.
    pub fn get_benchmark(&self, key: &str, aggregate: Aggregate) -> Option<f64> {
        let values: Vec<f64> = self
            .node_hardware
            .values()
            .filter_map(|info| info.benchmarks.as_ref()?.get(key).copied())
            .collect();
        if values.is_empty() {
            return None;
        }
        Some(match aggregate {
            Aggregate::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Aggregate::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Aggregate::Mean => values.iter().sum::<f64>() / values.len() as f64,
        })
    }

    /// CPU property from the first node that carries a cpu section.
    ///
    /// Representative for homogeneous clusters; heterogeneous jobs should
    /// walk [`get_node_info`](Self::get_node_info) per hash instead.
    pub fn get_cpu_info(&self, key: &str) -> Option<&Value> {
        self.node_hardware
            .values()
            .find_map(|info| info.cpu.as_ref())
            .and_then(|cpu| cpu.get(key))
    }

    /// Memory property from the first node that carries a memory section.
    pub fn get_memory_info(&self, key: &str) -> Option<&Value> {
        self.node_hardware
            .values()
            .find_map(|info| info.memory.as_ref())
            .and_then(|memory| memory.get(key))
    }
}

impl fmt::Display for JobContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n_nodes = self
            .job_metadata
            .get("nodes")
            .and_then(Value::as_object)
            .map_or(0, Map::len);
        let state = self
            .job_metadata
            .get("jobState")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        write!(
            f,
            "JobContext(job_id=\"{}\", nodes={}, jobState=\"{}\", node_hashes={})",
            self.job_id,
            n_nodes,
            state,
            self.node_hardware.len()
        )
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
