//! Query surface over one job's metrics.
//!
//! A [`DataManager`] wraps a [`MetricsTable`] together with an optional
//! [`JobContext`] and exposes the lookup operations downstream detection
//! logic consumes. Managers are produced by data sources and never mutate
//! their table; bulk accessors return copies.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{MetricsError, Result};
use crate::job_context::JobContext;
use crate::table::{MetricId, MetricsTable};

// ── MetricSpec ────────────────────────────────────────────────────────────────

/// One requested metric in a bulk lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub group: String,
    pub metric: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

impl MetricSpec {
    /// Spec without a trace; the first row of the (group, metric) pair wins.
    pub fn new(group: impl Into<String>, metric: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            metric: metric.into(),
            trace: None,
        }
    }

    /// Spec pinned to one trace.
    pub fn with_trace(
        group: impl Into<String>,
        metric: impl Into<String>,
        trace: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            metric: metric.into(),
            trace: Some(trace.into()),
        }
    }

    /// Synthesized result key: `group_metric`, plus `_trace` with spaces
    /// replaced by underscores when a trace is set.
    pub fn key(&self) -> String {
        let mut key = format!("{}_{}", self.group, self.metric);
        if let Some(trace) = &self.trace {
            key.push('_');
            key.push_str(&trace.replace(' ', "_"));
        }
        key
    }
}

// ── DataManager ───────────────────────────────────────────────────────────────

/// Read interface over one job's metrics table and optional static context.
#[derive(Debug, Clone)]
pub struct DataManager {
    table: MetricsTable,
    job_context: Option<JobContext>,
}

impl DataManager {
    /// Wrap a table plus its optional context.
    pub fn new(table: MetricsTable, job_context: Option<JobContext>) -> Self {
        Self { table, job_context }
    }

    /// Job identifier taken from the table's first row.
    ///
    /// `None` for an empty table.
    pub fn job_id(&self) -> Option<&str> {
        self.table.job_id()
    }

    /// Static job/hardware context, when the producing source could supply one.
    pub fn job_context(&self) -> Option<&JobContext> {
        self.job_context.as_ref()
    }

    /// Time series for one metric.
    ///
    /// Filters by exact match on `group` and `metric`, and on `trace` when
    /// given. When several rows match an omitted trace, the first row in
    /// original table order is returned; zero matches fail with
    /// [`MetricsError::MetricNotFound`].
    pub fn get_metric(&self, group: &str, metric: &str, trace: Option<&str>) -> Result<&[f64]> {
        self.table
            .find(group, metric, trace)
            .map(|row| row.values.as_slice())
            .ok_or_else(|| MetricsError::MetricNotFound {
                group: group.to_string(),
                metric: metric.to_string(),
                trace: trace.map(str::to_string),
            })
    }

    /// Bulk lookup, keyed by each spec's synthesized name.
    ///
    /// Specs that do not resolve are skipped silently; the result is empty
    /// (not an error) when nothing resolves.
    pub fn get_metrics(&self, specs: &[MetricSpec]) -> HashMap<String, Vec<f64>> {
        let mut result = HashMap::new();
        for spec in specs {
            // Lookups only fail with the recoverable not-found class.
            if let Ok(values) = self.get_metric(&spec.group, &spec.metric, spec.trace.as_deref()) {
                result.insert(spec.key(), values.to_vec());
            }
        }
        result
    }

    /// Distinct metric identities, in first-occurrence order.
    pub fn list_available_metrics(&self) -> Vec<MetricId> {
        self.table.metric_ids()
    }

    /// Number of measurement intervals, independent of the row count.
    pub fn get_time_series_length(&self) -> usize {
        self.table.num_intervals()
    }

    /// Full copy of the underlying table.
    ///
    /// Hands the caller an owned value so internal state cannot be mutated.
    pub fn get_all_time_series(&self) -> MetricsTable {
        self.table.clone()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_manager() -> DataManager {
        let csv = "\
jobId,group,metric,trace,interval 0,interval 1,interval 2
42,cpu,Branching,branch rate,0.1,0.2,0.3
42,cpu,Branching,branch misprediction rate,0.01,0.02,0.03
42,memory,Bandwidth,read,100.0,110.0,120.0
42,memory,Bandwidth,read,999.0,999.0,999.0
";
        let table = MetricsTable::parse_csv(csv, ',').unwrap();
        DataManager::new(table, None)
    }

    // ── get_metric ────────────────────────────────────────────────────────

    #[test]
    fn test_get_metric_direct_hit() {
        let manager = sample_manager();
        let values = manager
            .get_metric("cpu", "Branching", Some("branch rate"))
            .unwrap();
        assert_eq!(values, [0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_get_metric_without_trace_returns_first_row() {
        let manager = sample_manager();
        let values = manager.get_metric("cpu", "Branching", None).unwrap();
        assert_eq!(values, [0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_get_metric_ambiguous_trace_is_stable() {
        let manager = sample_manager();
        // Two rows share (memory, Bandwidth, read); the earlier one wins.
        let values = manager
            .get_metric("memory", "Bandwidth", Some("read"))
            .unwrap();
        assert_eq!(values, [100.0, 110.0, 120.0]);
    }

    #[test]
    fn test_get_metric_not_found() {
        let manager = sample_manager();
        let err = manager
            .get_metric("cpu", "Branching", Some("nonexistent"))
            .unwrap_err();
        assert!(err.is_not_found());

        let err = manager.get_metric("gpu", "Load", None).unwrap_err();
        assert!(err.is_not_found());
    }

    // ── get_metrics ───────────────────────────────────────────────────────

    #[test]
    fn test_get_metrics_key_synthesis() {
        let manager = sample_manager();
        let specs = vec![
            MetricSpec::with_trace("cpu", "Branching", "branch rate"),
            MetricSpec::new("memory", "Bandwidth"),
        ];
        let result = manager.get_metrics(&specs);
        assert_eq!(result.len(), 2);
        assert_eq!(
            result["cpu_Branching_branch_rate"],
            vec![0.1, 0.2, 0.3]
        );
        assert_eq!(result["memory_Bandwidth"], vec![100.0, 110.0, 120.0]);
    }

    #[test]
    fn test_get_metrics_skips_unresolvable_specs() {
        let manager = sample_manager();
        let specs = vec![
            MetricSpec::with_trace("cpu", "Branching", "branch rate"),
            MetricSpec::new("gpu", "Load"),
        ];
        let result = manager.get_metrics(&specs);
        assert_eq!(result.len(), 1);
        assert!(result.contains_key("cpu_Branching_branch_rate"));
    }

    #[test]
    fn test_get_metrics_all_unknown_yields_empty() {
        let manager = sample_manager();
        let specs = vec![
            MetricSpec::new("gpu", "Load"),
            MetricSpec::with_trace("net", "Throughput", "rx"),
        ];
        let result = manager.get_metrics(&specs);
        assert!(result.is_empty());
    }

    // ── listing and layout ────────────────────────────────────────────────

    #[test]
    fn test_list_available_metrics_dedup() {
        let manager = sample_manager();
        let ids = manager.list_available_metrics();
        // The duplicate (memory, Bandwidth, read) row collapses to one entry.
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[0].to_string(), "cpu/Branching: branch rate");
        assert!(ids.len() <= manager.get_all_time_series().len());
    }

    #[test]
    fn test_get_time_series_length() {
        let manager = sample_manager();
        assert_eq!(manager.get_time_series_length(), 3);
    }

    #[test]
    fn test_get_time_series_length_empty_table() {
        let table =
            MetricsTable::parse_csv("jobId,group,metric,trace,interval 0,interval 1\n", ',')
                .unwrap();
        let manager = DataManager::new(table, None);
        assert_eq!(manager.get_time_series_length(), 2);
        assert!(manager.job_id().is_none());
    }

    #[test]
    fn test_get_all_time_series_is_a_copy() {
        let manager = sample_manager();
        let copy = manager.get_all_time_series();
        assert_eq!(copy.len(), 4);
        // The copy is an owned value; dropping it leaves the manager intact.
        drop(copy);
        assert_eq!(manager.get_all_time_series().len(), 4);
    }

    #[test]
    fn test_job_id_from_first_row() {
        let manager = sample_manager();
        assert_eq!(manager.job_id(), Some("42"));
        assert!(manager.job_context().is_none());
    }

    // ── MetricSpec ────────────────────────────────────────────────────────

    #[test]
    fn test_spec_key_without_trace() {
        assert_eq!(MetricSpec::new("cpu", "Branching").key(), "cpu_Branching");
    }

    #[test]
    fn test_spec_key_replaces_spaces_in_trace() {
        let spec = MetricSpec::with_trace("cpu", "Branching", "branch misprediction rate");
        assert_eq!(spec.key(), "cpu_Branching_branch_misprediction_rate");
    }
}
