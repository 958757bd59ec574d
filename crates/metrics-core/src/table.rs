//! Canonical in-memory representation of one job's time-series metrics.
//!
//! A table is a list of rows, each identified by the (group, metric, trace)
//! triple and carrying one numeric sample per measurement interval. All rows
//! of a table share the same interval layout; the parser enforces this at
//! construction so queries never have to re-check it.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MetricsError, Result};

/// Column name prefix of the per-interval value columns.
const INTERVAL_PREFIX: &str = "interval ";

/// Identifying columns that every metrics table must carry.
const ID_COLUMNS: [&str; 4] = ["jobId", "group", "metric", "trace"];

// ── MetricId ──────────────────────────────────────────────────────────────────

/// Identity of one measured quantity: the (group, metric, trace) triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricId {
    pub group: String,
    pub metric: String,
    pub trace: String,
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}: {}", self.group, self.metric, self.trace)
    }
}

// ── MetricRow ─────────────────────────────────────────────────────────────────

/// One table row: a metric identity plus its ordered interval samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    /// Identifier of the job this row was measured for.
    pub job_id: String,
    /// Metric group, e.g. `cpu` or `memory`.
    pub group: String,
    /// Metric name within the group, e.g. `Branching`.
    pub metric: String,
    /// Trace name within the metric, e.g. `branch rate`. May be empty.
    pub trace: String,
    /// One sample per interval, in interval order.
    pub values: Vec<f64>,
}

impl MetricRow {
    /// The (group, metric, trace) identity of this row.
    pub fn id(&self) -> MetricId {
        MetricId {
            group: self.group.clone(),
            metric: self.metric.clone(),
            trace: self.trace.clone(),
        }
    }
}

// ── MetricsTable ──────────────────────────────────────────────────────────────

/// Ordered collection of metric rows sharing one interval layout.
///
/// Immutable after construction; queries hand out references or copies.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsTable {
    rows: Vec<MetricRow>,
    num_intervals: usize,
}

impl MetricsTable {
    /// Build a table from already-constructed rows.
    ///
    /// The interval count is taken from the first row; every other row must
    /// agree with it. An empty row list yields a table with zero intervals.
    pub fn from_rows(rows: Vec<MetricRow>) -> Result<Self> {
        let num_intervals = rows.first().map(|r| r.values.len()).unwrap_or(0);
        for (idx, row) in rows.iter().enumerate() {
            if row.values.len() != num_intervals {
                return Err(MetricsError::TableParse(format!(
                    "row {} has {} values, expected {}",
                    idx + 1,
                    row.values.len(),
                    num_intervals
                )));
            }
        }
        Ok(Self {
            rows,
            num_intervals,
        })
    }

    /// Parse tabular text with the layout
    /// `jobId, group, metric, trace, interval 0, …, interval N`.
    ///
    /// The header row is located first; the identifying columns are found by
    /// name, the interval columns by the `interval ` prefix. Interval numbers
    /// must be contiguous and ascending from zero, and every data row must
    /// have exactly as many fields as the header. A header-only input yields
    /// an empty table whose interval count is still defined by the schema.
    ///
    /// Fields must not themselves contain the delimiter.
    pub fn parse_csv(text: &str, delimiter: char) -> Result<Self> {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());

        let header = lines
            .next()
            .ok_or_else(|| MetricsError::TableParse("input is empty".to_string()))?;
        let columns: Vec<&str> = header.split(delimiter).map(str::trim).collect();

        let mut id_cols = [0usize; 4];
        for (slot, name) in id_cols.iter_mut().zip(ID_COLUMNS) {
            *slot = columns.iter().position(|c| *c == name).ok_or_else(|| {
                MetricsError::TableParse(format!("missing required column '{}'", name))
            })?;
        }
        let [job_col, group_col, metric_col, trace_col] = id_cols;

        // Interval columns, validated to be contiguous and ordered.
        let mut interval_cols: Vec<usize> = Vec::new();
        for (pos, name) in columns.iter().enumerate() {
            if let Some(suffix) = name.strip_prefix(INTERVAL_PREFIX) {
                let number: usize = suffix.trim().parse().map_err(|_| {
                    MetricsError::TableParse(format!("invalid interval column '{}'", name))
                })?;
                if number != interval_cols.len() {
                    return Err(MetricsError::TableParse(format!(
                        "interval columns must be contiguous and ordered, found '{}' where 'interval {}' was expected",
                        name,
                        interval_cols.len()
                    )));
                }
                interval_cols.push(pos);
            }
        }
        let num_intervals = interval_cols.len();

        let mut rows: Vec<MetricRow> = Vec::new();
        for (row_no, line) in lines.enumerate() {
            let fields: Vec<&str> = line.split(delimiter).map(str::trim).collect();
            if fields.len() != columns.len() {
                return Err(MetricsError::TableParse(format!(
                    "row {} has {} fields, expected {}",
                    row_no + 1,
                    fields.len(),
                    columns.len()
                )));
            }

            let mut values = Vec::with_capacity(num_intervals);
            for pos in &interval_cols {
                let raw = fields[*pos];
                let value: f64 = raw.parse().map_err(|_| {
                    MetricsError::TableParse(format!(
                        "row {}: invalid numeric value '{}'",
                        row_no + 1,
                        raw
                    ))
                })?;
                values.push(value);
            }

            rows.push(MetricRow {
                job_id: fields[job_col].to_string(),
                group: fields[group_col].to_string(),
                metric: fields[metric_col].to_string(),
                trace: fields[trace_col].to_string(),
                values,
            });
        }

        Ok(Self {
            rows,
            num_intervals,
        })
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    /// All rows in original order.
    pub fn rows(&self) -> &[MetricRow] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// `true` when the table holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of interval columns, independent of the row count.
    pub fn num_intervals(&self) -> usize {
        self.num_intervals
    }

    /// Job identifier of the first row, or `None` for an empty table.
    pub fn job_id(&self) -> Option<&str> {
        self.rows.first().map(|r| r.job_id.as_str())
    }

    /// First row matching group and metric, and trace when given.
    pub fn find(&self, group: &str, metric: &str, trace: Option<&str>) -> Option<&MetricRow> {
        self.rows.iter().find(|row| {
            row.group == group
                && row.metric == metric
                && trace.map_or(true, |t| row.trace == t)
        })
    }

    /// Distinct (group, metric, trace) identities in first-occurrence order.
    pub fn metric_ids(&self) -> Vec<MetricId> {
        let mut seen: HashSet<MetricId> = HashSet::new();
        let mut ids = Vec::new();
        for row in &self.rows {
            let id = row.id();
            if seen.insert(id.clone()) {
                ids.push(id);
            }
        }
        ids
    }

    /// New table holding only the rows whose job identifier equals `job_id`.
    ///
    /// The comparison is string-based and case-insensitive; the original row
    /// order and the interval layout are preserved.
    pub fn filter_job(&self, job_id: &str) -> MetricsTable {
        let rows = self
            .rows
            .iter()
            .filter(|row| row.job_id.eq_ignore_ascii_case(job_id))
            .cloned()
            .collect();
        MetricsTable {
            rows,
            num_intervals: self.num_intervals,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CSV: &str = "\
jobId,group,metric,trace,interval 0,interval 1
42,cpu,Branching,branch rate,0.1,0.2
42,cpu,Branching,branch misprediction rate,0.01,0.02
43,memory,Bandwidth,read,100.0,110.0
";

    #[test]
    fn test_parse_csv_basic() {
        let table = MetricsTable::parse_csv(SAMPLE_CSV, ',').unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.num_intervals(), 2);
        assert_eq!(table.job_id(), Some("42"));
        assert_eq!(table.rows()[0].values, vec![0.1, 0.2]);
        assert_eq!(table.rows()[2].group, "memory");
    }

    #[test]
    fn test_parse_csv_header_only() {
        let table =
            MetricsTable::parse_csv("jobId,group,metric,trace,interval 0,interval 1\n", ',')
                .unwrap();
        assert!(table.is_empty());
        // The interval count is still defined by the schema.
        assert_eq!(table.num_intervals(), 2);
        assert_eq!(table.job_id(), None);
    }

    #[test]
    fn test_parse_csv_missing_column() {
        let err = MetricsTable::parse_csv("jobId,group,metric,interval 0\n", ',').unwrap_err();
        assert!(err.to_string().contains("missing required column 'trace'"));
    }

    #[test]
    fn test_parse_csv_non_contiguous_intervals() {
        let text = "jobId,group,metric,trace,interval 0,interval 2\n";
        let err = MetricsTable::parse_csv(text, ',').unwrap_err();
        assert!(err.to_string().contains("contiguous"));
    }

    #[test]
    fn test_parse_csv_field_count_mismatch() {
        let text = "jobId,group,metric,trace,interval 0\n42,cpu,Branching,branch rate\n";
        let err = MetricsTable::parse_csv(text, ',').unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn test_parse_csv_bad_numeric_value() {
        let text = "jobId,group,metric,trace,interval 0\n42,cpu,Branching,branch rate,abc\n";
        let err = MetricsTable::parse_csv(text, ',').unwrap_err();
        assert!(err.to_string().contains("invalid numeric value 'abc'"));
    }

    #[test]
    fn test_parse_csv_semicolon_delimiter() {
        let text = "jobId;group;metric;trace;interval 0\n7;cpu;Load;avg;1.5\n";
        let table = MetricsTable::parse_csv(text, ';').unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].values, vec![1.5]);
    }

    #[test]
    fn test_parse_csv_skips_blank_lines() {
        let text = "jobId,group,metric,trace,interval 0\n\n42,cpu,Load,avg,1.0\n\n";
        let table = MetricsTable::parse_csv(text, ',').unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_parse_csv_empty_input() {
        let err = MetricsTable::parse_csv("", ',').unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_from_rows_uniform() {
        let rows = vec![
            MetricRow {
                job_id: "1".into(),
                group: "cpu".into(),
                metric: "Load".into(),
                trace: "avg".into(),
                values: vec![1.0, 2.0],
            },
            MetricRow {
                job_id: "1".into(),
                group: "cpu".into(),
                metric: "Load".into(),
                trace: "max".into(),
                values: vec![3.0, 4.0],
            },
        ];
        let table = MetricsTable::from_rows(rows).unwrap();
        assert_eq!(table.num_intervals(), 2);
    }

    #[test]
    fn test_from_rows_mismatched_lengths() {
        let rows = vec![
            MetricRow {
                job_id: "1".into(),
                group: "cpu".into(),
                metric: "Load".into(),
                trace: "avg".into(),
                values: vec![1.0, 2.0],
            },
            MetricRow {
                job_id: "1".into(),
                group: "cpu".into(),
                metric: "Load".into(),
                trace: "max".into(),
                values: vec![3.0],
            },
        ];
        let err = MetricsTable::from_rows(rows).unwrap_err();
        assert!(err.to_string().contains("row 2"));
    }

    #[test]
    fn test_from_rows_empty() {
        let table = MetricsTable::from_rows(Vec::new()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.num_intervals(), 0);
    }

    #[test]
    fn test_filter_job_preserves_order_and_layout() {
        let table = MetricsTable::parse_csv(SAMPLE_CSV, ',').unwrap();
        let filtered = table.filter_job("42");
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered.num_intervals(), 2);
        assert_eq!(filtered.rows()[0].trace, "branch rate");
        assert_eq!(filtered.rows()[1].trace, "branch misprediction rate");
    }

    #[test]
    fn test_filter_job_case_insensitive() {
        let text = "jobId,group,metric,trace,interval 0\nAbC42,cpu,Load,avg,1.0\n";
        let table = MetricsTable::parse_csv(text, ',').unwrap();
        assert_eq!(table.filter_job("abc42").len(), 1);
        assert_eq!(table.filter_job("ABC42").len(), 1);
        assert_eq!(table.filter_job("other").len(), 0);
    }

    #[test]
    fn test_filter_job_no_match_keeps_intervals() {
        let table = MetricsTable::parse_csv(SAMPLE_CSV, ',').unwrap();
        let filtered = table.filter_job("999");
        assert!(filtered.is_empty());
        assert_eq!(filtered.num_intervals(), 2);
        assert_eq!(filtered.job_id(), None);
    }

    #[test]
    fn test_metric_ids_dedup_stable() {
        let text = "\
jobId,group,metric,trace,interval 0
1,cpu,Load,avg,1.0
1,cpu,Load,avg,2.0
1,cpu,Load,max,3.0
";
        let table = MetricsTable::parse_csv(text, ',').unwrap();
        let ids = table.metric_ids();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0].trace, "avg");
        assert_eq!(ids[1].trace, "max");
        assert!(ids.len() <= table.len());
    }

    #[test]
    fn test_find_with_and_without_trace() {
        let table = MetricsTable::parse_csv(SAMPLE_CSV, ',').unwrap();
        let row = table
            .find("cpu", "Branching", Some("branch misprediction rate"))
            .unwrap();
        assert_eq!(row.values, vec![0.01, 0.02]);

        // Without a trace the first matching row wins.
        let first = table.find("cpu", "Branching", None).unwrap();
        assert_eq!(first.trace, "branch rate");

        assert!(table.find("cpu", "Branching", Some("nonexistent")).is_none());
    }

    #[test]
    fn test_metric_id_display() {
        let id = MetricId {
            group: "cpu".into(),
            metric: "Branching".into(),
            trace: "branch rate".into(),
        };
        assert_eq!(id.to_string(), "cpu/Branching: branch rate");
    }
}
