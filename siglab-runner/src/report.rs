//! Serializable job reports.

use serde::{Deserialize, Serialize};

use siglab_core::clean::clean_enex;
use siglab_core::index::{nth_index, total_partitions};
use siglab_core::ranges::{between_two_ranges, partition_ranges};
use siglab_core::{EventMatrix, Matrix, RangeRecord, SignalError, StopType};

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Raw matrices produced by a job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutput {
    pub entries: EventMatrix,
    pub exits: Option<EventMatrix>,
    pub stop_price: Option<Matrix<f64>>,
    pub stop_type: Option<Matrix<Option<StopType>>>,
}

/// One stop hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopHit {
    pub col: usize,
    pub row: usize,
    pub price: f64,
    pub stop_type: StopType,
}

/// Per-column counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub col: usize,
    pub entries: usize,
    pub exits: usize,
    /// Runs of consecutive entries.
    pub partitions: usize,
    pub first_entry: Option<usize>,
}

/// Everything a job produced, in JSON-friendly form.
///
/// Event matrices are listed as the rows holding a signal, per column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub job_id: String,
    pub kind: String,
    pub rows: usize,
    pub cols: usize,
    pub seed: Option<u64>,
    pub entries: Vec<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exits: Option<Vec<Vec<usize>>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stops: Vec<StopHit>,
    /// Entry-to-exit ranges after cleaning, or entry partitions without exits.
    pub ranges: Vec<RangeRecord>,
    pub columns: Vec<ColumnSummary>,
}

fn signal_rows(mask: &EventMatrix) -> Vec<Vec<usize>> {
    (0..mask.cols()).map(|col| mask.true_rows(col)).collect()
}

fn stop_hits(stop_price: &Matrix<f64>, stop_type: &Matrix<Option<StopType>>) -> Vec<StopHit> {
    let mut hits = Vec::new();
    for col in 0..stop_type.cols() {
        for (row, kind) in stop_type.column(col).iter().enumerate() {
            if let Some(stop_type) = *kind {
                hits.push(StopHit {
                    col,
                    row,
                    price: stop_price.get(row, col),
                    stop_type,
                });
            }
        }
    }
    hits
}

impl SignalReport {
    /// Summarize a job's output.
    pub fn build(
        job_id: String,
        kind: &str,
        seed: Option<u64>,
        output: &JobOutput,
    ) -> Result<Self, SignalError> {
        let entries = &output.entries;
        let ranges = match &output.exits {
            Some(exits) => {
                let (en, ex) = clean_enex(entries, exits, true)?;
                between_two_ranges(&en, &ex, false)?
            }
            None => partition_ranges(entries),
        };

        let entry_counts = entries.count_per_column();
        let exit_counts = output
            .exits
            .as_ref()
            .map(|ex| ex.count_per_column())
            .unwrap_or_else(|| vec![0; entries.cols()]);
        let partitions = total_partitions(entries);
        let first = nth_index(entries, 0);
        let columns = (0..entries.cols())
            .map(|col| ColumnSummary {
                col,
                entries: entry_counts[col],
                exits: exit_counts[col],
                partitions: partitions[col],
                first_entry: usize::try_from(first[col]).ok(),
            })
            .collect();

        let stops = match (&output.stop_price, &output.stop_type) {
            (Some(price), Some(kind)) => stop_hits(price, kind),
            _ => Vec::new(),
        };

        Ok(Self {
            schema_version: SCHEMA_VERSION,
            job_id,
            kind: kind.to_string(),
            rows: entries.rows(),
            cols: entries.cols(),
            seed,
            entries: signal_rows(entries),
            exits: output.exits.as_ref().map(signal_rows),
            stops,
            ranges,
            columns,
        })
    }

    pub fn to_json(&self, pretty: bool) -> Result<String, serde_json::Error> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}
