//! Range extraction from event matrices.
//!
//! Every builder scans columns left to right and numbers its records
//! sequentially across the whole call.

use serde::{Deserialize, Serialize};

use crate::error::SignalError;
use crate::matrix::{true_rows, EventMatrix};

/// Whether a range was closed by a signal or is still running at the last row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeStatus {
    Open,
    Closed,
}

/// One range between two rows of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeRecord {
    pub id: usize,
    pub col: usize,
    pub start_idx: usize,
    pub end_idx: usize,
    pub status: RangeStatus,
}

impl RangeRecord {
    /// Rows spanned, `end_idx - start_idx`.
    pub fn duration(&self) -> usize {
        self.end_idx - self.start_idx
    }
}

#[derive(Debug, Default)]
struct RecordSink {
    records: Vec<RangeRecord>,
}

impl RecordSink {
    fn push(&mut self, col: usize, start_idx: usize, end_idx: usize, status: RangeStatus) {
        let id = self.records.len();
        self.records.push(RangeRecord {
            id,
            col,
            start_idx,
            end_idx,
            status,
        });
    }
}

/// Ranges between each pair of consecutive signals.
pub fn between_ranges(mask: &EventMatrix) -> Vec<RangeRecord> {
    let mut sink = RecordSink::default();
    for col in 0..mask.cols() {
        for pair in true_rows(mask.column(col)).windows(2) {
            sink.push(col, pair[0], pair[1], RangeStatus::Closed);
        }
    }
    sink.records
}

/// Ranges from each signal in `a` to the next signal in `b` at or after it.
///
/// With `from_other`, ranges run instead from the latest signal in `a` at or
/// before each signal in `b`. Signals on the same row give zero-length ranges.
pub fn between_two_ranges(
    a: &EventMatrix,
    b: &EventMatrix,
    from_other: bool,
) -> Result<Vec<RangeRecord>, SignalError> {
    b.check_shape("b", a.shape())?;
    let mut sink = RecordSink::default();
    for col in 0..a.cols() {
        let a_rows = true_rows(a.column(col));
        let b_rows = true_rows(b.column(col));
        if a_rows.is_empty() || b_rows.is_empty() {
            continue;
        }
        if from_other {
            for &to in &b_rows {
                let preceding = a_rows.partition_point(|&r| r <= to);
                if preceding > 0 {
                    sink.push(col, a_rows[preceding - 1], to, RangeStatus::Closed);
                }
            }
        } else {
            for &from in &a_rows {
                let skip = b_rows.partition_point(|&r| r < from);
                if let Some(&to) = b_rows.get(skip) {
                    sink.push(col, from, to, RangeStatus::Closed);
                }
            }
        }
    }
    Ok(sink.records)
}

/// One range per run of consecutive signals.
///
/// A run ending at a `false` row is closed at that row; a run reaching the
/// last row is open and ends there.
pub fn partition_ranges(mask: &EventMatrix) -> Vec<RangeRecord> {
    let mut sink = RecordSink::default();
    let rows = mask.rows();
    for col in 0..mask.cols() {
        let mut start = None;
        for (row, &signal) in mask.column(col).iter().enumerate() {
            match (signal, start) {
                (true, None) => start = Some(row),
                (false, Some(from)) => {
                    sink.push(col, from, row, RangeStatus::Closed);
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(from) = start {
            sink.push(col, from, rows - 1, RangeStatus::Open);
        }
    }
    sink.records
}

/// Ranges from the last signal of one run to the first signal of the next.
pub fn between_partition_ranges(mask: &EventMatrix) -> Vec<RangeRecord> {
    let mut sink = RecordSink::default();
    for col in 0..mask.cols() {
        let mut last_signal = None;
        let mut in_partition = false;
        for (row, &signal) in mask.column(col).iter().enumerate() {
            if signal {
                if let (false, Some(from)) = (in_partition, last_signal) {
                    sink.push(col, from, row, RangeStatus::Closed);
                }
                in_partition = true;
                last_signal = Some(row);
            } else {
                in_partition = false;
            }
        }
    }
    sink.records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Matrix;

    fn spans(records: &[RangeRecord]) -> Vec<(usize, usize, usize)> {
        records
            .iter()
            .map(|r| (r.col, r.start_idx, r.end_idx))
            .collect()
    }

    #[test]
    fn between_consecutive_signals() {
        let m = Matrix::from_columns(vec![
            vec![true, false, true, true],
            vec![false, true, false, false],
        ])
        .unwrap();
        let r = between_ranges(&m);
        assert_eq!(spans(&r), vec![(0, 0, 2), (0, 2, 3)]);
        assert_eq!(r.iter().map(|r| r.id).collect::<Vec<_>>(), vec![0, 1]);
        assert!(r.iter().all(|r| r.status == RangeStatus::Closed));
    }

    #[test]
    fn two_ranges_to_next_b() {
        let a = Matrix::from_column(vec![true, false, true, false, false]);
        let b = Matrix::from_column(vec![false, true, true, false, false]);
        let r = between_two_ranges(&a, &b, false).unwrap();
        assert_eq!(spans(&r), vec![(0, 0, 1), (0, 2, 2)]);
    }

    #[test]
    fn two_ranges_from_other() {
        let a = Matrix::from_column(vec![true, true, false, false, true]);
        let b = Matrix::from_column(vec![false, false, true, true, true]);
        let r = between_two_ranges(&a, &b, true).unwrap();
        assert_eq!(spans(&r), vec![(0, 1, 2), (0, 1, 3), (0, 4, 4)]);
    }

    #[test]
    fn partitions_close_on_false_and_stay_open_at_end() {
        let m = Matrix::from_column(vec![true, true, false, false, true, true]);
        let r = partition_ranges(&m);
        assert_eq!(spans(&r), vec![(0, 0, 2), (0, 4, 5)]);
        assert_eq!(r[0].status, RangeStatus::Closed);
        assert_eq!(r[1].status, RangeStatus::Open);
    }

    #[test]
    fn ranges_between_partitions() {
        let m = Matrix::from_column(vec![true, true, false, true, false, false, true]);
        let r = between_partition_ranges(&m);
        assert_eq!(spans(&r), vec![(0, 1, 3), (0, 3, 6)]);
    }

    #[test]
    fn ids_run_across_columns() {
        let m = Matrix::from_columns(vec![vec![true, false], vec![true, true]]).unwrap();
        let r = partition_ranges(&m);
        assert_eq!(r.iter().map(|r| (r.id, r.col)).collect::<Vec<_>>(), vec![(0, 0), (1, 1)]);
        assert_eq!(r[1].status, RangeStatus::Open);
        assert_eq!(r[1].duration(), 1);
    }
}
