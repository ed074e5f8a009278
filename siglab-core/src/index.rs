//! Per-column signal statistics.

use crate::matrix::EventMatrix;

/// Row of the `n`-th signal per column, `-1` if there is none.
///
/// `n` starts at 0; a negative `n` counts from the end (`-1` is the last).
pub fn nth_index(mask: &EventMatrix, n: i64) -> Vec<i64> {
    (0..mask.cols())
        .map(|col| nth_index_column(mask.column(col), n))
        .collect()
}

/// Single-column form of [`nth_index`].
pub fn nth_index_column(column: &[bool], n: i64) -> i64 {
    let found = if n >= 0 {
        column
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v)
            .nth(usize::try_from(n).unwrap_or(usize::MAX))
    } else {
        column
            .iter()
            .enumerate()
            .rev()
            .filter(|&(_, &v)| v)
            .nth(usize::try_from(n.unsigned_abs() - 1).unwrap_or(usize::MAX))
    };
    found.map_or(-1, |(row, _)| row as i64)
}

/// Mean signal row per column, mapped from `[0, rows - 1]` onto `[-1, 1]`.
///
/// NaN for a column without signals.
pub fn norm_avg_index(mask: &EventMatrix) -> Vec<f64> {
    let span = mask.rows().saturating_sub(1) as f64;
    (0..mask.cols())
        .map(|col| {
            let (sum, count) = mask
                .column(col)
                .iter()
                .enumerate()
                .filter(|&(_, &v)| v)
                .fold((0.0, 0usize), |(s, c), (row, _)| (s + row as f64, c + 1));
            if count == 0 {
                return f64::NAN;
            }
            let mean = sum / count as f64;
            mean / span * 2.0 - 1.0
        })
        .collect()
}

/// Number of signals per column.
pub fn total(mask: &EventMatrix) -> Vec<usize> {
    mask.count_per_column()
}

/// Share of rows holding a signal, per column.
pub fn rate(mask: &EventMatrix) -> Vec<f64> {
    let rows = mask.rows() as f64;
    total(mask).into_iter().map(|t| t as f64 / rows).collect()
}

/// Number of runs of consecutive signals per column.
pub fn total_partitions(mask: &EventMatrix) -> Vec<usize> {
    (0..mask.cols())
        .map(|col| {
            let column = mask.column(col);
            let mut prev = false;
            column
                .iter()
                .filter(|&&v| {
                    let starts = v && !prev;
                    prev = v;
                    starts
                })
                .count()
        })
        .collect()
}

/// Partitions per signal, per column; NaN without signals.
pub fn partition_rate(mask: &EventMatrix) -> Vec<f64> {
    total_partitions(mask)
        .into_iter()
        .zip(total(mask))
        .map(|(p, t)| if t == 0 { f64::NAN } else { p as f64 / t as f64 })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Matrix;

    fn sample() -> EventMatrix {
        Matrix::from_columns(vec![
            vec![true, true, false, true, false],
            vec![false, false, false, false, false],
        ])
        .unwrap()
    }

    #[test]
    fn nth_from_start_and_end() {
        let m = sample();
        assert_eq!(nth_index(&m, 0), vec![0, -1]);
        assert_eq!(nth_index(&m, 2), vec![3, -1]);
        assert_eq!(nth_index(&m, 3), vec![-1, -1]);
        assert_eq!(nth_index(&m, -1), vec![3, -1]);
        assert_eq!(nth_index(&m, -3), vec![0, -1]);
    }

    #[test]
    fn nth_at_integer_extremes_is_absent() {
        let m = sample();
        assert_eq!(nth_index(&m, i64::MIN), vec![-1, -1]);
        assert_eq!(nth_index(&m, i64::MAX), vec![-1, -1]);
        assert_eq!(nth_index(&m, -4), vec![-1, -1]);
    }

    #[test]
    fn normalized_average_row() {
        let avg = norm_avg_index(&sample());
        // mean row 4/3 over span 4
        assert!((avg[0] - (4.0 / 3.0 / 4.0 * 2.0 - 1.0)).abs() < 1e-12);
        assert!(avg[1].is_nan());

        let centered = Matrix::from_column(vec![true, false, true]);
        assert_eq!(norm_avg_index(&centered), vec![0.0]);
    }

    #[test]
    fn totals_and_rates() {
        let m = sample();
        assert_eq!(total(&m), vec![3, 0]);
        assert_eq!(rate(&m), vec![0.6, 0.0]);
        assert_eq!(total_partitions(&m), vec![2, 0]);
        let pr = partition_rate(&m);
        assert!((pr[0] - 2.0 / 3.0).abs() < 1e-12);
        assert!(pr[1].is_nan());
    }
}
