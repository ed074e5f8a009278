//! Dense column-major matrix.
//!
//! Columns are stored contiguously so that every per-column scan reads and
//! writes a single slice, and so that the column loop can be split across
//! workers with `chunks_mut(rows)` without any locking.

use serde::{Deserialize, Serialize};

use crate::error::SignalError;

/// A `(rows, cols)` grid stored column by column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

/// Boolean `(T, N)` grid of entry or exit events.
pub type EventMatrix = Matrix<bool>;

impl<T: Clone> Matrix<T> {
    /// Matrix of `shape` with every cell set to `fill`.
    pub fn filled(shape: (usize, usize), fill: T) -> Self {
        let (rows, cols) = shape;
        Self {
            rows,
            cols,
            data: vec![fill; rows * cols],
        }
    }

    /// Build from row-major nested vectors (row `i` is `rows[i]`).
    pub fn from_rows(rows: &[Vec<T>]) -> Result<Self, SignalError> {
        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().find(|r| r.len() != n_cols) {
            return Err(SignalError::ShapeMismatch {
                what: "matrix row",
                expected: (n_rows, n_cols),
                actual: (n_rows, bad.len()),
            });
        }
        let mut data = Vec::with_capacity(n_rows * n_cols);
        for col in 0..n_cols {
            data.extend(rows.iter().map(|r| r[col].clone()));
        }
        Ok(Self {
            rows: n_rows,
            cols: n_cols,
            data,
        })
    }

    /// Build from a list of equally long columns.
    pub fn from_columns(columns: Vec<Vec<T>>) -> Result<Self, SignalError> {
        let n_cols = columns.len();
        let n_rows = columns.first().map_or(0, Vec::len);
        if let Some(bad) = columns.iter().find(|c| c.len() != n_rows) {
            return Err(SignalError::ShapeMismatch {
                what: "matrix column",
                expected: (n_rows, n_cols),
                actual: (bad.len(), n_cols),
            });
        }
        Ok(Self {
            rows: n_rows,
            cols: n_cols,
            data: columns.into_iter().flatten().collect(),
        })
    }

    /// Single-column matrix.
    pub fn from_column(column: Vec<T>) -> Self {
        Self {
            rows: column.len(),
            cols: 1,
            data: column,
        }
    }

    /// Copy of row `row` across all columns.
    pub fn row(&self, row: usize) -> Vec<T> {
        (0..self.cols).map(|col| self.get(row, col)).collect()
    }

    /// Row-major nested vectors; the inverse of [`Matrix::from_rows`].
    pub fn to_rows(&self) -> Vec<Vec<T>> {
        (0..self.rows).map(|row| self.row(row)).collect()
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[col * self.rows + row].clone()
    }
}

impl<T> Matrix<T> {
    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: T) {
        let rows = self.rows;
        self.data[col * rows + row] = value;
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn column(&self, col: usize) -> &[T] {
        &self.data[col * self.rows..(col + 1) * self.rows]
    }

    pub fn column_mut(&mut self, col: usize) -> &mut [T] {
        let rows = self.rows;
        &mut self.data[col * rows..(col + 1) * rows]
    }

    /// Column-major backing storage.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable column-major backing storage, for splitting into column chunks.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Iterator over disjoint mutable column slices.
    ///
    /// Yields nothing for a matrix with zero rows.
    pub fn columns_mut(&mut self) -> impl Iterator<Item = &mut [T]> {
        // zero rows means empty storage, so the chunk size only has to be non-zero
        self.data.chunks_mut(self.rows.max(1))
    }

    pub fn check_shape(
        &self,
        what: &'static str,
        expected: (usize, usize),
    ) -> Result<(), SignalError> {
        if self.shape() != expected {
            return Err(SignalError::ShapeMismatch {
                what,
                expected,
                actual: self.shape(),
            });
        }
        Ok(())
    }
}

impl Matrix<bool> {
    /// Rows holding `true` in column `col`, ascending.
    pub fn true_rows(&self, col: usize) -> Vec<usize> {
        true_rows(self.column(col))
    }

    /// Number of `true` cells per column.
    pub fn count_per_column(&self) -> Vec<usize> {
        (0..self.cols)
            .map(|col| self.column(col).iter().filter(|&&v| v).count())
            .collect()
    }
}

/// Rows holding `true` in a column slice, ascending.
pub fn true_rows(column: &[bool]) -> Vec<usize> {
    column
        .iter()
        .enumerate()
        .filter_map(|(i, &v)| v.then_some(i))
        .collect()
}
