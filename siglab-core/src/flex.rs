//! Flexible selection: read lower-rank inputs as if broadcast to `(rows, cols)`.
//!
//! Callers hand over a scalar, one value per column, one value per row, or a
//! full grid. Nothing is materialized; every read goes through
//! [`Flex::select`].

use crate::error::SignalError;
use crate::matrix::Matrix;

/// A parameter or price array broadcastable to a `(rows, cols)` grid.
#[derive(Debug, Clone, PartialEq)]
pub enum Flex<T> {
    /// Same value everywhere.
    Scalar(T),
    /// One value per row, shared by all columns.
    PerRow(Vec<T>),
    /// One value per column, shared by all rows.
    PerCol(Vec<T>),
    /// Element-wise.
    Full(Matrix<T>),
}

impl<T: Copy> Flex<T> {
    /// Interpret a 1-D array.
    ///
    /// With `flex_2d` the values run along columns, otherwise along rows.
    /// A single value is a scalar either way.
    pub fn from_1d(values: Vec<T>, flex_2d: bool) -> Self {
        match values.as_slice() {
            [only] => Flex::Scalar(*only),
            _ if flex_2d => Flex::PerCol(values),
            _ => Flex::PerRow(values),
        }
    }

    /// Interpret a 2-D array, collapsing degenerate dimensions.
    pub fn from_2d(matrix: Matrix<T>) -> Self {
        match matrix.shape() {
            (1, 1) => Flex::Scalar(matrix.get(0, 0)),
            (1, _) => Flex::PerCol(matrix.row(0)),
            (_, 1) => Flex::PerRow(matrix.column(0).to_vec()),
            _ => Flex::Full(matrix),
        }
    }

    /// Value at `(row, col)` as if the array had been broadcast.
    #[inline]
    pub fn select(&self, row: usize, col: usize) -> T {
        match self {
            Flex::Scalar(v) => *v,
            Flex::PerRow(v) => v[row],
            Flex::PerCol(v) => v[col],
            Flex::Full(m) => m.get(row, col),
        }
    }

    /// Every distinct stored value (not the broadcast grid).
    pub fn values(&self) -> Box<dyn Iterator<Item = T> + '_> {
        match self {
            Flex::Scalar(v) => Box::new(std::iter::once(*v)),
            Flex::PerRow(v) | Flex::PerCol(v) => Box::new(v.iter().copied()),
            Flex::Full(m) => Box::new(m.as_slice().iter().copied()),
        }
    }
}

impl<T> Flex<T> {
    /// Verify this array broadcasts to `shape`.
    pub fn check_shape(&self, what: &'static str, shape: (usize, usize)) -> Result<(), SignalError> {
        let (rows, cols) = shape;
        let ok = match self {
            Flex::Scalar(_) => true,
            Flex::PerRow(v) => v.len() == rows,
            Flex::PerCol(v) => v.len() == cols,
            Flex::Full(m) => m.shape() == shape,
        };
        if ok {
            return Ok(());
        }
        let actual = match self {
            Flex::Scalar(_) => (1, 1),
            Flex::PerRow(v) => (v.len(), 1),
            Flex::PerCol(v) => (1, v.len()),
            Flex::Full(m) => m.shape(),
        };
        Err(SignalError::ShapeMismatch {
            what,
            expected: shape,
            actual,
        })
    }
}

impl From<f64> for Flex<f64> {
    fn from(v: f64) -> Self {
        Flex::Scalar(v)
    }
}

impl From<bool> for Flex<bool> {
    fn from(v: bool) -> Self {
        Flex::Scalar(v)
    }
}

impl From<usize> for Flex<usize> {
    fn from(v: usize) -> Self {
        Flex::Scalar(v)
    }
}

impl<T> From<Matrix<T>> for Flex<T> {
    fn from(m: Matrix<T>) -> Self {
        Flex::Full(m)
    }
}
