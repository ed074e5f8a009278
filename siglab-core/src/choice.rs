//! Choice-function contracts.
//!
//! A choice function is asked for event rows inside a half-open window
//! `[from_row, to_row)` of one column. It appends zero or more ascending rows
//! to `out`; the drivers verify containment and treat any row outside the
//! window as a fatal contract violation.
//!
//! Drivers are generic over [`ChoiceFunc`], so the built-in strategies are
//! dispatched statically inside the per-row loops. [`Choice`] is the closed
//! set of built-in strategies for configuration-driven call sites.

use crate::error::SignalError;
use crate::matrix::Matrix;
use crate::random::{RandByProbChoice, RandChoice};
use crate::stops::{OhlcStopChoice, StopChoice};

/// Strategy returning candidate event rows within a window of one column.
pub trait ChoiceFunc {
    /// Append ascending rows from `[from_row, to_row)` of column `col` to `out`.
    ///
    /// `out` is empty on entry.
    fn choose(
        &mut self,
        from_row: usize,
        to_row: usize,
        col: usize,
        out: &mut Vec<usize>,
    ) -> Result<(), SignalError>;
}

impl<C: ChoiceFunc + ?Sized> ChoiceFunc for &mut C {
    fn choose(
        &mut self,
        from_row: usize,
        to_row: usize,
        col: usize,
        out: &mut Vec<usize>,
    ) -> Result<(), SignalError> {
        (**self).choose(from_row, to_row, col, out)
    }
}

/// Adapter turning a closure `(from_row, to_row, col) -> rows` into a choice function.
#[derive(Debug, Clone)]
pub struct FnChoice<F>(F);

/// Wrap a closure as a [`ChoiceFunc`].
pub fn from_fn<F>(f: F) -> FnChoice<F>
where
    F: FnMut(usize, usize, usize) -> Vec<usize>,
{
    FnChoice(f)
}

impl<F> ChoiceFunc for FnChoice<F>
where
    F: FnMut(usize, usize, usize) -> Vec<usize>,
{
    fn choose(
        &mut self,
        from_row: usize,
        to_row: usize,
        col: usize,
        out: &mut Vec<usize>,
    ) -> Result<(), SignalError> {
        out.extend((self.0)(from_row, to_row, col));
        Ok(())
    }
}

/// Returns the first `true` row of a mask within the window.
#[derive(Debug, Clone, Copy)]
pub struct FirstChoice<'a> {
    mask: &'a Matrix<bool>,
}

impl<'a> FirstChoice<'a> {
    pub fn new(mask: &'a Matrix<bool>) -> Self {
        Self { mask }
    }
}

impl ChoiceFunc for FirstChoice<'_> {
    fn choose(
        &mut self,
        from_row: usize,
        to_row: usize,
        col: usize,
        out: &mut Vec<usize>,
    ) -> Result<(), SignalError> {
        let column = self.mask.column(col);
        if let Some(offset) = column[from_row..to_row].iter().position(|&v| v) {
            out.push(from_row + offset);
        }
        Ok(())
    }
}

/// Closed set of built-in strategies.
#[derive(Debug)]
pub enum Choice<'a> {
    First(FirstChoice<'a>),
    Stop(StopChoice<'a>),
    OhlcStop(OhlcStopChoice<'a>),
    Rand(RandChoice),
    RandByProb(RandByProbChoice),
}

impl ChoiceFunc for Choice<'_> {
    fn choose(
        &mut self,
        from_row: usize,
        to_row: usize,
        col: usize,
        out: &mut Vec<usize>,
    ) -> Result<(), SignalError> {
        match self {
            Choice::First(c) => c.choose(from_row, to_row, col, out),
            Choice::Stop(c) => c.choose(from_row, to_row, col, out),
            Choice::OhlcStop(c) => c.choose(from_row, to_row, col, out),
            Choice::Rand(c) => c.choose(from_row, to_row, col, out),
            Choice::RandByProb(c) => c.choose(from_row, to_row, col, out),
        }
    }
}

/// Verify returned rows lie in `[from_row, to_row)`.
///
/// With `pick_first` only the first row is inspected, since the rest are
/// discarded by the caller.
pub(crate) fn check_window(
    idxs: &[usize],
    from_row: usize,
    to_row: usize,
    col: usize,
    pick_first: bool,
) -> Result<(), SignalError> {
    let checked = if pick_first { &idxs[..idxs.len().min(1)] } else { idxs };
    match checked.iter().find(|&&i| i < from_row || i >= to_row) {
        Some(&index) => {
            tracing::warn!(col, index, from_row, to_row, "choice function left its window");
            Err(SignalError::OutOfBounds {
                col,
                index,
                from_row,
                to_row,
            })
        }
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_choice_finds_first_true_in_window() {
        let mask = Matrix::from_column(vec![true, false, false, true, true]);
        let mut choice = FirstChoice::new(&mask);
        let mut out = Vec::new();
        choice.choose(1, 5, 0, &mut out).unwrap();
        assert_eq!(out, vec![3]);

        out.clear();
        choice.choose(1, 3, 0, &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn closures_are_choice_functions() {
        let mut choice = from_fn(|from, to, _col| (from..to).step_by(2).collect());
        let mut out = Vec::new();
        choice.choose(2, 7, 0, &mut out).unwrap();
        assert_eq!(out, vec![2, 4, 6]);
    }

    #[test]
    fn window_check_rejects_outside_rows() {
        assert!(check_window(&[2, 3], 2, 4, 0, false).is_ok());
        assert!(check_window(&[2, 4], 2, 4, 0, false).is_err());
        // pick_first ignores the tail
        assert!(check_window(&[2, 9], 2, 4, 0, true).is_ok());
        assert!(check_window(&[1], 2, 4, 0, true).is_err());
    }
}
