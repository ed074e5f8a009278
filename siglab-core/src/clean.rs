//! Entry/exit cleaning.

use tracing::debug;

use crate::error::SignalError;
use crate::matrix::{EventMatrix, Matrix};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    /// Nothing accepted yet.
    Fresh,
    Open,
    Closed,
}

/// Keep the first entry of each run and the first exit after it.
///
/// A row holding both an entry and an exit is ambiguous and dropped. With
/// `entry_first`, exits before the first entry are dropped; otherwise a
/// leading exit is accepted. The result alternates strictly per column.
pub fn clean_enex(
    entries: &EventMatrix,
    exits: &EventMatrix,
    entry_first: bool,
) -> Result<(EventMatrix, EventMatrix), SignalError> {
    exits.check_shape("exits", entries.shape())?;
    debug!(
        rows = entries.rows(),
        cols = entries.cols(),
        entry_first,
        "clean_enex"
    );
    let mut entries_out = Matrix::filled(entries.shape(), false);
    let mut exits_out = Matrix::filled(entries.shape(), false);
    for (col, (en, ex)) in entries_out
        .columns_mut()
        .zip(exits_out.columns_mut())
        .enumerate()
    {
        clean_enex_column(entries.column(col), exits.column(col), en, ex, entry_first);
    }
    Ok((entries_out, exits_out))
}

/// Single-column form of [`clean_enex`].
pub fn clean_enex_column(
    entries: &[bool],
    exits: &[bool],
    entries_out: &mut [bool],
    exits_out: &mut [bool],
    entry_first: bool,
) {
    let mut position = Position::Fresh;
    for (row, (&entry, &exit)) in entries.iter().zip(exits).enumerate() {
        match (entry, exit, position) {
            (true, true, _) => {}
            (true, false, Position::Fresh | Position::Closed) => {
                entries_out[row] = true;
                position = Position::Open;
            }
            (false, true, Position::Open) => {
                exits_out[row] = true;
                position = Position::Closed;
            }
            (false, true, Position::Fresh) if !entry_first => {
                exits_out[row] = true;
                position = Position::Closed;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(entries: &[bool], exits: &[bool], entry_first: bool) -> (Vec<usize>, Vec<usize>) {
        let (en, ex) = clean_enex(
            &Matrix::from_column(entries.to_vec()),
            &Matrix::from_column(exits.to_vec()),
            entry_first,
        )
        .unwrap();
        (en.true_rows(0), ex.true_rows(0))
    }

    #[test]
    fn keeps_first_of_each_run() {
        let (en, ex) = run(
            &[true, true, false, false, true, false],
            &[false, false, true, true, false, true],
            true,
        );
        assert_eq!(en, vec![0, 4]);
        assert_eq!(ex, vec![2, 5]);
    }

    #[test]
    fn simultaneous_signals_are_dropped() {
        let (en, ex) = run(&[true, false, true], &[true, false, true], true);
        assert!(en.is_empty());
        assert!(ex.is_empty());
    }

    #[test]
    fn leading_exit_depends_on_entry_first() {
        let entries = [false, true, false];
        let exits = [true, false, true];
        assert_eq!(run(&entries, &exits, true), (vec![1], vec![2]));
        assert_eq!(run(&entries, &exits, false), (vec![1], vec![0, 2]));
    }

    #[test]
    fn mismatched_shapes_are_rejected() {
        let err = clean_enex(
            &Matrix::filled((3, 1), false),
            &Matrix::filled((4, 1), false),
            true,
        )
        .unwrap_err();
        assert!(matches!(err, SignalError::ShapeMismatch { what: "exits", .. }));
    }
}
