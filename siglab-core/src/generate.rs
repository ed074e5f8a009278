//! Core generation drivers.
//!
//! All three drivers share one model: for each column, repeatedly ask a
//! choice function for the next batch of rows inside a bounded window and
//! stop when it returns nothing. Columns never depend on each other, so every
//! driver is also exposed as a `*_column` function over one column slice.

use tracing::debug;

use crate::choice::{check_window, ChoiceFunc};
use crate::error::SignalError;
use crate::matrix::{true_rows, EventMatrix, Matrix};
use crate::options::{EnexOptions, ExitOptions};

// ── Entries only ────────────────────────────────────────────────────

/// Build a `shape` event matrix by calling `choice` once per column over `[0, rows)`.
pub fn generate<C: ChoiceFunc>(
    shape: (usize, usize),
    pick_first: bool,
    choice: &mut C,
) -> Result<EventMatrix, SignalError> {
    debug!(rows = shape.0, cols = shape.1, pick_first, "generate");
    let mut out = Matrix::filled(shape, false);
    for (col, column) in out.columns_mut().enumerate() {
        generate_column(column, col, pick_first, choice)?;
    }
    Ok(out)
}

/// Single-column form of [`generate`].
pub fn generate_column<C: ChoiceFunc>(
    out: &mut [bool],
    col: usize,
    pick_first: bool,
    choice: &mut C,
) -> Result<(), SignalError> {
    let rows = out.len();
    let mut idxs = Vec::new();
    choice.choose(0, rows, col, &mut idxs)?;
    if idxs.is_empty() {
        return Ok(());
    }
    check_window(&idxs, 0, rows, col, pick_first)?;
    if pick_first {
        out[idxs[0]] = true;
    } else {
        for &i in &idxs {
            out[i] = true;
        }
    }
    Ok(())
}

// ── Exits after entries ─────────────────────────────────────────────

/// Place exits after each entry using `choice`.
///
/// Each entry opens the window `[entry + wait, end)`, where `end` is the
/// next entry's row with `until_next`, otherwise the column end.
pub fn generate_ex<C: ChoiceFunc>(
    entries: &EventMatrix,
    opts: ExitOptions,
    choice: &mut C,
) -> Result<EventMatrix, SignalError> {
    debug!(
        rows = entries.rows(),
        cols = entries.cols(),
        ?opts,
        "generate_ex"
    );
    let mut exits = Matrix::filled(entries.shape(), false);
    for (col, column) in exits.columns_mut().enumerate() {
        generate_ex_column(entries.column(col), column, col, opts, choice)?;
    }
    Ok(exits)
}

/// Single-column form of [`generate_ex`].
pub fn generate_ex_column<C: ChoiceFunc>(
    entries: &[bool],
    exits: &mut [bool],
    col: usize,
    opts: ExitOptions,
    choice: &mut C,
) -> Result<(), SignalError> {
    let rows = entries.len();
    let entry_rows = true_rows(entries);
    let mut last_exit: Option<usize> = None;
    let mut idxs = Vec::new();

    for (k, &entry) in entry_rows.iter().enumerate() {
        if opts.skip_until_exit && last_exit.is_some_and(|e| entry <= e) {
            continue;
        }
        let from_row = entry + opts.wait;
        let to_row = match entry_rows.get(k + 1) {
            Some(&next) if opts.until_next => next,
            _ => rows,
        };
        if to_row <= from_row {
            continue;
        }

        idxs.clear();
        choice.choose(from_row, to_row, col, &mut idxs)?;
        let Some(&last) = idxs.last() else {
            continue;
        };
        check_window(&idxs, from_row, to_row, col, opts.pick_first)?;
        if opts.pick_first {
            exits[idxs[0]] = true;
            last_exit = Some(idxs[0]);
        } else {
            for &i in &idxs {
                exits[i] = true;
            }
            last_exit = Some(last);
        }
    }
    Ok(())
}

// ── Alternating entries and exits ───────────────────────────────────

/// Generate entries and exits one after another.
///
/// Entry windows start `entry_wait` rows after the previous exit, exit windows
/// `exit_wait` rows after the previous entry. A column stops as soon as a
/// window is empty or a phase returns nothing.
pub fn generate_enex<E: ChoiceFunc, X: ChoiceFunc>(
    shape: (usize, usize),
    opts: EnexOptions,
    entry_choice: &mut E,
    exit_choice: &mut X,
) -> Result<(EventMatrix, EventMatrix), SignalError> {
    opts.validate()?;
    debug!(rows = shape.0, cols = shape.1, ?opts, "generate_enex");
    let mut entries = Matrix::filled(shape, false);
    let mut exits = Matrix::filled(shape, false);
    for (col, (en, ex)) in entries
        .columns_mut()
        .zip(exits.columns_mut())
        .enumerate()
    {
        generate_enex_column(en, ex, col, opts, entry_choice, exit_choice)?;
    }
    Ok((entries, exits))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Entry,
    Exit,
}

/// Single-column form of [`generate_enex`].
pub fn generate_enex_column<E: ChoiceFunc, X: ChoiceFunc>(
    entries: &mut [bool],
    exits: &mut [bool],
    col: usize,
    opts: EnexOptions,
    entry_choice: &mut E,
    exit_choice: &mut X,
) -> Result<(), SignalError> {
    opts.validate()?;
    let to_row = entries.len();
    let mut prev_prev: Option<usize> = None;
    let mut prev: Option<usize> = None;
    let mut phase = Phase::Entry;
    let mut idxs = Vec::new();

    loop {
        idxs.clear();
        let (from_row, pick_first) = match phase {
            Phase::Entry => (
                prev.map_or(0, |p| p + opts.entry_wait),
                opts.entry_pick_first,
            ),
            Phase::Exit => (
                prev.map_or(0, |p| p + opts.exit_wait),
                opts.exit_pick_first,
            ),
        };
        if from_row >= to_row {
            break;
        }
        match phase {
            Phase::Entry => entry_choice.choose(from_row, to_row, col, &mut idxs)?,
            Phase::Exit => exit_choice.choose(from_row, to_row, col, &mut idxs)?,
        }
        let Some(&first) = idxs.first() else {
            break;
        };
        if prev == Some(first) && prev_prev == Some(first) {
            tracing::warn!(col, index = first, "same anchor chosen three times");
            return Err(SignalError::InfiniteLoop { col, index: first });
        }
        check_window(&idxs, from_row, to_row, col, pick_first)?;

        let target: &mut [bool] = match phase {
            Phase::Entry => &mut *entries,
            Phase::Exit => &mut *exits,
        };
        let anchor = if pick_first {
            target[first] = true;
            first
        } else {
            for &i in &idxs {
                target[i] = true;
            }
            idxs[idxs.len() - 1]
        };
        prev_prev = prev;
        prev = Some(anchor);
        phase = match phase {
            Phase::Entry => Phase::Exit,
            Phase::Exit => Phase::Entry,
        };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::choice::from_fn;

    fn col(m: &EventMatrix, c: usize) -> Vec<bool> {
        m.column(c).to_vec()
    }

    #[test]
    fn generate_places_diagonal() {
        let mut choice = from_fn(|from, _to, col| vec![from + col]);
        let out = generate((5, 3), false, &mut choice).unwrap();
        assert_eq!(out.true_rows(0), vec![0]);
        assert_eq!(out.true_rows(1), vec![1]);
        assert_eq!(out.true_rows(2), vec![2]);
    }

    #[test]
    fn generate_pick_first_keeps_one() {
        let mut choice = from_fn(|from, to, _| (from..to).collect());
        let out = generate((4, 1), true, &mut choice).unwrap();
        assert_eq!(col(&out, 0), vec![true, false, false, false]);
    }

    #[test]
    fn generate_rejects_out_of_range() {
        let mut choice = from_fn(|_, to, _| vec![to]);
        let err = generate((4, 2), false, &mut choice).unwrap_err();
        assert!(err.is_contract_violation());
    }

    #[test]
    fn generate_ex_waits_and_stops_at_next_entry() {
        let entries = Matrix::from_column(vec![true, false, false, true, false, false]);
        let mut windows = Vec::new();
        let mut choice = from_fn(|from, to, _| {
            windows.push((from, to));
            vec![from]
        });
        let exits = generate_ex(&entries, ExitOptions::default(), &mut choice).unwrap();
        assert_eq!(windows, vec![(1, 3), (4, 6)]);
        assert_eq!(exits.true_rows(0), vec![1, 4]);
    }

    #[test]
    fn generate_ex_zero_wait_allows_same_row() {
        let entries = Matrix::from_column(vec![false, true, false]);
        let opts = ExitOptions {
            wait: 0,
            ..ExitOptions::default()
        };
        let mut choice = from_fn(|from, _, _| vec![from]);
        let exits = generate_ex(&entries, opts, &mut choice).unwrap();
        assert_eq!(exits.true_rows(0), vec![1]);
    }

    #[test]
    fn generate_ex_skip_until_exit() {
        let entries = Matrix::from_column(vec![true, true, false, true, false, false]);
        let opts = ExitOptions {
            until_next: false,
            skip_until_exit: true,
            ..ExitOptions::default()
        };
        let mut windows = Vec::new();
        let mut choice = from_fn(|from, to, _| {
            windows.push((from, to));
            vec![2]
        });
        // first entry's window returns row 2; the entry at row 1 is skipped,
        // the entry at row 3 then returns 2 which is outside [4, 6)
        let err = generate_ex(&entries, opts, &mut choice).unwrap_err();
        assert_eq!(windows, vec![(1, 6), (4, 6)]);
        assert!(matches!(err, SignalError::OutOfBounds { index: 2, .. }));
    }

    #[test]
    fn generate_ex_empty_window_is_silent() {
        let entries = Matrix::from_column(vec![true, true, false]);
        let mut calls = 0;
        let mut choice = from_fn(|_, _, _| {
            calls += 1;
            Vec::new()
        });
        let exits = generate_ex(&entries, ExitOptions::default(), &mut choice).unwrap();
        // first entry's window [1, 1) is empty, second gets [2, 3)
        assert_eq!(calls, 1);
        assert!(exits.true_rows(0).is_empty());
    }

    #[test]
    fn generate_enex_alternates() {
        let mut entry = from_fn(|from, _, _| vec![from]);
        let mut exit = from_fn(|from, _, _| vec![from]);
        let (en, ex) =
            generate_enex((6, 1), EnexOptions::default(), &mut entry, &mut exit).unwrap();
        assert_eq!(en.true_rows(0), vec![0, 2, 4]);
        assert_eq!(ex.true_rows(0), vec![1, 3, 5]);
    }

    #[test]
    fn generate_enex_rejects_zero_waits() {
        let opts = EnexOptions {
            entry_wait: 0,
            exit_wait: 0,
            ..EnexOptions::default()
        };
        let mut entry = from_fn(|from, _, _| vec![from]);
        let mut exit = from_fn(|from, _, _| vec![from]);
        assert_eq!(
            generate_enex((3, 1), opts, &mut entry, &mut exit),
            Err(SignalError::ZeroWait)
        );
    }

    #[test]
    fn generate_enex_detects_infinite_loop() {
        let opts = EnexOptions {
            entry_wait: 0,
            exit_wait: 1,
            ..EnexOptions::default()
        };
        // exits always land on row 1 and entries may re-use the exit row
        let mut entry = from_fn(|from, _, _| vec![from]);
        let mut exit = from_fn(|_, _, _| vec![1]);
        let err = generate_enex((5, 1), opts, &mut entry, &mut exit).unwrap_err();
        assert!(matches!(err, SignalError::InfiniteLoop { col: 0, .. }));
    }

    #[test]
    fn generate_enex_last_index_anchors_when_not_pick_first() {
        let opts = EnexOptions {
            exit_pick_first: false,
            ..EnexOptions::default()
        };
        let mut entry = from_fn(|from, _, _| vec![from]);
        let mut exit = from_fn(|from, to, _| vec![from, (from + 2).min(to - 1)]);
        let (en, ex) = generate_enex((8, 1), opts, &mut entry, &mut exit).unwrap();
        assert_eq!(en.true_rows(0), vec![0, 4]);
        assert_eq!(ex.true_rows(0), vec![1, 3, 5, 7]);
    }
}
