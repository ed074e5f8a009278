//! Column-parallel drivers.
//!
//! Columns never depend on each other, so each rayon worker takes ownership
//! of one column slice of every output matrix and runs the single-column
//! driver from `siglab-core` on it. Choice functions are built per column
//! from a factory; seeded random choices derive their generator from
//! `(seed, stream, column)`, so results match the sequential drivers exactly.

use rayon::prelude::*;

use siglab_core::choice::ChoiceFunc;
use siglab_core::generate::{generate_column, generate_enex_column, generate_ex_column};
use siglab_core::random::{check_rand_enex, generate_rand_enex_column};
use siglab_core::rng::{ColumnRng, ENEX_STREAM};
use siglab_core::stops::{
    check_ohlc_inputs, generate_ohlc_stop_enex_column, generate_ohlc_stop_ex_column,
    OhlcPrices, OhlcStopParams, OhlcStopSignals,
};
use siglab_core::{EnexOptions, EventMatrix, ExitOptions, Flex, Matrix, SignalError};

/// Run `f` on a dedicated pool of `threads` workers, or on the global pool.
pub fn with_pool<R, F>(threads: Option<usize>, f: F) -> Result<R, rayon::ThreadPoolBuildError>
where
    R: Send,
    F: FnOnce() -> R + Send,
{
    match threads {
        Some(n) => {
            let pool = rayon::ThreadPoolBuilder::new().num_threads(n).build()?;
            Ok(pool.install(f))
        }
        None => Ok(f()),
    }
}

// chunks_mut panics on zero; a zero-row matrix has no storage anyway
fn chunk_len(rows: usize) -> usize {
    rows.max(1)
}

/// Parallel form of [`siglab_core::generate::generate`].
pub fn par_generate<C, F>(
    shape: (usize, usize),
    pick_first: bool,
    make_choice: F,
) -> Result<EventMatrix, SignalError>
where
    C: ChoiceFunc,
    F: Fn() -> C + Sync,
{
    let mut out = Matrix::filled(shape, false);
    out.as_mut_slice()
        .par_chunks_mut(chunk_len(shape.0))
        .enumerate()
        .try_for_each(|(col, column)| {
            generate_column(column, col, pick_first, &mut make_choice())
        })?;
    Ok(out)
}

/// Parallel form of [`siglab_core::generate::generate_ex`].
pub fn par_generate_ex<C, F>(
    entries: &EventMatrix,
    opts: ExitOptions,
    make_choice: F,
) -> Result<EventMatrix, SignalError>
where
    C: ChoiceFunc,
    F: Fn() -> C + Sync,
{
    let mut exits = Matrix::filled(entries.shape(), false);
    exits
        .as_mut_slice()
        .par_chunks_mut(chunk_len(entries.rows()))
        .enumerate()
        .try_for_each(|(col, column)| {
            generate_ex_column(entries.column(col), column, col, opts, &mut make_choice())
        })?;
    Ok(exits)
}

/// Parallel form of [`siglab_core::generate::generate_enex`].
pub fn par_generate_enex<E, X, FE, FX>(
    shape: (usize, usize),
    opts: EnexOptions,
    make_entry_choice: FE,
    make_exit_choice: FX,
) -> Result<(EventMatrix, EventMatrix), SignalError>
where
    E: ChoiceFunc,
    X: ChoiceFunc,
    FE: Fn() -> E + Sync,
    FX: Fn() -> X + Sync,
{
    opts.validate()?;
    let mut entries = Matrix::filled(shape, false);
    let mut exits = Matrix::filled(shape, false);
    let chunk = chunk_len(shape.0);
    entries
        .as_mut_slice()
        .par_chunks_mut(chunk)
        .zip(exits.as_mut_slice().par_chunks_mut(chunk))
        .enumerate()
        .try_for_each(|(col, (en, ex))| {
            generate_enex_column(
                en,
                ex,
                col,
                opts,
                &mut make_entry_choice(),
                &mut make_exit_choice(),
            )
        })?;
    Ok((entries, exits))
}

/// Parallel form of [`siglab_core::random::generate_rand_enex`].
pub fn par_rand_enex(
    shape: (usize, usize),
    n: &Flex<usize>,
    entry_wait: usize,
    exit_wait: usize,
    seed: Option<u64>,
) -> Result<(EventMatrix, EventMatrix), SignalError> {
    let (rows, cols) = shape;
    n.check_shape("n", shape)?;
    for col in 0..cols {
        check_rand_enex(rows, n.select(0, col), col, entry_wait, exit_wait)?;
    }
    let mut entries = Matrix::filled(shape, false);
    let mut exits = Matrix::filled(shape, false);
    let chunk = chunk_len(rows);
    entries
        .as_mut_slice()
        .par_chunks_mut(chunk)
        .zip(exits.as_mut_slice().par_chunks_mut(chunk))
        .enumerate()
        .for_each(|(col, (en, ex))| {
            let mut rng = ColumnRng::new(seed, ENEX_STREAM);
            let count = n.select(0, col);
            generate_rand_enex_column(en, ex, count, entry_wait, exit_wait, rng.for_column(col));
        });
    Ok((entries, exits))
}

/// Parallel form of [`siglab_core::stops::generate_ohlc_stop_ex`].
pub fn par_ohlc_stop_ex(
    entries: &EventMatrix,
    prices: &OhlcPrices,
    params: &OhlcStopParams,
    opts: ExitOptions,
) -> Result<OhlcStopSignals, SignalError> {
    check_ohlc_inputs(entries.shape(), prices, params)?;
    let chunk = chunk_len(entries.rows());
    let mut out = OhlcStopSignals::empty(entries.clone());
    out.exits
        .as_mut_slice()
        .par_chunks_mut(chunk)
        .zip(out.stop_price.as_mut_slice().par_chunks_mut(chunk))
        .zip(out.stop_type.as_mut_slice().par_chunks_mut(chunk))
        .enumerate()
        .try_for_each(|(col, ((exits, stop_price), stop_type))| {
            generate_ohlc_stop_ex_column(
                entries.column(col),
                exits,
                stop_price,
                stop_type,
                col,
                prices,
                params,
                opts,
            )
        })?;
    Ok(out)
}

/// Parallel form of [`siglab_core::stops::generate_ohlc_stop_enex`].
pub fn par_ohlc_stop_enex(
    entries: &EventMatrix,
    prices: &OhlcPrices,
    params: &OhlcStopParams,
    opts: EnexOptions,
) -> Result<OhlcStopSignals, SignalError> {
    opts.validate()?;
    check_ohlc_inputs(entries.shape(), prices, params)?;
    let chunk = chunk_len(entries.rows());
    let mut out = OhlcStopSignals::empty(Matrix::filled(entries.shape(), false));
    out.entries
        .as_mut_slice()
        .par_chunks_mut(chunk)
        .zip(out.exits.as_mut_slice().par_chunks_mut(chunk))
        .zip(out.stop_price.as_mut_slice().par_chunks_mut(chunk))
        .zip(out.stop_type.as_mut_slice().par_chunks_mut(chunk))
        .enumerate()
        .try_for_each(|(col, (((en, ex), stop_price), stop_type))| {
            generate_ohlc_stop_enex_column(
                entries, en, ex, stop_price, stop_type, col, prices, params, opts,
            )
        })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use siglab_core::choice::from_fn;

    #[test]
    fn parallel_generate_matches_column_closure() {
        let out = par_generate((6, 4), false, || {
            from_fn(|from, to, col| (from..to).filter(|r| r % (col + 1) == 0).collect())
        })
        .unwrap();
        assert_eq!(out.true_rows(0), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(out.true_rows(2), vec![0, 3]);
    }

    #[test]
    fn errors_from_any_column_surface() {
        let err = par_generate((4, 8), true, || {
            from_fn(|_from, to, col| if col == 5 { vec![to] } else { vec![0] })
        })
        .unwrap_err();
        assert_eq!(
            err,
            SignalError::OutOfBounds {
                col: 5,
                index: 4,
                from_row: 0,
                to_row: 4
            }
        );
    }

    #[test]
    fn zero_rows_are_fine() {
        let out = par_generate((0, 3), true, || from_fn(|_, _, _| Vec::new())).unwrap();
        assert_eq!(out.shape(), (0, 3));
    }

    #[test]
    fn dedicated_pool_runs_closure() {
        let sum = with_pool(Some(2), || (0..100u64).into_par_iter().sum::<u64>()).unwrap();
        assert_eq!(sum, 4950);
    }
}
