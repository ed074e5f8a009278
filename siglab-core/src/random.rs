//! Randomized choice functions and the constrained-spacing sampler.
//!
//! Every random draw goes through a [`ColumnRng`], so a seeded call produces
//! the same events regardless of the order columns are processed in.

use rand::seq::index::sample;
use rand::Rng;
use tracing::{debug, warn};

use crate::choice::ChoiceFunc;
use crate::error::SignalError;
use crate::flex::Flex;
use crate::generate::{generate, generate_enex, generate_ex};
use crate::matrix::{EventMatrix, Matrix};
use crate::options::{EnexOptions, ExitOptions};
use crate::rng::{ColumnRng, ENEX_STREAM, ENTRY_STREAM, EXIT_STREAM};

/// Picks `n` rows of the window uniformly without replacement.
///
/// `n` is read per column at row 0. A window shorter than `n` yields every row.
#[derive(Debug, Clone)]
pub struct RandChoice {
    n: Flex<usize>,
    rng: ColumnRng,
}

impl RandChoice {
    pub fn new(n: Flex<usize>, rng: ColumnRng) -> Self {
        Self { n, rng }
    }
}

impl ChoiceFunc for RandChoice {
    fn choose(
        &mut self,
        from_row: usize,
        to_row: usize,
        col: usize,
        out: &mut Vec<usize>,
    ) -> Result<(), SignalError> {
        let window = to_row.saturating_sub(from_row);
        let size = self.n.select(0, col).min(window);
        if size == 0 {
            return Ok(());
        }
        let rng = self.rng.for_column(col);
        let start = out.len();
        out.extend(sample(rng, window, size).into_iter().map(|i| from_row + i));
        out[start..].sort_unstable();
        Ok(())
    }
}

/// Independent Bernoulli trial per row with a flexible probability.
#[derive(Debug, Clone)]
pub struct RandByProbChoice {
    prob: Flex<f64>,
    pick_first: bool,
    rng: ColumnRng,
}

impl RandByProbChoice {
    pub fn new(prob: Flex<f64>, pick_first: bool, rng: ColumnRng) -> Self {
        Self {
            prob,
            pick_first,
            rng,
        }
    }
}

impl ChoiceFunc for RandByProbChoice {
    fn choose(
        &mut self,
        from_row: usize,
        to_row: usize,
        col: usize,
        out: &mut Vec<usize>,
    ) -> Result<(), SignalError> {
        let rng = self.rng.for_column(col);
        for row in from_row..to_row {
            if rng.gen::<f64>() < self.prob.select(row, col) {
                out.push(row);
                if self.pick_first {
                    break;
                }
            }
        }
        Ok(())
    }
}

/// `n` random entries per column.
pub fn generate_rand(
    shape: (usize, usize),
    n: &Flex<usize>,
    seed: Option<u64>,
) -> Result<EventMatrix, SignalError> {
    n.check_shape("n", shape)?;
    let mut choice = RandChoice::new(n.clone(), ColumnRng::new(seed, ENTRY_STREAM));
    generate(shape, false, &mut choice)
}

/// Entries drawn row by row with probability `prob`.
pub fn generate_rand_by_prob(
    shape: (usize, usize),
    prob: &Flex<f64>,
    pick_first: bool,
    seed: Option<u64>,
) -> Result<EventMatrix, SignalError> {
    prob.check_shape("prob", shape)?;
    let mut choice =
        RandByProbChoice::new(prob.clone(), pick_first, ColumnRng::new(seed, ENTRY_STREAM));
    generate(shape, pick_first, &mut choice)
}

/// One random exit after each entry.
///
/// `opts.pick_first` is ignored; exactly one row is drawn per window.
pub fn generate_rand_ex(
    entries: &EventMatrix,
    opts: ExitOptions,
    seed: Option<u64>,
) -> Result<EventMatrix, SignalError> {
    let opts = ExitOptions {
        pick_first: true,
        ..opts
    };
    let mut choice = RandChoice::new(Flex::Scalar(1), ColumnRng::new(seed, EXIT_STREAM));
    generate_ex(entries, opts, &mut choice)
}

/// Exits drawn with probability `prob` after each entry; the first hit wins.
pub fn generate_rand_ex_by_prob(
    entries: &EventMatrix,
    prob: &Flex<f64>,
    opts: ExitOptions,
    seed: Option<u64>,
) -> Result<EventMatrix, SignalError> {
    prob.check_shape("prob", entries.shape())?;
    let opts = ExitOptions {
        pick_first: true,
        ..opts
    };
    let mut choice = RandByProbChoice::new(prob.clone(), true, ColumnRng::new(seed, EXIT_STREAM));
    generate_ex(entries, opts, &mut choice)
}

/// Alternating entries and exits, each drawn with its own probability.
pub fn generate_rand_enex_by_prob(
    shape: (usize, usize),
    entry_prob: &Flex<f64>,
    exit_prob: &Flex<f64>,
    opts: EnexOptions,
    seed: Option<u64>,
) -> Result<(EventMatrix, EventMatrix), SignalError> {
    entry_prob.check_shape("entry_prob", shape)?;
    exit_prob.check_shape("exit_prob", shape)?;
    let mut entry_choice = RandByProbChoice::new(
        entry_prob.clone(),
        opts.entry_pick_first,
        ColumnRng::new(seed, ENTRY_STREAM),
    );
    let mut exit_choice = RandByProbChoice::new(
        exit_prob.clone(),
        opts.exit_pick_first,
        ColumnRng::new(seed, EXIT_STREAM),
    );
    generate_enex(shape, opts, &mut entry_choice, &mut exit_choice)
}

// ── Constrained-spacing sampler ─────────────────────────────────────

/// `n` random non-negative weights summing to one (uniform on the simplex).
pub fn uniform_summing_to_one<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<f64> {
    let mut cuts = Vec::with_capacity(n + 1);
    cuts.push(0.0);
    cuts.push(1.0);
    cuts.extend((1..n).map(|_| rng.gen::<f64>()));
    cuts.sort_by(f64::total_cmp);
    cuts.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Map weights onto integers in `range` that sum exactly to `total`.
///
/// Each weight becomes `floor(w * (hi - lo) + lo)`; the units lost to
/// flooring are handed out one at a time to randomly picked slots.
pub fn rescale_float_to_int<R: Rng + ?Sized>(
    floats: &[f64],
    range: (usize, usize),
    total: usize,
    rng: &mut R,
) -> Vec<usize> {
    let (lo, hi) = range;
    let span = hi.saturating_sub(lo) as f64;
    let mut ints: Vec<usize> = floats
        .iter()
        .map(|&f| (f * span + lo as f64).floor() as usize)
        .collect();
    if ints.is_empty() {
        return ints;
    }
    let leftover = total.saturating_sub(ints.iter().sum());
    for _ in 0..leftover {
        let slot = rng.gen_range(0..ints.len());
        ints[slot] += 1;
    }
    ints
}

/// Check that `n` entry/exit pairs fit into `rows` for column `col`.
pub fn check_rand_enex(
    rows: usize,
    n: usize,
    col: usize,
    entry_wait: usize,
    exit_wait: usize,
) -> Result<(), SignalError> {
    if entry_wait == 0 && exit_wait == 0 {
        return Err(SignalError::ZeroWait);
    }
    let entry_wait = sampler_entry_wait(entry_wait);
    if n == 0 || (entry_wait == 1 && exit_wait == 1) {
        return Ok(());
    }
    let needed = if n == 1 {
        exit_wait + 1
    } else {
        (entry_wait + exit_wait) * (n - 1) + exit_wait + 1
    };
    if rows < needed {
        warn!(col, n, rows, needed, "not enough rows for random entries");
        return Err(SignalError::PopulationTooSmall { col, n, rows });
    }
    Ok(())
}

// An exit must land strictly before the next entry, so the sampler spaces
// entries at least one row after the previous exit.
fn sampler_entry_wait(entry_wait: usize) -> usize {
    entry_wait.max(1)
}

/// Entry rows for one column, spaced at least `entry_wait + exit_wait` apart.
fn spaced_entries<R: Rng + ?Sized>(
    rows: usize,
    n: usize,
    entry_wait: usize,
    exit_wait: usize,
    rng: &mut R,
) -> Vec<usize> {
    if n == 1 {
        return vec![rng.gen_range(0..rows - exit_wait)];
    }
    let min_range = entry_wait + exit_wait;
    let min_total = min_range * (n - 1);
    let max_free = rows - min_total - 1;
    // Cap the slack outside the minimum span so short spans still spread out.
    let free = max_free.min(3 * rows / (n + 1)).saturating_sub(exit_wait);

    // Six slots: one before the first entry, three widening the span, two
    // after the last entry (which still needs room for its exit).
    let weights = uniform_summing_to_one(6, rng);
    let spaces = rescale_float_to_int(&weights, (0, free), free, rng);
    let first = spaces[0];
    let last = rows - spaces[4] - spaces[5] - exit_wait - 1;

    let total_range = last - first;
    let max_range = total_range - (n - 2) * min_range;
    let weights = uniform_summing_to_one(n - 1, rng);
    let gaps = rescale_float_to_int(&weights, (min_range, max_range), total_range, rng);

    let mut entries = Vec::with_capacity(n);
    entries.push(first);
    let mut row = first;
    for gap in gaps {
        row += gap;
        entries.push(row);
    }
    entries
}

/// Single-column form of [`generate_rand_enex`].
///
/// The caller must have run [`check_rand_enex`] for this column.
pub fn generate_rand_enex_column<R: Rng + ?Sized>(
    entries: &mut [bool],
    exits: &mut [bool],
    n: usize,
    entry_wait: usize,
    exit_wait: usize,
    rng: &mut R,
) {
    let rows = entries.len();
    if n == 0 || rows == 0 {
        return;
    }
    let entry_wait = sampler_entry_wait(entry_wait);

    if entry_wait == 1 && exit_wait == 1 {
        let size = (2 * n).min(rows);
        let mut both = sample(rng, rows, size).into_vec();
        both.sort_unstable();
        for (k, row) in both.into_iter().enumerate() {
            if k % 2 == 0 {
                entries[row] = true;
            } else {
                exits[row] = true;
            }
        }
        return;
    }

    let entry_rows = spaced_entries(rows, n, entry_wait, exit_wait, rng);
    for &row in &entry_rows {
        entries[row] = true;
    }
    for (j, &entry) in entry_rows.iter().enumerate() {
        let lo = entry + exit_wait;
        let hi = match entry_rows.get(j + 1) {
            Some(&next) => next - entry_wait,
            None => rows - 1,
        };
        exits[rng.gen_range(lo..=hi)] = true;
    }
}

/// Place `n` entries and `n` exits per column at random, alternating and
/// respecting both waits, approximately uniformly over legal placements.
///
/// Every column is validated before any row is drawn.
pub fn generate_rand_enex(
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
    debug!(rows, cols, entry_wait, exit_wait, "generate_rand_enex");

    let mut rng = ColumnRng::new(seed, ENEX_STREAM);
    let mut entries = Matrix::filled(shape, false);
    let mut exits = Matrix::filled(shape, false);
    for (col, (en, ex)) in entries
        .columns_mut()
        .zip(exits.columns_mut())
        .enumerate()
    {
        let count = n.select(0, col);
        generate_rand_enex_column(en, ex, count, entry_wait, exit_wait, rng.for_column(col));
    }
    Ok((entries, exits))
}
