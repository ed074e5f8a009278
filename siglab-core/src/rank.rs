//! Signal ranking.
//!
//! A partition is a run of consecutive `true` cells. The driver walks each
//! column once, tracks partition boundaries and the latest reset row, and
//! asks a [`RankFunc`] for the rank of every `true` cell it visits.

use tracing::debug;

use crate::error::SignalError;
use crate::matrix::{EventMatrix, Matrix};

/// Position of a `true` cell relative to partitions and resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankContext {
    pub row: usize,
    pub col: usize,
    /// Latest reset row at or before `row` (0 before any reset).
    pub reset_row: usize,
    /// Last row of the previous partition, if one has ended.
    pub prev_part_end: Option<usize>,
    /// First row of the current partition.
    pub part_start: usize,
}

impl RankContext {
    /// True where a reset opens a fresh count: the reset came after the
    /// previous partition and this is the first cell at or after it.
    pub fn is_reset(&self) -> bool {
        self.prev_part_end.map_or(true, |end| self.reset_row > end)
            && self.reset_row.max(self.part_start) == self.row
    }
}

/// Ranking strategy called once per ranked cell.
pub trait RankFunc {
    /// Called before the first cell of each column.
    fn begin_column(&mut self, _col: usize) {}

    /// Rank of the cell, or `-1` for no rank.
    fn rank(&mut self, ctx: &RankContext) -> i64;
}

/// Position of each signal within its partition.
///
/// With `allow_gaps`, counting continues across partitions until a reset.
#[derive(Debug, Clone, Copy)]
pub struct SigPosRank {
    allow_gaps: bool,
    pos: i64,
}

impl SigPosRank {
    pub fn new(allow_gaps: bool) -> Self {
        Self { allow_gaps, pos: -1 }
    }
}

impl RankFunc for SigPosRank {
    fn begin_column(&mut self, _col: usize) {
        self.pos = -1;
    }

    fn rank(&mut self, ctx: &RankContext) -> i64 {
        if ctx.is_reset() || (!self.allow_gaps && ctx.part_start == ctx.row) {
            self.pos = -1;
        }
        self.pos += 1;
        self.pos
    }
}

/// Index of each signal's partition within the column.
#[derive(Debug, Clone, Copy, Default)]
pub struct PartPosRank {
    pos: i64,
}

impl RankFunc for PartPosRank {
    fn begin_column(&mut self, _col: usize) {
        self.pos = 0;
    }

    fn rank(&mut self, ctx: &RankContext) -> i64 {
        if ctx.is_reset() {
            self.pos = 0;
        } else if ctx.part_start == ctx.row {
            self.pos += 1;
        }
        self.pos
    }
}

/// Rank every `true` cell of `mask` with `rank_fn`; all other cells get `-1`.
///
/// With `after_false`, a partition touching the first row is skipped since no
/// `false` precedes it.
pub fn rank<F: RankFunc>(
    mask: &EventMatrix,
    reset_by: Option<&EventMatrix>,
    after_false: bool,
    rank_fn: &mut F,
) -> Result<Matrix<i64>, SignalError> {
    if let Some(reset_by) = reset_by {
        reset_by.check_shape("reset_by", mask.shape())?;
    }
    debug!(
        rows = mask.rows(),
        cols = mask.cols(),
        after_false,
        "rank"
    );
    let mut out = Matrix::filled(mask.shape(), -1);
    for (col, column) in out.columns_mut().enumerate() {
        rank_column(
            mask.column(col),
            reset_by.map(|r| r.column(col)),
            column,
            col,
            after_false,
            rank_fn,
        );
    }
    Ok(out)
}

/// Single-column form of [`rank`].
pub fn rank_column<F: RankFunc>(
    mask: &[bool],
    reset_by: Option<&[bool]>,
    out: &mut [i64],
    col: usize,
    after_false: bool,
    rank_fn: &mut F,
) {
    rank_fn.begin_column(col);
    let mut reset_row = 0;
    let mut prev_part_end = None;
    let mut part_start = 0;
    let mut in_partition = false;
    let mut false_seen = !after_false;

    for (row, &signal) in mask.iter().enumerate() {
        if reset_by.is_some_and(|r| r[row]) {
            reset_row = row;
        }
        if signal {
            if !false_seen {
                continue;
            }
            if !in_partition {
                part_start = row;
                in_partition = true;
            }
            out[row] = rank_fn.rank(&RankContext {
                row,
                col,
                reset_row,
                prev_part_end,
                part_start,
            });
        } else {
            if in_partition {
                prev_part_end = Some(row - 1);
            }
            in_partition = false;
            false_seen = true;
        }
    }
}

/// Position of each signal within its partition (or since the last reset).
pub fn pos_rank(
    mask: &EventMatrix,
    reset_by: Option<&EventMatrix>,
    after_false: bool,
    allow_gaps: bool,
) -> Result<Matrix<i64>, SignalError> {
    rank(mask, reset_by, after_false, &mut SigPosRank::new(allow_gaps))
}

/// Partition index of each signal.
pub fn partition_pos_rank(
    mask: &EventMatrix,
    reset_by: Option<&EventMatrix>,
    after_false: bool,
) -> Result<Matrix<i64>, SignalError> {
    rank(mask, reset_by, after_false, &mut PartPosRank::default())
}

/// First signal of each partition (or of each reset period with `allow_gaps`).
pub fn first(
    mask: &EventMatrix,
    reset_by: Option<&EventMatrix>,
    after_false: bool,
    allow_gaps: bool,
) -> Result<EventMatrix, SignalError> {
    let ranks = pos_rank(mask, reset_by, after_false, allow_gaps)?;
    let mut out = Matrix::filled(ranks.shape(), false);
    for (col, column) in out.columns_mut().enumerate() {
        for (cell, &r) in column.iter_mut().zip(ranks.column(col)) {
            *cell = r == 0;
        }
    }
    Ok(out)
}
