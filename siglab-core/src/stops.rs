//! Stop-trigger choice functions.
//!
//! [`StopChoice`] follows a single price series and fires when the price
//! crosses a fixed or trailing percentage stop. [`OhlcStopChoice`] checks a
//! whole OHLC bar against stop-loss (optionally trailing) and take-profit at
//! once and records the hit price and stop kind.
//!
//! Intrabar ordering cannot be recovered from OHLC, so two assumptions hold:
//! a trailing stop only ratchets on prices already seen, and when both
//! stop-loss and take-profit are crossable in one bar, stop-loss wins.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::choice::{ChoiceFunc, FirstChoice};
use crate::error::SignalError;
use crate::flex::Flex;
use crate::generate::{generate_enex_column, generate_ex, generate_ex_column};
use crate::matrix::{EventMatrix, Matrix};
use crate::options::{EnexOptions, ExitOptions};

/// Kind of stop that produced an exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopType {
    StopLoss,
    TrailStop,
    TakeProfit,
}

// ── Single-series stop ──────────────────────────────────────────────

/// Per-call stop state, anchored at `from_row - wait`.
#[derive(Debug, Clone, Copy)]
struct StopState {
    init_price: f64,
    init_stop: f64,
    init_trailing: bool,
    running_min: f64,
    running_max: f64,
}

impl StopState {
    fn stop_price(&self) -> f64 {
        if self.init_stop.is_nan() {
            return f64::NAN;
        }
        if self.init_trailing {
            if self.init_stop >= 0.0 {
                self.running_min * (1.0 + self.init_stop.abs())
            } else {
                self.running_max * (1.0 - self.init_stop.abs())
            }
        } else {
            self.init_price * (1.0 + self.init_stop)
        }
    }

    fn is_hit(&self, price: f64, stop_price: f64) -> bool {
        if self.init_stop.is_nan() {
            return false;
        }
        if self.init_stop >= 0.0 {
            price >= stop_price
        } else {
            price <= stop_price
        }
    }

    fn track(&mut self, price: f64) {
        if !self.init_trailing {
            return;
        }
        if price < self.running_min {
            self.running_min = price;
        } else if price > self.running_max {
            self.running_max = price;
        }
    }
}

/// Fires where a price series crosses a percentage stop.
///
/// A non-negative `stop` waits for the price to rise to `init * (1 + stop)`
/// (trailing: from the lowest price seen). A negative `stop` waits for the
/// price to fall to `init * (1 + stop)` (trailing: from the highest price
/// seen). NaN disables the stop.
#[derive(Debug, Clone, Copy)]
pub struct StopChoice<'a> {
    ts: &'a Flex<f64>,
    stop: &'a Flex<f64>,
    trailing: &'a Flex<bool>,
    wait: usize,
    pick_first: bool,
}

impl<'a> StopChoice<'a> {
    pub fn new(
        ts: &'a Flex<f64>,
        stop: &'a Flex<f64>,
        trailing: &'a Flex<bool>,
        wait: usize,
        pick_first: bool,
    ) -> Self {
        Self {
            ts,
            stop,
            trailing,
            wait,
            pick_first,
        }
    }

    fn init_state(&self, from_row: usize, col: usize) -> StopState {
        let init_row = from_row.saturating_sub(self.wait);
        let init_price = self.ts.select(init_row, col);
        StopState {
            init_price,
            init_stop: self.stop.select(init_row, col),
            init_trailing: self.trailing.select(init_row, col),
            running_min: init_price,
            running_max: init_price,
        }
    }

    /// Stop price in effect at each row of `[from_row, to_row)`, ignoring hits.
    pub fn stop_price_path(&self, from_row: usize, to_row: usize, col: usize) -> Vec<f64> {
        let mut state = self.init_state(from_row, col);
        (from_row..to_row)
            .map(|row| {
                let stop_price = state.stop_price();
                state.track(self.ts.select(row, col));
                stop_price
            })
            .collect()
    }
}

impl ChoiceFunc for StopChoice<'_> {
    fn choose(
        &mut self,
        from_row: usize,
        to_row: usize,
        col: usize,
        out: &mut Vec<usize>,
    ) -> Result<(), SignalError> {
        let mut state = self.init_state(from_row, col);
        for row in from_row..to_row {
            let stop_price = state.stop_price();
            let price = self.ts.select(row, col);
            if state.is_hit(price, stop_price) {
                out.push(row);
                if self.pick_first {
                    return Ok(());
                }
            }
            state.track(price);
        }
        Ok(())
    }
}

/// Exits where `ts` crosses `stop` after each entry.
pub fn generate_stop_ex(
    entries: &EventMatrix,
    ts: &Flex<f64>,
    stop: &Flex<f64>,
    trailing: &Flex<bool>,
    opts: ExitOptions,
) -> Result<EventMatrix, SignalError> {
    let shape = entries.shape();
    ts.check_shape("ts", shape)?;
    stop.check_shape("stop", shape)?;
    trailing.check_shape("trailing", shape)?;
    let mut choice = StopChoice::new(ts, stop, trailing, opts.wait, opts.pick_first);
    generate_ex(entries, opts, &mut choice)
}

/// Entries and stop exits chained one after another.
///
/// Same as [`generate_stop_ex`] with `skip_until_exit`, except that entries
/// falling before the pending exit are removed from the returned entries.
pub fn generate_stop_enex(
    entries: &EventMatrix,
    ts: &Flex<f64>,
    stop: &Flex<f64>,
    trailing: &Flex<bool>,
    entry_wait: usize,
    exit_wait: usize,
    pick_first: bool,
) -> Result<(EventMatrix, EventMatrix), SignalError> {
    let shape = entries.shape();
    ts.check_shape("ts", shape)?;
    stop.check_shape("stop", shape)?;
    trailing.check_shape("trailing", shape)?;
    let opts = EnexOptions {
        entry_wait,
        exit_wait,
        entry_pick_first: true,
        exit_pick_first: pick_first,
    };
    let mut entry_choice = FirstChoice::new(entries);
    let mut exit_choice = StopChoice::new(ts, stop, trailing, exit_wait, pick_first);
    crate::generate::generate_enex(shape, opts, &mut entry_choice, &mut exit_choice)
}

// ── OHLC stop ───────────────────────────────────────────────────────

/// Entry/high/low/close price arrays.
///
/// `open` is the entry price; it need not be the bar open, any price known at
/// or before the bar (such as the previous close) works.
#[derive(Debug, Clone, PartialEq)]
pub struct OhlcPrices {
    pub open: Flex<f64>,
    pub high: Flex<f64>,
    pub low: Flex<f64>,
    pub close: Flex<f64>,
}

impl OhlcPrices {
    pub fn new(open: Flex<f64>, high: Flex<f64>, low: Flex<f64>, close: Flex<f64>) -> Self {
        Self {
            open,
            high,
            low,
            close,
        }
    }

    /// Use `open` for every missing stream.
    pub fn with_defaults(
        open: Flex<f64>,
        high: Option<Flex<f64>>,
        low: Option<Flex<f64>>,
        close: Option<Flex<f64>>,
    ) -> Self {
        Self {
            high: high.unwrap_or_else(|| open.clone()),
            low: low.unwrap_or_else(|| open.clone()),
            close: close.unwrap_or_else(|| open.clone()),
            open,
        }
    }

    fn check_shape(&self, shape: (usize, usize)) -> Result<(), SignalError> {
        self.open.check_shape("open", shape)?;
        self.high.check_shape("high", shape)?;
        self.low.check_shape("low", shape)?;
        self.close.check_shape("close", shape)
    }

    /// Bar at `(row, col)` with missing values filled from open/close.
    fn bar(&self, row: usize, col: usize) -> (f64, f64, f64, f64) {
        let close = self.close.select(row, col);
        let mut open = self.open.select(row, col);
        if open.is_nan() {
            open = close;
        }
        let mut low = self.low.select(row, col);
        if low.is_nan() {
            low = open.min(close);
        }
        let mut high = self.high.select(row, col);
        if high.is_nan() {
            high = open.max(close);
        }
        (open, high, low, close)
    }
}

/// Stop parameters for [`OhlcStopChoice`].
#[derive(Debug, Clone, PartialEq)]
pub struct OhlcStopParams {
    /// Stop-loss as a non-negative fraction; NaN disables.
    pub sl_stop: Flex<f64>,
    /// Whether the stop-loss trails the best price seen.
    pub sl_trail: Flex<bool>,
    /// Take-profit as a non-negative fraction; NaN disables.
    pub tp_stop: Flex<f64>,
    /// Follow prices downwards (short-style) instead of upwards.
    pub reverse: Flex<bool>,
    /// Entry price comes at or before the bar open, so the entry bar's
    /// high and low are usable.
    pub is_open_safe: bool,
}

impl Default for OhlcStopParams {
    fn default() -> Self {
        Self {
            sl_stop: Flex::Scalar(f64::NAN),
            sl_trail: Flex::Scalar(false),
            tp_stop: Flex::Scalar(f64::NAN),
            reverse: Flex::Scalar(false),
            is_open_safe: true,
        }
    }
}

impl OhlcStopParams {
    /// Reject negative stop values anywhere in the inputs.
    pub fn validate(&self) -> Result<(), SignalError> {
        for value in self.sl_stop.values().chain(self.tp_stop.values()) {
            if value < 0.0 {
                return Err(SignalError::NegativeStop { value });
            }
        }
        Ok(())
    }

    fn check_shape(&self, shape: (usize, usize)) -> Result<(), SignalError> {
        self.sl_stop.check_shape("sl_stop", shape)?;
        self.sl_trail.check_shape("sl_trail", shape)?;
        self.tp_stop.check_shape("tp_stop", shape)?;
        self.reverse.check_shape("reverse", shape)
    }
}

/// Fires where an OHLC bar reaches the stop-loss or take-profit price.
///
/// Writes the hit price and [`StopType`] into the current column's output
/// slices; no other column is ever touched.
#[derive(Debug)]
pub struct OhlcStopChoice<'a> {
    prices: &'a OhlcPrices,
    params: &'a OhlcStopParams,
    stop_price_out: &'a mut [f64],
    stop_type_out: &'a mut [Option<StopType>],
    wait: usize,
    pick_first: bool,
}

impl<'a> OhlcStopChoice<'a> {
    /// `stop_price_out` and `stop_type_out` are the slices of the column this
    /// choice will be asked about.
    pub fn new(
        prices: &'a OhlcPrices,
        params: &'a OhlcStopParams,
        stop_price_out: &'a mut [f64],
        stop_type_out: &'a mut [Option<StopType>],
        wait: usize,
        pick_first: bool,
    ) -> Self {
        Self {
            prices,
            params,
            stop_price_out,
            stop_type_out,
            wait,
            pick_first,
        }
    }
}

impl ChoiceFunc for OhlcStopChoice<'_> {
    fn choose(
        &mut self,
        from_row: usize,
        to_row: usize,
        col: usize,
        out: &mut Vec<usize>,
    ) -> Result<(), SignalError> {
        let p = self.params;
        let init_row = from_row.saturating_sub(self.wait);
        let init_open = self.prices.open.select(init_row, col);
        let sl_stop = p.sl_stop.select(init_row, col);
        let tp_stop = p.tp_stop.select(init_row, col);
        for value in [sl_stop, tp_stop] {
            if value < 0.0 {
                return Err(SignalError::NegativeStop { value });
            }
        }
        let sl_trail = p.sl_trail.select(init_row, col);
        let reverse = p.reverse.select(init_row, col);
        let mut max_p = init_open;
        let mut min_p = init_open;

        for row in from_row..to_row {
            let (_, high, low, close) = self.prices.bar(row, col);

            let sl_price = match (sl_trail, reverse) {
                (true, true) => min_p * (1.0 + sl_stop),
                (true, false) => max_p * (1.0 - sl_stop),
                (false, true) => init_open * (1.0 + sl_stop),
                (false, false) => init_open * (1.0 - sl_stop),
            };
            let tp_price = if reverse {
                init_open * (1.0 - tp_stop)
            } else {
                init_open * (1.0 + tp_stop)
            };

            // Before the entry price is known to precede the bar, only the
            // close of the entry bar is usable.
            let (curr_high, curr_low) = if row > init_row || p.is_open_safe {
                (high, low)
            } else {
                (close, close)
            };

            let mut hit = None;
            if !sl_stop.is_nan()
                && ((!reverse && curr_low <= sl_price) || (reverse && curr_high >= sl_price))
            {
                let kind = if sl_trail {
                    StopType::TrailStop
                } else {
                    StopType::StopLoss
                };
                hit = Some((sl_price, kind));
            }
            if hit.is_none()
                && !tp_stop.is_nan()
                && ((!reverse && curr_high >= tp_price) || (reverse && curr_low <= tp_price))
            {
                hit = Some((tp_price, StopType::TakeProfit));
            }
            if let Some((price, kind)) = hit {
                self.stop_price_out[row] = price;
                self.stop_type_out[row] = Some(kind);
                out.push(row);
                if self.pick_first {
                    return Ok(());
                }
            }

            if sl_trail {
                if curr_low < min_p {
                    min_p = curr_low;
                }
                if curr_high > max_p {
                    max_p = curr_high;
                }
            }
        }
        Ok(())
    }
}

/// Output of the OHLC stop generators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OhlcStopSignals {
    /// Entries actually used; equal to the input for the non-chained variant.
    pub entries: EventMatrix,
    pub exits: EventMatrix,
    /// Hit price per exit, NaN elsewhere.
    pub stop_price: Matrix<f64>,
    /// Stop kind per exit, `None` elsewhere.
    pub stop_type: Matrix<Option<StopType>>,
}

impl OhlcStopSignals {
    /// No exits yet: stop prices NaN, stop types `None`.
    pub fn empty(entries: EventMatrix) -> Self {
        let shape = entries.shape();
        Self {
            exits: Matrix::filled(shape, false),
            stop_price: Matrix::filled(shape, f64::NAN),
            stop_type: Matrix::filled(shape, None),
            entries,
        }
    }
}

/// Shape and sign checks shared by the OHLC stop generators.
pub fn check_ohlc_inputs(
    shape: (usize, usize),
    prices: &OhlcPrices,
    params: &OhlcStopParams,
) -> Result<(), SignalError> {
    prices.check_shape(shape)?;
    params.check_shape(shape)?;
    params.validate()
}

/// Single-column form of [`generate_ohlc_stop_ex`], writing into caller slices.
#[allow(clippy::too_many_arguments)]
pub fn generate_ohlc_stop_ex_column(
    entries: &[bool],
    exits: &mut [bool],
    stop_price_out: &mut [f64],
    stop_type_out: &mut [Option<StopType>],
    col: usize,
    prices: &OhlcPrices,
    params: &OhlcStopParams,
    opts: ExitOptions,
) -> Result<(), SignalError> {
    let mut choice = OhlcStopChoice::new(
        prices,
        params,
        stop_price_out,
        stop_type_out,
        opts.wait,
        opts.pick_first,
    );
    generate_ex_column(entries, exits, col, opts, &mut choice)
}

/// Stop-loss / take-profit exits after each entry, evaluated on OHLC bars.
pub fn generate_ohlc_stop_ex(
    entries: &EventMatrix,
    prices: &OhlcPrices,
    params: &OhlcStopParams,
    opts: ExitOptions,
) -> Result<OhlcStopSignals, SignalError> {
    let shape = entries.shape();
    check_ohlc_inputs(shape, prices, params)?;
    debug!(rows = shape.0, cols = shape.1, ?opts, "generate_ohlc_stop_ex");

    let mut out = OhlcStopSignals::empty(entries.clone());
    let columns = out
        .exits
        .columns_mut()
        .zip(out.stop_price.columns_mut())
        .zip(out.stop_type.columns_mut());
    for (col, ((exits, stop_price), stop_type)) in columns.enumerate() {
        generate_ohlc_stop_ex_column(
            entries.column(col),
            exits,
            stop_price,
            stop_type,
            col,
            prices,
            params,
            opts,
        )?;
    }
    Ok(out)
}

/// Single-column form of [`generate_ohlc_stop_enex`].
#[allow(clippy::too_many_arguments)]
pub fn generate_ohlc_stop_enex_column(
    entries_in: &EventMatrix,
    entries: &mut [bool],
    exits: &mut [bool],
    stop_price_out: &mut [f64],
    stop_type_out: &mut [Option<StopType>],
    col: usize,
    prices: &OhlcPrices,
    params: &OhlcStopParams,
    opts: EnexOptions,
) -> Result<(), SignalError> {
    let mut entry_choice = FirstChoice::new(entries_in);
    let mut exit_choice = OhlcStopChoice::new(
        prices,
        params,
        stop_price_out,
        stop_type_out,
        opts.exit_wait,
        opts.exit_pick_first,
    );
    generate_enex_column(entries, exits, col, opts, &mut entry_choice, &mut exit_choice)
}

/// Entries and OHLC stop exits chained one after another.
///
/// Entries that fall before the pending exit are dropped from the result.
pub fn generate_ohlc_stop_enex(
    entries: &EventMatrix,
    prices: &OhlcPrices,
    params: &OhlcStopParams,
    entry_wait: usize,
    exit_wait: usize,
    pick_first: bool,
) -> Result<OhlcStopSignals, SignalError> {
    let shape = entries.shape();
    let opts = EnexOptions {
        entry_wait,
        exit_wait,
        entry_pick_first: true,
        exit_pick_first: pick_first,
    };
    opts.validate()?;
    check_ohlc_inputs(shape, prices, params)?;
    debug!(rows = shape.0, cols = shape.1, ?opts, "generate_ohlc_stop_enex");

    let mut out = OhlcStopSignals::empty(Matrix::filled(shape, false));
    let columns = out
        .entries
        .columns_mut()
        .zip(out.exits.columns_mut())
        .zip(out.stop_price.columns_mut())
        .zip(out.stop_type.columns_mut());
    for (col, (((en, ex), stop_price), stop_type)) in columns.enumerate() {
        generate_ohlc_stop_enex_column(
            entries, en, ex, stop_price, stop_type, col, prices, params, opts,
        )?;
    }
    Ok(out)
}
