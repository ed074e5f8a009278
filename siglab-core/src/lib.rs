//! SigLab Core: event matrices, choice functions, generation drivers, stops, sampling, ranking.
//!
//! This crate contains the signal engine:
//! - Column-major event matrices and flexible (broadcast) parameter arrays
//! - Choice-function contract and the three generation drivers
//! - Percentage and OHLC stop-loss / take-profit choice functions
//! - Random choice functions and the constrained-spacing sampler
//! - Entry/exit cleaning, ranking, range extraction, per-column statistics
//! - Deterministic per-column RNG derivation

pub mod choice;
pub mod clean;
pub mod error;
pub mod flex;
pub mod generate;
pub mod index;
pub mod matrix;
pub mod options;
pub mod random;
pub mod rank;
pub mod ranges;
pub mod rng;
pub mod stops;

pub use choice::{from_fn, Choice, ChoiceFunc, FirstChoice};
pub use error::SignalError;
pub use flex::Flex;
pub use matrix::{EventMatrix, Matrix};
pub use options::{EnexOptions, ExitOptions};
pub use ranges::{RangeRecord, RangeStatus};
pub use stops::StopType;

#[cfg(test)]
mod tests {
    use super::*;

    /// Inputs, outputs and owned choice functions are Send + Sync, so columns
    /// can be handed to worker threads.
    #[test]
    fn core_types_are_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<EventMatrix>();
        require_sync::<EventMatrix>();
        require_send::<Matrix<f64>>();
        require_sync::<Matrix<f64>>();
        require_send::<Matrix<Option<StopType>>>();
        require_sync::<Matrix<Option<StopType>>>();
        require_send::<Flex<f64>>();
        require_sync::<Flex<f64>>();
        require_send::<stops::OhlcPrices>();
        require_sync::<stops::OhlcPrices>();
        require_send::<stops::OhlcStopParams>();
        require_sync::<stops::OhlcStopParams>();
        require_send::<RangeRecord>();
        require_sync::<RangeRecord>();
        require_send::<SignalError>();
        require_sync::<SignalError>();

        require_send::<rng::RngHierarchy>();
        require_sync::<rng::RngHierarchy>();
        require_send::<random::RandChoice>();
        require_sync::<random::RandChoice>();
        require_send::<random::RandByProbChoice>();
        require_sync::<random::RandByProbChoice>();
    }

    /// Built-in choice functions only report rows of the window they were given.
    #[test]
    fn choice_functions_stay_inside_window() {
        let mask = Matrix::from_column(vec![true, false, true, true, false, true, true, true]);
        let ts = Flex::PerRow(vec![10.0, 9.0, 12.0, 8.0, 11.0, 7.0, 13.0, 6.0]);
        let stop = Flex::Scalar(-0.05);
        let trailing = Flex::Scalar(true);
        let mut choices = [
            Choice::First(FirstChoice::new(&mask)),
            Choice::Stop(stops::StopChoice::new(&ts, &stop, &trailing, 1, false)),
            Choice::Rand(random::RandChoice::new(
                Flex::Scalar(3),
                rng::ColumnRng::new(Some(9), rng::ENTRY_STREAM),
            )),
            Choice::RandByProb(random::RandByProbChoice::new(
                Flex::Scalar(0.5),
                false,
                rng::ColumnRng::new(Some(9), rng::EXIT_STREAM),
            )),
        ];
        let mut out = Vec::new();
        for choice in &mut choices {
            for (from_row, to_row) in [(1, 8), (2, 5), (3, 4), (6, 6)] {
                out.clear();
                choice.choose(from_row, to_row, 0, &mut out).unwrap();
                assert!(
                    out.iter().all(|&row| (from_row..to_row).contains(&row)),
                    "{choice:?} left [{from_row}, {to_row}): {out:?}"
                );
                assert!(out.windows(2).all(|w| w[0] < w[1]));
            }
        }
    }
}
