//! Error taxonomy for the signal engine.
//!
//! Every variant is fatal for the call that raised it: drivers never clamp,
//! drop, or partially return output once one of these surfaces.

use thiserror::Error;

/// Errors raised by generation, stop, and sampling routines.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignalError {
    /// A choice function returned a row outside the window it was given.
    #[error("column {col}: returned index {index} is out of bounds [{from_row}, {to_row})")]
    OutOfBounds {
        col: usize,
        index: usize,
        from_row: usize,
        to_row: usize,
    },

    /// The alternating driver saw the same anchor row three calls in a row.
    #[error("column {col}: infinite loop detected at row {index}")]
    InfiniteLoop { col: usize, index: usize },

    #[error("entry_wait and exit_wait cannot be both 0")]
    ZeroWait,

    #[error("column {col}: cannot place {n} entry/exit pairs in {rows} rows")]
    PopulationTooSmall { col: usize, n: usize, rows: usize },

    #[error("stop value must be 0 or greater, got {value}")]
    NegativeStop { value: f64 },

    #[error("shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },
}

impl SignalError {
    /// True for errors caused by a misbehaving choice function rather than by
    /// the caller's configuration.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            SignalError::OutOfBounds { .. } | SignalError::InfiniteLoop { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_violations_are_classified() {
        let oob = SignalError::OutOfBounds {
            col: 0,
            index: 5,
            from_row: 0,
            to_row: 5,
        };
        assert!(oob.is_contract_violation());
        assert!(SignalError::InfiniteLoop { col: 1, index: 2 }.is_contract_violation());
        assert!(!SignalError::ZeroWait.is_contract_violation());
    }

    #[test]
    fn messages_name_the_window() {
        let err = SignalError::OutOfBounds {
            col: 2,
            index: 9,
            from_row: 3,
            to_row: 7,
        };
        assert_eq!(
            err.to_string(),
            "column 2: returned index 9 is out of bounds [3, 7)"
        );
    }
}
