//! Serializable driver options.

use serde::{Deserialize, Serialize};

use crate::error::SignalError;

/// Options for placing exits after existing entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitOptions {
    /// Rows to wait after an entry before an exit may be placed.
    ///
    /// Zero allows an exit on the entry's own row.
    pub wait: usize,
    /// Bound each exit window by the next entry instead of the column end.
    pub until_next: bool,
    /// Skip entries at or before the last placed exit.
    pub skip_until_exit: bool,
    /// Keep only the first index a choice function returns.
    pub pick_first: bool,
}

impl Default for ExitOptions {
    fn default() -> Self {
        Self {
            wait: 1,
            until_next: true,
            skip_until_exit: false,
            pick_first: true,
        }
    }
}

/// Options for the alternating entry/exit driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnexOptions {
    /// Rows to wait after an exit before the next entry.
    pub entry_wait: usize,
    /// Rows to wait after an entry before its exit.
    pub exit_wait: usize,
    pub entry_pick_first: bool,
    /// With `false`, the last returned exit anchors the next entry window.
    pub exit_pick_first: bool,
}

impl EnexOptions {
    pub fn validate(&self) -> Result<(), SignalError> {
        if self.entry_wait == 0 && self.exit_wait == 0 {
            return Err(SignalError::ZeroWait);
        }
        Ok(())
    }
}

impl Default for EnexOptions {
    fn default() -> Self {
        Self {
            entry_wait: 1,
            exit_wait: 1,
            entry_pick_first: true,
            exit_pick_first: true,
        }
    }
}
