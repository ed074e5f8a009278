//! SigLab Runner: job configuration, column-parallel execution and reports.
//!
//! This crate builds on `siglab-core` to provide:
//! - TOML job files describing a signal generation run
//! - Column-parallel drivers on the rayon pool, bit-identical to the sequential ones
//! - Job execution producing a serializable `SignalReport`
//! - Logging initialisation for binaries

pub mod config;
pub mod job;
pub mod logging;
pub mod parallel;
pub mod report;

pub use config::{ArrayInput, ConfigError, EntrySource, JobConfig, JobId, JobKind, OhlcStopJob};
pub use job::{execute, run_job, RunError};
pub use logging::init_logging;
pub use report::{ColumnSummary, JobOutput, SignalReport, StopHit, SCHEMA_VERSION};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn job_config_is_send_sync() {
        assert_send::<JobConfig>();
        assert_sync::<JobConfig>();
    }

    #[test]
    fn report_types_are_send_sync() {
        assert_send::<SignalReport>();
        assert_sync::<SignalReport>();
        assert_send::<JobOutput>();
        assert_sync::<JobOutput>();
    }

    #[test]
    fn run_error_is_send_sync() {
        assert_send::<RunError>();
        assert_sync::<RunError>();
    }
}
