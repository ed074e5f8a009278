//! Job execution: turn a [`JobConfig`] into a [`SignalReport`].

use thiserror::Error;
use tracing::info;

use siglab_core::choice::FirstChoice;
use siglab_core::generate::{generate_enex, generate_ex};
use siglab_core::random::{
    generate_rand, generate_rand_by_prob, generate_rand_enex, generate_rand_enex_by_prob,
    RandByProbChoice, RandChoice,
};
use siglab_core::rng::{ColumnRng, ENTRY_STREAM, EXIT_STREAM};
use siglab_core::stops::{
    generate_ohlc_stop_enex, generate_ohlc_stop_ex, OhlcStopSignals, StopChoice,
};
use siglab_core::{EnexOptions, EventMatrix, ExitOptions, Matrix, SignalError};

use crate::config::{ConfigError, EntrySource, JobConfig, JobKind, OhlcStopJob};
use crate::parallel::{
    par_generate, par_generate_enex, par_generate_ex, par_ohlc_stop_enex, par_ohlc_stop_ex,
    par_rand_enex, with_pool,
};
use crate::report::{JobOutput, SignalReport};

/// Errors from running a job.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("signal error: {0}")]
    Signal(#[from] SignalError),
    #[error("cannot build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Validate and run a job, then summarize its output.
pub fn run_job(config: &JobConfig) -> Result<SignalReport, RunError> {
    config.validate()?;
    let job_id = config.job_id()?;
    info!(
        job_id = %&job_id[..12],
        kind = config.job.name(),
        rows = config.rows,
        cols = config.cols,
        parallel = config.parallel,
        "running job"
    );

    let output = if config.parallel {
        with_pool(config.threads, || execute(config))??
    } else {
        execute(config)?
    };

    let report = SignalReport::build(job_id, config.job.name(), config.seed, &output)?;
    info!(
        ranges = report.ranges.len(),
        stops = report.stops.len(),
        "job finished"
    );
    Ok(report)
}

/// Run a job without summarizing it.
pub fn execute(config: &JobConfig) -> Result<JobOutput, RunError> {
    let shape = config.shape();
    let seed = config.seed;
    let parallel = config.parallel;

    let output = match &config.job {
        JobKind::Rand { n } => {
            let n = n.to_flex(true)?;
            let entries = if parallel {
                n.check_shape("n", shape)?;
                par_generate(shape, false, || {
                    RandChoice::new(n.clone(), ColumnRng::new(seed, ENTRY_STREAM))
                })?
            } else {
                generate_rand(shape, &n, seed)?
            };
            signals_only(entries, None)
        }

        JobKind::RandEnex {
            n,
            entry_wait,
            exit_wait,
        } => {
            let n = n.to_flex(true)?;
            let (entries, exits) = if parallel {
                par_rand_enex(shape, &n, *entry_wait, *exit_wait, seed)?
            } else {
                generate_rand_enex(shape, &n, *entry_wait, *exit_wait, seed)?
            };
            signals_only(entries, Some(exits))
        }

        JobKind::RandEnexByProb {
            entry_prob,
            exit_prob,
            flex_2d,
            options,
        } => {
            let entry_prob = entry_prob.to_flex(*flex_2d)?;
            let exit_prob = exit_prob.to_flex(*flex_2d)?;
            let (entries, exits) = if parallel {
                entry_prob.check_shape("entry_prob", shape)?;
                exit_prob.check_shape("exit_prob", shape)?;
                par_generate_enex(
                    shape,
                    *options,
                    || {
                        RandByProbChoice::new(
                            entry_prob.clone(),
                            options.entry_pick_first,
                            ColumnRng::new(seed, ENTRY_STREAM),
                        )
                    },
                    || {
                        RandByProbChoice::new(
                            exit_prob.clone(),
                            options.exit_pick_first,
                            ColumnRng::new(seed, EXIT_STREAM),
                        )
                    },
                )?
            } else {
                generate_rand_enex_by_prob(shape, &entry_prob, &exit_prob, *options, seed)?
            };
            signals_only(entries, Some(exits))
        }

        JobKind::StopExits {
            entries,
            ts,
            stop,
            trailing,
            flex_2d,
            chain,
            options,
        } => {
            let entries = entry_signals(entries, shape, seed, parallel)?;
            let ts = ts.to_flex(*flex_2d)?;
            let stop = stop.to_flex(*flex_2d)?;
            let trailing = trailing.to_flex(*flex_2d)?;
            ts.check_shape("ts", shape)?;
            stop.check_shape("stop", shape)?;
            trailing.check_shape("trailing", shape)?;
            let make_exit =
                || StopChoice::new(&ts, &stop, &trailing, options.wait, options.pick_first);

            if *chain {
                let opts = chain_options(*options);
                let make_entry = || FirstChoice::new(&entries);
                let (entries, exits) = if parallel {
                    par_generate_enex(shape, opts, make_entry, make_exit)?
                } else {
                    generate_enex(shape, opts, &mut make_entry(), &mut make_exit())?
                };
                signals_only(entries, Some(exits))
            } else {
                let exits = if parallel {
                    par_generate_ex(&entries, *options, make_exit)?
                } else {
                    generate_ex(&entries, *options, &mut make_exit())?
                };
                signals_only(entries, Some(exits))
            }
        }

        JobKind::OhlcStopExits(job) => ohlc_stop_output(job, shape, seed, parallel)?,
    };
    Ok(output)
}

fn ohlc_stop_output(
    job: &OhlcStopJob,
    shape: (usize, usize),
    seed: Option<u64>,
    parallel: bool,
) -> Result<JobOutput, RunError> {
    let entries = entry_signals(&job.entries, shape, seed, parallel)?;
    let (prices, params) = job.inputs()?;
    let opts = job.options;
    let signals: OhlcStopSignals = match (job.chain, parallel) {
        (false, true) => par_ohlc_stop_ex(&entries, &prices, &params, opts)?,
        (false, false) => generate_ohlc_stop_ex(&entries, &prices, &params, opts)?,
        (true, true) => par_ohlc_stop_enex(&entries, &prices, &params, chain_options(opts))?,
        (true, false) => {
            let chained = chain_options(opts);
            generate_ohlc_stop_enex(
                &entries,
                &prices,
                &params,
                chained.entry_wait,
                chained.exit_wait,
                chained.exit_pick_first,
            )?
        }
    };
    Ok(JobOutput {
        entries: signals.entries,
        exits: Some(signals.exits),
        stop_price: Some(signals.stop_price),
        stop_type: Some(signals.stop_type),
    })
}

/// Chained stop exits: the next entry may follow its exit by one row.
fn chain_options(opts: ExitOptions) -> EnexOptions {
    EnexOptions {
        entry_wait: 1,
        exit_wait: opts.wait,
        entry_pick_first: true,
        exit_pick_first: opts.pick_first,
    }
}

fn signals_only(entries: EventMatrix, exits: Option<EventMatrix>) -> JobOutput {
    JobOutput {
        entries,
        exits,
        stop_price: None,
        stop_type: None,
    }
}

fn entry_signals(
    source: &EntrySource,
    shape: (usize, usize),
    seed: Option<u64>,
    parallel: bool,
) -> Result<EventMatrix, RunError> {
    let entries = match source {
        EntrySource::Given { values } => {
            let entries = Matrix::from_rows(values)?;
            entries.check_shape("entries", shape)?;
            entries
        }
        EntrySource::Rand { n } => {
            let n = n.to_flex(true)?;
            if parallel {
                n.check_shape("n", shape)?;
                par_generate(shape, false, || {
                    RandChoice::new(n.clone(), ColumnRng::new(seed, ENTRY_STREAM))
                })?
            } else {
                generate_rand(shape, &n, seed)?
            }
        }
        EntrySource::RandByProb { prob, flex_2d } => {
            let prob = prob.to_flex(*flex_2d)?;
            if parallel {
                prob.check_shape("prob", shape)?;
                par_generate(shape, false, || {
                    RandByProbChoice::new(prob.clone(), false, ColumnRng::new(seed, ENTRY_STREAM))
                })?
            } else {
                generate_rand_by_prob(shape, &prob, false, seed)?
            }
        }
    };
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use siglab_core::StopType;

    fn config(text: &str) -> JobConfig {
        JobConfig::from_toml(text).unwrap()
    }

    #[test]
    fn stop_job_places_exits() {
        let job = config(
            r#"
rows = 5
cols = 1
parallel = false

[job]
kind = "stop_exits"
entries = { source = "given", values = [[false], [true], [false], [false], [false]] }
ts = [1.0, 2.0, 3.0, 2.0, 1.0]
stop = -0.1
trailing = true
"#,
        );
        let report = run_job(&job).unwrap();
        assert_eq!(report.kind, "stop_exits");
        assert_eq!(report.entries, vec![vec![1]]);
        assert_eq!(report.exits, Some(vec![vec![3]]));
        assert_eq!(report.ranges.len(), 1);
    }

    #[test]
    fn chained_stop_job_drops_entries_inside_trades() {
        let text = r#"
rows = 6
cols = 1

[job]
kind = "stop_exits"
entries = { source = "given", values = [[true], [true], [false], [true], [false], [true]] }
ts = [10.0, 10.0, 8.0, 10.0, 10.0, 10.0]
stop = -0.1
chain = true
"#;
        let mut job = config(text);
        let parallel = run_job(&job).unwrap();
        job.parallel = false;
        let sequential = run_job(&job).unwrap();
        // entry 1 falls inside the first trade
        assert_eq!(sequential.entries, vec![vec![0, 3]]);
        assert_eq!(sequential.exits, Some(vec![vec![2]]));
        assert_eq!(parallel.entries, sequential.entries);
        assert_eq!(parallel.exits, sequential.exits);
    }

    #[test]
    fn ohlc_job_reports_stop_hits() {
        let job = config(
            r#"
rows = 4
cols = 1

[job]
kind = "ohlc_stop_exits"
entries = { source = "given", values = [[true], [false], [false], [false]] }
open = [100.0, 104.0, 111.0, 95.0]
sl_stop = 0.05
tp_stop = 0.1
"#,
        );
        let report = run_job(&job).unwrap();
        assert_eq!(report.exits, Some(vec![vec![2]]));
        assert_eq!(report.stops.len(), 1);
        assert_eq!(report.stops[0].stop_type, StopType::TakeProfit);
        assert!((report.stops[0].price - 110.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_jobs_fail_before_running() {
        let mut job = config("rows = 4\ncols = 1\n[job]\nkind = \"rand_enex\"\nn = 1\n");
        job.threads = Some(0);
        assert!(matches!(
            run_job(&job),
            Err(RunError::Config(ConfigError::Invalid(_)))
        ));
    }

    #[test]
    fn dedicated_pool_is_used() {
        let mut job = config(
            "rows = 40\ncols = 6\nseed = 3\nthreads = 2\n[job]\nkind = \"rand_enex\"\nn = 4\n",
        );
        let pooled = run_job(&job).unwrap();
        job.threads = None;
        assert_eq!(run_job(&job).unwrap().entries, pooled.entries);
    }
}
