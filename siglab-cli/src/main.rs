//! SigLab CLI: run and validate signal jobs.
//!
//! Commands:
//! - `run`: execute a TOML job file and print its JSON report to stdout
//! - `validate`: parse and validate a job file without generating signals

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use siglab_runner::{init_logging, run_job, JobConfig};

#[derive(Parser)]
#[command(name = "siglab", about = "SigLab CLI: signal generation and stop triggers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a job file and print the report as JSON.
    Run {
        /// Path to a TOML job file.
        job: PathBuf,

        /// Pretty-print the report.
        #[arg(long, default_value_t = false)]
        pretty: bool,

        /// Run columns sequentially regardless of the job file.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Override the job's seed.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Parse and validate a job file.
    Validate {
        /// Path to a TOML job file.
        job: PathBuf,
    },
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            job,
            pretty,
            sequential,
            seed,
        } => run_cmd(&job, pretty, sequential, seed),
        Commands::Validate { job } => validate_cmd(&job),
    }
}

fn load(path: &Path) -> Result<JobConfig> {
    JobConfig::load(path).with_context(|| format!("loading job {}", path.display()))
}

fn run_cmd(path: &Path, pretty: bool, sequential: bool, seed: Option<u64>) -> Result<()> {
    let mut config = load(path)?;
    if sequential {
        config.parallel = false;
    }
    if seed.is_some() {
        config.seed = seed;
    }

    let report = run_job(&config).with_context(|| format!("running job {}", path.display()))?;
    let json = report.to_json(pretty).context("serializing report")?;
    println!("{json}");
    Ok(())
}

fn validate_cmd(path: &Path) -> Result<()> {
    let config = load(path)?;
    let job_id = config.job_id()?;
    println!(
        "{}: ok ({} job, {}x{}, id {})",
        path.display(),
        config.job.name(),
        config.rows,
        config.cols,
        &job_id[..12]
    );
    Ok(())
}
