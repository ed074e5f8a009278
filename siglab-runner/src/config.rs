//! Serializable job configuration.
//!
//! A job file is TOML:
//!
//! ```toml
//! rows = 3
//! cols = 4
//! seed = 42
//!
//! [job]
//! kind = "ohlc_stop_exits"
//! entries = { source = "rand", n = 3 }
//! open = [100.0, 101.5, 99.0]   # one value per row
//! sl_stop = 0.05
//! sl_trail = true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use siglab_core::random::check_rand_enex;
use siglab_core::stops::{check_ohlc_inputs, OhlcPrices, OhlcStopParams};
use siglab_core::{EnexOptions, ExitOptions, Flex, Matrix, SignalError};

/// Errors from loading or interpreting a job file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid job file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid job: {0}")]
    Invalid(String),
    #[error("invalid job input: {0}")]
    Signal(#[from] SignalError),
    #[error("cannot serialize job: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Unique identifier for a job (content hash of its configuration).
pub type JobId = String;

/// A complete, reproducible signal job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobConfig {
    pub rows: usize,
    pub cols: usize,
    /// Master seed for every random stream; `None` draws from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Spread columns over the rayon pool.
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    /// Worker count for a dedicated pool; `None` uses the global pool.
    #[serde(default)]
    pub threads: Option<usize>,
    pub job: JobKind,
}

fn default_parallel() -> bool {
    true
}

impl JobConfig {
    /// Parse and validate a TOML job description.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: JobConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a job file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Deterministic hash of the configuration.
    ///
    /// Two jobs with identical configuration share an id, so reports can be
    /// matched to the job that produced them.
    pub fn job_id(&self) -> Result<JobId, ConfigError> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }

    /// Check everything that can be checked without generating signals.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == Some(0) {
            return Err(ConfigError::Invalid("threads must be at least 1".into()));
        }
        let shape = self.shape();
        match &self.job {
            JobKind::Rand { n } => {
                n.to_flex(true)?.check_shape("n", shape)?;
            }
            JobKind::RandEnex {
                n,
                entry_wait,
                exit_wait,
            } => {
                let n = n.to_flex(true)?;
                n.check_shape("n", shape)?;
                for col in 0..self.cols {
                    check_rand_enex(self.rows, n.select(0, col), col, *entry_wait, *exit_wait)?;
                }
            }
            JobKind::RandEnexByProb {
                entry_prob,
                exit_prob,
                flex_2d,
                options,
            } => {
                entry_prob.to_flex(*flex_2d)?.check_shape("entry_prob", shape)?;
                exit_prob.to_flex(*flex_2d)?.check_shape("exit_prob", shape)?;
                options.validate()?;
            }
            JobKind::StopExits {
                entries,
                ts,
                stop,
                trailing,
                flex_2d,
                ..
            } => {
                entries.validate(shape)?;
                ts.to_flex(*flex_2d)?.check_shape("ts", shape)?;
                stop.to_flex(*flex_2d)?.check_shape("stop", shape)?;
                trailing.to_flex(*flex_2d)?.check_shape("trailing", shape)?;
            }
            JobKind::OhlcStopExits(job) => {
                job.entries.validate(shape)?;
                let (prices, params) = job.inputs()?;
                check_ohlc_inputs(shape, &prices, &params)?;
            }
        }
        Ok(())
    }
}

/// What a job generates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobKind {
    /// `n` random entries per column.
    Rand { n: ArrayInput<usize> },

    /// `n` random entry/exit pairs per column with minimum spacing.
    RandEnex {
        n: ArrayInput<usize>,
        #[serde(default = "default_wait")]
        entry_wait: usize,
        #[serde(default = "default_wait")]
        exit_wait: usize,
    },

    /// Alternating entries and exits drawn by probability.
    RandEnexByProb {
        entry_prob: ArrayInput<f64>,
        exit_prob: ArrayInput<f64>,
        #[serde(default)]
        flex_2d: bool,
        #[serde(default)]
        options: EnexOptions,
    },

    /// Percentage stop exits on a single price series.
    StopExits {
        entries: EntrySource,
        ts: ArrayInput<f64>,
        stop: ArrayInput<f64>,
        #[serde(default = "default_false")]
        trailing: ArrayInput<bool>,
        #[serde(default)]
        flex_2d: bool,
        /// Drop entries that fall before the pending exit. The next entry
        /// may come one row after an exit; `options.wait` spaces exits from
        /// entries and the other exit options are unused.
        #[serde(default)]
        chain: bool,
        #[serde(default)]
        options: ExitOptions,
    },

    /// Stop-loss / take-profit exits on OHLC bars.
    OhlcStopExits(OhlcStopJob),
}

fn default_wait() -> usize {
    1
}

fn default_false() -> ArrayInput<bool> {
    ArrayInput::Scalar(false)
}

fn default_true() -> bool {
    true
}

impl JobKind {
    pub fn name(&self) -> &'static str {
        match self {
            JobKind::Rand { .. } => "rand",
            JobKind::RandEnex { .. } => "rand_enex",
            JobKind::RandEnexByProb { .. } => "rand_enex_by_prob",
            JobKind::StopExits { .. } => "stop_exits",
            JobKind::OhlcStopExits(_) => "ohlc_stop_exits",
        }
    }
}

/// OHLC stop job; only `entries` and `open` are required.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OhlcStopJob {
    pub entries: EntrySource,
    pub open: ArrayInput<f64>,
    #[serde(default)]
    pub high: Option<ArrayInput<f64>>,
    #[serde(default)]
    pub low: Option<ArrayInput<f64>>,
    #[serde(default)]
    pub close: Option<ArrayInput<f64>>,
    #[serde(default)]
    pub sl_stop: Option<ArrayInput<f64>>,
    #[serde(default)]
    pub sl_trail: Option<ArrayInput<bool>>,
    #[serde(default)]
    pub tp_stop: Option<ArrayInput<f64>>,
    #[serde(default)]
    pub reverse: Option<ArrayInput<bool>>,
    #[serde(default = "default_true")]
    pub is_open_safe: bool,
    #[serde(default)]
    pub flex_2d: bool,
    #[serde(default)]
    pub chain: bool,
    #[serde(default)]
    pub options: ExitOptions,
}

impl OhlcStopJob {
    /// Price arrays and stop parameters with defaults filled in.
    pub fn inputs(&self) -> Result<(OhlcPrices, OhlcStopParams), ConfigError> {
        let f = self.flex_2d;
        let optional = |a: &Option<ArrayInput<f64>>| a.as_ref().map(|a| a.to_flex(f)).transpose();
        let prices = OhlcPrices::with_defaults(
            self.open.to_flex(f)?,
            optional(&self.high)?,
            optional(&self.low)?,
            optional(&self.close)?,
        );
        let defaults = OhlcStopParams::default();
        let params = OhlcStopParams {
            sl_stop: optional(&self.sl_stop)?.unwrap_or(defaults.sl_stop),
            sl_trail: match &self.sl_trail {
                Some(a) => a.to_flex(f)?,
                None => defaults.sl_trail,
            },
            tp_stop: optional(&self.tp_stop)?.unwrap_or(defaults.tp_stop),
            reverse: match &self.reverse {
                Some(a) => a.to_flex(f)?,
                None => defaults.reverse,
            },
            is_open_safe: self.is_open_safe,
        };
        Ok((prices, params))
    }
}

/// Where a stop job's entries come from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum EntrySource {
    /// Explicit row-major boolean grid.
    Given { values: Vec<Vec<bool>> },
    /// `n` random entries per column.
    Rand { n: ArrayInput<usize> },
    /// Entries drawn by probability.
    RandByProb {
        prob: ArrayInput<f64>,
        #[serde(default)]
        flex_2d: bool,
    },
}

impl EntrySource {
    fn validate(&self, shape: (usize, usize)) -> Result<(), ConfigError> {
        match self {
            EntrySource::Given { values } => {
                Matrix::from_rows(values)?.check_shape("entries", shape)?;
            }
            EntrySource::Rand { n } => n.to_flex(true)?.check_shape("n", shape)?,
            EntrySource::RandByProb { prob, flex_2d } => {
                prob.to_flex(*flex_2d)?.check_shape("prob", shape)?
            }
        }
        Ok(())
    }
}

/// An inline array: a scalar, a 1-D vector, or a row-major 2-D grid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ArrayInput<T> {
    Scalar(T),
    Vector(Vec<T>),
    Grid(Vec<Vec<T>>),
}

impl<T: Copy> ArrayInput<T> {
    /// Interpret as a flexible array; vectors run along columns with `flex_2d`.
    pub fn to_flex(&self, flex_2d: bool) -> Result<Flex<T>, ConfigError> {
        match self {
            ArrayInput::Scalar(v) => Ok(Flex::Scalar(*v)),
            ArrayInput::Vector(v) if v.is_empty() => {
                Err(ConfigError::Invalid("empty array".into()))
            }
            ArrayInput::Vector(v) => Ok(Flex::from_1d(v.clone(), flex_2d)),
            ArrayInput::Grid(rows) => Ok(Flex::from_2d(Matrix::from_rows(rows)?)),
        }
    }
}
