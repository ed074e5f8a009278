//! Job files on disk: load, run, report.

use std::io::Write;

use siglab_runner::{run_job, ConfigError, JobConfig, RunError, SignalReport, SCHEMA_VERSION};

fn write_job(text: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

const RAND_ENEX_JOB: &str = r#"
rows = 50
cols = 3
seed = 7

[job]
kind = "rand_enex"
n = [2, 3, 4]
entry_wait = 2
exit_wait = 3
"#;

#[test]
fn rand_enex_job_round_trips_through_json() {
    let file = write_job(RAND_ENEX_JOB);
    let config = JobConfig::load(file.path()).unwrap();
    let report = run_job(&config).unwrap();

    assert_eq!(report.schema_version, SCHEMA_VERSION);
    assert_eq!(report.kind, "rand_enex");
    assert_eq!((report.rows, report.cols), (50, 3));
    let counts: Vec<usize> = report.columns.iter().map(|c| c.entries).collect();
    assert_eq!(counts, vec![2, 3, 4]);
    // every entry is matched by an exit, so every range closes
    assert_eq!(report.ranges.len(), 9);

    let json = report.to_json(true).unwrap();
    let back: SignalReport = serde_json::from_str(&json).unwrap();
    assert_eq!(back, report);
}

#[test]
fn same_file_same_report() {
    let file = write_job(RAND_ENEX_JOB);
    let config = JobConfig::load(file.path()).unwrap();
    let a = run_job(&config).unwrap();
    let b = run_job(&config).unwrap();
    assert_eq!(a, b);

    let mut sequential = config.clone();
    sequential.parallel = false;
    let c = run_job(&sequential).unwrap();
    assert_eq!(a.entries, c.entries);
    assert_eq!(a.exits, c.exits);
    // the parallel flag is part of the configuration hash
    assert_ne!(a.job_id, c.job_id);
}

#[test]
fn ohlc_job_with_random_entries() {
    let file = write_job(
        r#"
rows = 6
cols = 2
seed = 1

[job]
kind = "ohlc_stop_exits"
entries = { source = "rand", n = 1 }
open = [100.0, 100.0, 100.0, 100.0, 100.0, 100.0]
high = [101.0, 101.0, 101.0, 101.0, 101.0, 101.0]
low = [99.0, 99.0, 99.0, 99.0, 99.0, 99.0]
sl_stop = 0.1
"#,
    );
    let report = run_job(&JobConfig::load(file.path()).unwrap()).unwrap();
    // prices never move 10%, so no stops fire
    assert!(report.stops.is_empty());
    assert_eq!(report.exits, Some(vec![vec![], vec![]]));
    assert!(report.columns.iter().all(|c| c.entries == 1));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = JobConfig::load(&dir.path().join("missing.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn negative_stop_fails_validation() {
    let file = write_job(
        r#"
rows = 3
cols = 1

[job]
kind = "ohlc_stop_exits"
entries = { source = "given", values = [[true], [false], [false]] }
open = 100.0
tp_stop = -0.1
"#,
    );
    let err = JobConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Signal(_)));

    // constructed in code, the same job fails in run_job
    let text = std::fs::read_to_string(file.path()).unwrap();
    let config: JobConfig = toml::from_str(&text).unwrap();
    assert!(matches!(run_job(&config), Err(RunError::Config(_))));
}
