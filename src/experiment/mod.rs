pub mod config;
pub mod report;
pub mod runner;
pub mod trial;

pub use config::{ConfigError, ExperimentConfig};
pub use report::{summarize, write_summary, write_trials, CellSummary, ReportError};
pub use runner::{ExperimentRunner, RunError};
pub use trial::{run_trial, RecordStatus, TrialRecord, TrialSpec};
