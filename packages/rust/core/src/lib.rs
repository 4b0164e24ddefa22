//! Dataset lifecycle and pipeline orchestration for modulsync.
//!
//! This crate provides:
//! - [`store`]: loading (with integrity checks) and saving master datasets
//! - [`backup`]: dated, never-overwritten dataset backups
//! - [`diff`] / [`report`]: snapshot comparison and the markdown update report
//! - [`update`]: the differ/reporter phase
//! - [`pipeline`]: all phases end to end (`run`)

pub mod backup;
pub mod diff;
pub mod pipeline;
pub mod report;
pub mod store;
pub mod update;

pub use diff::{ChangedVersion, DatasetDiff, StatRow, diff_datasets};
pub use pipeline::{ProgressReporter, RunResult, SilentProgress, run};
pub use store::{load_dataset, save_dataset};
pub use update::{UpdateOutcome, UpdateSummary, update_report};
