//! End-to-end `run` pipeline: catalog → fetch → extract → validate → report.

use std::time::{Duration, Instant};

use tracing::{info, instrument};

use modulsync_extractor::{ExtractSummary, extract_to_file};
use modulsync_fetcher::Fetcher;
use modulsync_shared::{AppConfig, FetchIndex, Result};
use modulsync_validator::ValidationReport;

use crate::update::{UpdateOutcome, update_report};

/// Result of a full pipeline run.
#[derive(Debug)]
pub struct RunResult {
    /// Index written by the fetch phase.
    pub index: FetchIndex,
    pub extract: ExtractSummary,
    pub validation: ValidationReport,
    pub update: UpdateOutcome,
    /// Total elapsed time.
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once the catalog overview has been parsed.
    fn catalog_listed(&self, modules: usize);
    /// Called after the fetch phase wrote its index.
    fn fetched(&self, index: &FetchIndex);
    /// Called after the dataset was written.
    fn extracted(&self, summary: &ExtractSummary);
    /// Called after the validation report was written.
    fn validated(&self, report: &ValidationReport);
    /// Called when the pipeline completes.
    fn done(&self, result: &RunResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn catalog_listed(&self, _modules: usize) {}
    fn fetched(&self, _index: &FetchIndex) {}
    fn extracted(&self, _summary: &ExtractSummary) {}
    fn validated(&self, _report: &ValidationReport) {}
    fn done(&self, _result: &RunResult) {}
}

/// Run all four phases in order.
///
/// Each phase persists its output before the next one starts, so a failed
/// run can be resumed phase by phase from the CLI. Per-page fetch and parse
/// failures do not stop the run. A page whose download failed is parsed from
/// the copy an earlier run left on disk; without one it is reported as
/// unavailable rather than deleted.
#[instrument(skip_all, fields(base_url = %config.fetch.base_url))]
pub async fn run(config: &AppConfig, progress: &dyn ProgressReporter) -> Result<RunResult> {
    let start = Instant::now();
    let paths = &config.paths;

    progress.phase("Listing catalog");
    let fetcher = Fetcher::new(config.fetch.clone())?;
    let refs = fetcher.fetch_catalog().await?;
    progress.catalog_listed(refs.len());

    progress.phase("Fetching module pages");
    let index = fetcher.fetch_all(&refs, &paths.raw_dir).await?;
    progress.fetched(&index);

    progress.phase("Extracting dataset");
    let (dataset, extract) =
        extract_to_file(&paths.raw_dir, &paths.dataset_path, &config.fetch.base_url)?;
    progress.extracted(&extract);

    progress.phase("Validating dataset");
    let validation = modulsync_validator::write_report(&dataset, &paths.validation_report)?;
    progress.validated(&validation);

    progress.phase("Comparing with last backup");
    let update = update_report(paths)?;

    let result = RunResult {
        index,
        extract,
        validation,
        update,
        elapsed: start.elapsed(),
    };

    info!(
        fetched = result.index.summary.succeeded,
        fetch_failed = result.index.summary.failed,
        parsed = result.extract.parsed,
        parse_failed = result.extract.failures.len(),
        elapsed_ms = result.elapsed.as_millis() as u64,
        "pipeline completed"
    );

    progress.done(&result);
    Ok(result)
}
