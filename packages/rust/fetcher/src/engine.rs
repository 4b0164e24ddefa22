//! Concurrent page fetcher.
//!
//! Every module reference is downloaded by its own task; a semaphore sized by
//! `fetch.workers` bounds how many requests are in flight. Tasks share no
//! mutable state: each returns its outcome and the batch is aggregated once
//! all of them have finished, then the index is written in one piece.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use reqwest::Client;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use modulsync_shared::{
    FetchConfig, FetchFailure, FetchIndex, FetchSummary, INDEX_FILE_NAME, IndexEntry,
    ModuleRef, ModulsyncError, Result, version_key, write_atomic, write_json,
};

use crate::catalog::parse_catalog;

/// User-Agent string for catalog requests.
const USER_AGENT: &str = concat!("modulsync/", env!("CARGO_PKG_VERSION"));

/// What happened to one reference.
#[derive(Debug)]
enum FetchOutcome {
    Stored(IndexEntry),
    Skipped(IndexEntry),
    Failed(FetchFailure),
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// Downloads catalog pages with bounded parallelism.
pub struct Fetcher {
    config: FetchConfig,
    client: Client,
}

impl Fetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(config.timeout())
            .build()
            .map_err(|e| ModulsyncError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Download the catalog overview and list every module version on it.
    #[instrument(skip_all, fields(base_url = %self.config.base_url))]
    pub async fn fetch_catalog(&self) -> Result<Vec<ModuleRef>> {
        let base_url = Url::parse(&self.config.base_url).map_err(|e| {
            ModulsyncError::config(format!("invalid base_url '{}': {e}", self.config.base_url))
        })?;

        let html = fetch_document(&self.client, base_url.as_str()).await?;
        let refs = parse_catalog(&html, &base_url);

        if refs.is_empty() {
            return Err(ModulsyncError::parse(
                "catalog page lists no modules (markup changed or page not rendered)",
            ));
        }

        info!(modules = refs.len(), "catalog loaded");
        Ok(refs)
    }

    /// Fetch every reference into `raw_dir` and write `module_index.json`.
    ///
    /// Individual failures are recorded in the returned index; only
    /// filesystem errors on the directory or the index itself abort the batch.
    #[instrument(skip_all, fields(refs = refs.len(), raw_dir = %raw_dir.display()))]
    pub async fn fetch_all(&self, refs: &[ModuleRef], raw_dir: &Path) -> Result<FetchIndex> {
        let start = Instant::now();
        let started_at = Utc::now();

        std::fs::create_dir_all(raw_dir).map_err(|e| ModulsyncError::io(raw_dir, e))?;

        info!(
            workers = self.config.workers,
            timeout_secs = self.config.timeout_secs,
            skip_existing = self.config.skip_existing,
            "starting fetch"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let mut tasks = JoinSet::new();
        let mut pending: BTreeMap<String, ModuleRef> = BTreeMap::new();
        let mut outcomes: Vec<FetchOutcome> = Vec::with_capacity(refs.len());
        let mut seen = HashSet::new();

        for module in refs {
            if !seen.insert(module.key()) {
                debug!(key = %module.key(), "duplicate reference, skipping");
                continue;
            }

            let target = raw_dir.join(module.html_file());
            if self.config.skip_existing && target.exists() {
                debug!(key = %module.key(), "already on disk");
                outcomes.push(FetchOutcome::Skipped(index_entry(module, None)));
                continue;
            }

            pending.insert(module.key(), module.clone());

            let client = self.client.clone();
            let sem = semaphore.clone();
            let module = module.clone();

            tasks.spawn(async move {
                let Ok(_permit) = sem.acquire_owned().await else {
                    return FetchOutcome::Failed(failure(&module, "worker pool closed"));
                };
                fetch_one(&client, module, &target).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    let key = match &outcome {
                        FetchOutcome::Stored(e) | FetchOutcome::Skipped(e) => {
                            version_key(&e.nummer, e.version)
                        }
                        FetchOutcome::Failed(f) => version_key(&f.nummer, f.version),
                    };
                    pending.remove(&key);
                    outcomes.push(outcome);
                }
                Err(e) => warn!(error = %e, "fetch task did not complete"),
            }
        }

        // Tasks that panicked or were cancelled never reported back.
        for module in pending.into_values() {
            outcomes.push(FetchOutcome::Failed(failure(&module, "fetch task aborted")));
        }

        let index = build_index(outcomes, started_at, start.elapsed().as_millis() as u64);
        write_json(&raw_dir.join(INDEX_FILE_NAME), &index)?;

        info!(
            succeeded = index.summary.succeeded,
            skipped = index.summary.skipped,
            failed = index.summary.failed,
            elapsed_ms = index.summary.elapsed_ms,
            "fetch completed"
        );

        Ok(index)
    }
}

// ---------------------------------------------------------------------------
// Page fetching
// ---------------------------------------------------------------------------

/// Fetch one reference and store it at `target`.
async fn fetch_one(client: &Client, module: ModuleRef, target: &Path) -> FetchOutcome {
    debug!(url = %module.detail_url, "fetching page");

    let body = match fetch_document(client, &module.detail_url).await {
        Ok(body) => body,
        Err(e) => {
            warn!(key = %module.key(), error = %e, "fetch failed");
            return FetchOutcome::Failed(failure(&module, e.to_string()));
        }
    };

    if let Err(e) = write_atomic(target, body.as_bytes()) {
        warn!(key = %module.key(), error = %e, "could not store page");
        return FetchOutcome::Failed(failure(&module, e.to_string()));
    }

    FetchOutcome::Stored(index_entry(&module, Some(Utc::now())))
}

/// GET a document and return its body; non-2xx statuses are errors.
async fn fetch_document(client: &Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ModulsyncError::Network(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ModulsyncError::Network(format!("{url}: HTTP {status}")));
    }

    response
        .text()
        .await
        .map_err(|e| ModulsyncError::Network(format!("{url}: body read failed: {e}")))
}

fn index_entry(module: &ModuleRef, fetched_at: Option<chrono::DateTime<Utc>>) -> IndexEntry {
    IndexEntry {
        nummer: module.nummer.clone(),
        version: module.version,
        titel: module.titel.clone(),
        url: module.detail_url.clone(),
        html_file: module.html_file(),
        fetched_at,
    }
}

fn failure(module: &ModuleRef, reason: impl Into<String>) -> FetchFailure {
    FetchFailure {
        nummer: module.nummer.clone(),
        version: module.version,
        url: module.detail_url.clone(),
        reason: reason.into(),
    }
}

/// Sort key: numeric module number first, then version.
fn sort_key(nummer: &str, version: u32) -> (u64, String, u32) {
    (nummer.parse().unwrap_or(u64::MAX), nummer.to_string(), version)
}

fn build_index(
    outcomes: Vec<FetchOutcome>,
    started_at: chrono::DateTime<Utc>,
    elapsed_ms: u64,
) -> FetchIndex {
    let mut summary = FetchSummary {
        elapsed_ms,
        ..FetchSummary::default()
    };
    let mut entries = Vec::new();
    let mut errors = Vec::new();

    for outcome in outcomes {
        match outcome {
            FetchOutcome::Stored(entry) => {
                summary.succeeded += 1;
                entries.push(entry);
            }
            FetchOutcome::Skipped(entry) => {
                summary.skipped += 1;
                entries.push(entry);
            }
            FetchOutcome::Failed(f) => {
                summary.failed += 1;
                errors.push(f);
            }
        }
    }

    entries.sort_by_key(|e| sort_key(&e.nummer, e.version));
    errors.sort_by_key(|f| sort_key(&f.nummer, f.version));

    FetchIndex {
        run_id: Uuid::now_v7().to_string(),
        started_at,
        finished_at: Utc::now(),
        summary,
        entries,
        errors,
    }
}
