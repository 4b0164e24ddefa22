//! Structured extraction of module pages into the master dataset.
//!
//! This crate provides:
//! - [`parser`]: HTML → version record, tolerant of missing sections
//! - [`fingerprint`]: deterministic content hash per version
//! - [`merge`]: grouping versions under their modules, duplicate detection,
//!   meta recomputation
//! - [`extract_dir`] / [`extract_to_file`]: the phase entry points

pub mod fingerprint;
pub mod merge;
pub mod parser;

use std::path::Path;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{debug, info, instrument, warn};

use modulsync_shared::{
    FetchIndex, MasterDataset, ModulsyncError, Result, version_key, write_json,
};

pub use fingerprint::content_fingerprint;
pub use merge::merge_into;
pub use parser::{DocumentHint, ExtractedVersion, parse_module_html};

static FILE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^modul-(\d+)-v(\d+)\.html$").expect("valid regex"));

/// A document that could not be turned into a version record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    /// File name (or URL) the failure refers to.
    pub source: String,
    /// Version key, when it could be determined.
    pub key: Option<String>,
    pub reason: String,
}

/// Outcome of one extraction run.
#[derive(Debug, Clone)]
pub struct ExtractSummary {
    /// Documents looked at.
    pub documents: usize,
    /// Versions that made it into the dataset.
    pub parsed: usize,
    pub failures: Vec<ParseFailure>,
    /// Versions taken from a copy on disk because this run's download failed.
    pub stale: Vec<ParseFailure>,
}

/// Parse every document of `raw_dir` into a fresh dataset stamped `erstellt`.
///
/// With a `module_index.json` present, exactly the indexed documents are
/// parsed (stale files of modules that left the catalog are ignored) and the
/// index supplies titles and URLs. A reference whose download failed is still
/// parsed from the copy an earlier run left on disk, and listed in
/// [`ExtractSummary::stale`]. Without an index, every `*.html` file is parsed.
#[instrument(skip_all, fields(raw_dir = %raw_dir.display()))]
pub fn extract_dir(
    raw_dir: &Path,
    quelle: &str,
    erstellt: DateTime<Utc>,
) -> Result<(MasterDataset, ExtractSummary)> {
    let jobs = match FetchIndex::load(raw_dir)? {
        Some(index) => jobs_from_index(&index),
        None => jobs_from_dir(raw_dir)?,
    };

    let mut failures = Vec::new();
    let mut stale = Vec::new();
    let mut batch = Vec::with_capacity(jobs.len());

    for job in &jobs {
        let path = raw_dir.join(&job.file);

        if let Some(reason) = &job.fetch_error {
            if !path.is_file() {
                warn!(file = %job.file, %reason, "document not available");
                failures.push(job.failure(format!("fetch failed: {reason}")));
                continue;
            }
            warn!(file = %job.file, %reason, "fetch failed, using copy from an earlier run");
        }

        let html = match std::fs::read_to_string(&path) {
            Ok(html) => html,
            Err(e) => {
                warn!(file = %job.file, error = %e, "cannot read document");
                failures.push(job.failure(format!("cannot read document: {e}")));
                continue;
            }
        };

        match parse_module_html(&html, &job.hint) {
            Ok(extracted) => {
                if let Some(reason) = &job.fetch_error {
                    stale.push(job.failure(format!("stale: fetch failed: {reason}")));
                }
                batch.push(extracted);
            }
            Err(e) => {
                warn!(file = %job.file, error = %e, "document rejected");
                failures.push(job.failure(e.to_string()));
            }
        }
    }

    let mut dataset = MasterDataset::empty(quelle, erstellt);
    failures.extend(merge_into(&mut dataset, batch));

    let summary = ExtractSummary {
        documents: jobs.len(),
        parsed: dataset.meta.counters.anzahl_versionen_total as usize,
        failures,
        stale,
    };

    info!(
        documents = summary.documents,
        parsed = summary.parsed,
        errors = summary.failures.len(),
        stale = summary.stale.len(),
        master_module = dataset.meta.counters.anzahl_master_module,
        berufe = dataset.meta.counters.anzahl_berufe,
        "extraction completed"
    );

    Ok((dataset, summary))
}

/// Run [`extract_dir`] and write the dataset to `dataset_path`.
pub fn extract_to_file(
    raw_dir: &Path,
    dataset_path: &Path,
    quelle: &str,
) -> Result<(MasterDataset, ExtractSummary)> {
    if !raw_dir.is_dir() {
        return Err(ModulsyncError::io(
            raw_dir,
            std::io::Error::new(std::io::ErrorKind::NotFound, "raw document directory missing"),
        ));
    }

    let (dataset, summary) = extract_dir(raw_dir, quelle, Utc::now())?;
    write_json(dataset_path, &dataset)?;
    info!(path = %dataset_path.display(), "dataset written");
    Ok((dataset, summary))
}

// ---------------------------------------------------------------------------
// Job discovery
// ---------------------------------------------------------------------------

/// One document to parse.
struct ParseJob {
    file: String,
    hint: DocumentHint,
    /// Set when this run's download of the document failed.
    fetch_error: Option<String>,
}

impl ParseJob {
    fn key(&self) -> Option<String> {
        Some(version_key(self.hint.nummer.as_deref()?, self.hint.version?))
    }

    fn failure(&self, reason: String) -> ParseFailure {
        ParseFailure {
            source: self.file.clone(),
            key: self.key(),
            reason,
        }
    }
}

fn jobs_from_index(index: &FetchIndex) -> Vec<ParseJob> {
    let mut jobs: Vec<ParseJob> = index
        .entries
        .iter()
        .map(|e| ParseJob {
            file: e.html_file.clone(),
            hint: DocumentHint {
                nummer: Some(e.nummer.clone()),
                version: Some(e.version),
                titel: Some(e.titel.clone()),
                url: Some(e.url.clone()),
            },
            fetch_error: None,
        })
        .collect();

    // A failed download still counts as a document of the catalog.
    for failure in &index.errors {
        jobs.push(ParseJob {
            file: format!("modul-{}-v{}.html", failure.nummer, failure.version),
            hint: DocumentHint {
                nummer: Some(failure.nummer.clone()),
                version: Some(failure.version),
                titel: None,
                url: Some(failure.url.clone()),
            },
            fetch_error: Some(failure.reason.clone()),
        });
    }

    debug!(jobs = jobs.len(), "jobs taken from module index");
    jobs
}

fn jobs_from_dir(raw_dir: &Path) -> Result<Vec<ParseJob>> {
    let entries = std::fs::read_dir(raw_dir).map_err(|e| ModulsyncError::io(raw_dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ModulsyncError::io(raw_dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".html") && !name.starts_with('.') {
            files.push(name);
        }
    }
    files.sort();

    let jobs: Vec<ParseJob> = files
        .into_iter()
        .map(|file| {
            let mut hint = DocumentHint::default();
            if let Some(caps) = FILE_NAME_RE.captures(&file) {
                hint.nummer = Some(caps[1].to_string());
                hint.version = caps[2].parse().ok();
            }
            ParseJob {
                file,
                hint,
                fetch_error: None,
            }
        })
        .collect();

    debug!(jobs = jobs.len(), "jobs taken from directory listing");
    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use modulsync_shared::{FetchFailure, FetchSummary, INDEX_FILE_NAME, IndexEntry};
    use uuid::Uuid;

    fn fixture_dir() -> std::path::PathBuf {
        std::path::PathBuf::from("../../../fixtures/html")
    }

    fn temp_dir(label: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("modulsync-{label}-{}", Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn copy_fixture(dir: &Path, name: &str, as_name: &str) {
        std::fs::copy(fixture_dir().join(name), dir.join(as_name)).unwrap();
    }

    #[test]
    fn extracting_twice_gives_identical_fingerprints() {
        let (first, _) = extract_dir(&fixture_dir(), "q", Utc::now()).unwrap();
        let (second, _) = extract_dir(&fixture_dir(), "q", Utc::now()).unwrap();

        let hashes = |ds: &MasterDataset| -> Vec<Option<String>> {
            ds.versions().map(|(_, v)| v.content_hash.clone()).collect()
        };
        assert_eq!(hashes(&first), hashes(&second));
        assert_eq!(first.module, second.module);
    }

    #[test]
    fn directory_scan_uses_file_names() {
        let (dataset, summary) = extract_dir(&fixture_dir(), "q", Utc::now()).unwrap();

        assert_eq!(summary.documents, 3);
        assert_eq!(summary.parsed, 3);
        assert!(summary.failures.is_empty());

        let order: Vec<&str> = dataset.module.iter().map(|m| m.nummer.as_str()).collect();
        assert_eq!(order, ["106", "117", "999"]);
        assert_eq!(dataset.meta.counters.anzahl_versionen_total, 3);
        assert_eq!(dataset.meta.counters.anzahl_berufe, 3);
        assert!(dataset.meta_mismatches().is_empty());
    }

    #[test]
    fn index_drives_extraction_and_reports_missing_documents() {
        let dir = temp_dir("extract-index");
        copy_fixture(&dir, "modul-106-v3.html", "modul-106-v3.html");
        copy_fixture(&dir, "modul-117-v2.html", "modul-500-v1.html");
        // Not in the index: must be ignored.
        copy_fixture(&dir, "modul-999-v1.html", "modul-999-v1.html");

        let index = FetchIndex {
            run_id: "test".into(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            summary: FetchSummary::default(),
            entries: vec![
                IndexEntry {
                    nummer: "106".into(),
                    version: 3,
                    titel: "Datenbanken abfragen".into(),
                    url: "https://www.modulbaukasten.ch/module/106/3/de-DE".into(),
                    html_file: "modul-106-v3.html".into(),
                    fetched_at: None,
                },
                IndexEntry {
                    nummer: "500".into(),
                    version: 1,
                    titel: "Indexierter Titel".into(),
                    url: "https://www.modulbaukasten.ch/module/500/1/de-DE".into(),
                    html_file: "modul-500-v1.html".into(),
                    fetched_at: None,
                },
            ],
            errors: vec![FetchFailure {
                nummer: "200".into(),
                version: 2,
                url: "https://www.modulbaukasten.ch/module/200/2/de-DE".into(),
                reason: "HTTP 503".into(),
            }],
        };
        write_json(&dir.join(INDEX_FILE_NAME), &index).unwrap();

        let (dataset, summary) = extract_dir(&dir, "q", Utc::now()).unwrap();

        assert_eq!(summary.documents, 3);
        assert_eq!(summary.parsed, 2);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].key.as_deref(), Some("200-V2"));
        assert!(summary.failures[0].reason.contains("HTTP 503"));

        // Index identity wins over the page heading.
        let m500 = dataset.module.iter().find(|m| m.nummer == "500").unwrap();
        assert_eq!(m500.titel_master, "Indexierter Titel");
        assert_eq!(m500.versionen[0].version, 1);
        assert!(dataset.module.iter().all(|m| m.nummer != "999"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn failed_fetch_falls_back_to_copy_on_disk() {
        let dir = temp_dir("extract-stale");
        copy_fixture(&dir, "modul-106-v3.html", "modul-106-v3.html");
        // Left over from an earlier run; this run's download failed.
        copy_fixture(&dir, "modul-117-v2.html", "modul-117-v2.html");

        let index = FetchIndex {
            run_id: "test".into(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            summary: FetchSummary::default(),
            entries: vec![IndexEntry {
                nummer: "106".into(),
                version: 3,
                titel: "Datenbanken abfragen".into(),
                url: "https://www.modulbaukasten.ch/module/106/3/de-DE".into(),
                html_file: "modul-106-v3.html".into(),
                fetched_at: Some(Utc::now()),
            }],
            errors: vec![
                FetchFailure {
                    nummer: "117".into(),
                    version: 2,
                    url: "https://www.modulbaukasten.ch/module/117/2/de-DE".into(),
                    reason: "HTTP 503".into(),
                },
                FetchFailure {
                    nummer: "122".into(),
                    version: 1,
                    url: "https://www.modulbaukasten.ch/module/122/1/de-DE".into(),
                    reason: "timed out".into(),
                },
            ],
        };
        write_json(&dir.join(INDEX_FILE_NAME), &index).unwrap();

        let (dataset, summary) = extract_dir(&dir, "q", Utc::now()).unwrap();

        assert_eq!(summary.parsed, 2);
        assert!(dataset.module.iter().any(|m| m.nummer == "117"));

        assert_eq!(summary.stale.len(), 1);
        assert_eq!(summary.stale[0].key.as_deref(), Some("117-V2"));
        assert_eq!(summary.stale[0].reason, "stale: fetch failed: HTTP 503");

        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].key.as_deref(), Some("122-V1"));
        assert_eq!(summary.failures[0].reason, "fetch failed: timed out");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn unidentifiable_document_is_a_failure() {
        let dir = temp_dir("extract-anon");
        std::fs::write(dir.join("seite.html"), "<html><h1>Startseite</h1></html>").unwrap();
        copy_fixture(&dir, "modul-106-v3.html", "modul-106-v3.html");

        let (dataset, summary) = extract_dir(&dir, "q", Utc::now()).unwrap();
        assert_eq!(summary.parsed, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].source, "seite.html");
        assert!(summary.failures[0].key.is_none());
        assert_eq!(dataset.module.len(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn extract_to_file_writes_dataset() {
        let dir = temp_dir("extract-write");
        let out = dir.join("data").join("it-module-master.json");

        let (dataset, _) = extract_to_file(&fixture_dir(), &out, "q").unwrap();

        let written: MasterDataset =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(written, dataset);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_raw_dir_is_fatal() {
        let dir = std::env::temp_dir().join(format!("modulsync-nope-{}", Uuid::now_v7()));
        let err = extract_to_file(&dir, &dir.join("out.json"), "q").unwrap_err();
        assert!(matches!(err, ModulsyncError::Io { .. }));
    }
}
