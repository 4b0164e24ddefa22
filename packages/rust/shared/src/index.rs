//! The fetch index (`module_index.json`) shared by the fetcher and the extractor.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ModulsyncError, Result};
use crate::types::version_key;

/// File name of the index inside the raw document directory.
pub const INDEX_FILE_NAME: &str = "module_index.json";

/// Outcome of one fetch batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchIndex {
    /// Identifier of the batch (UUID v7).
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub summary: FetchSummary,
    /// Documents available on disk after this batch, sorted by key.
    pub entries: Vec<IndexEntry>,
    /// References that could not be fetched, sorted by key.
    pub errors: Vec<FetchFailure>,
}

/// Batch counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchSummary {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub elapsed_ms: u64,
}

/// A document stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub nummer: String,
    pub version: u32,
    pub titel: String,
    pub url: String,
    /// File name relative to the raw document directory.
    pub html_file: String,
    /// When the document was downloaded; `None` when it was already on disk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
}

/// A reference whose download failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchFailure {
    pub nummer: String,
    pub version: u32,
    pub url: String,
    pub reason: String,
}

impl FetchIndex {
    /// Read the index from `raw_dir`, if one has been written.
    pub fn load(raw_dir: &Path) -> Result<Option<Self>> {
        let path = raw_dir.join(INDEX_FILE_NAME);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path).map_err(|e| ModulsyncError::io(&path, e))?;
        let index = serde_json::from_str(&content).map_err(|e| {
            ModulsyncError::parse(format!("invalid {}: {e}", path.display()))
        })?;
        Ok(Some(index))
    }

    /// Version keys of every reference that could not be fetched.
    pub fn failed_keys(&self) -> HashSet<String> {
        self.errors
            .iter()
            .map(|f| version_key(&f.nummer, f.version))
            .collect()
    }
}
