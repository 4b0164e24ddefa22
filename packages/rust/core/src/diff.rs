//! Snapshot diff between two master datasets.
//!
//! Versions are compared by flat key (`"{nummer}-V{version}"`) and content
//! fingerprint only. The statistics table is taken from the stored meta
//! counters of both datasets as they are.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;

use modulsync_shared::{MasterDataset, MasterRecord, VersionRecord, version_key};

/// A version present in both datasets whose fingerprint differs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedVersion {
    pub key: String,
    /// Master title in the new dataset.
    pub titel: String,
    pub old_date: Option<NaiveDate>,
    pub new_date: Option<NaiveDate>,
}

/// One row of the statistics table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatRow {
    pub name: &'static str,
    pub old: u64,
    pub new: u64,
}

impl StatRow {
    pub fn difference(&self) -> i64 {
        self.new as i64 - self.old as i64
    }
}

/// Everything that changed between two datasets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetDiff {
    /// Keys only in the new dataset, ascending.
    ///
    /// Keys order numerically by module number, then version (`99-V1`,
    /// `106-V2`, `106-V10`). Reports written by earlier tooling sorted the
    /// same keys as plain strings, so list order can differ from those.
    pub added: Vec<String>,
    /// Keys only in the old dataset, ascending.
    pub removed: Vec<String>,
    /// Keys only in the old dataset whose download failed in the last fetch.
    /// They are not counted as removals.
    pub unavailable: Vec<String>,
    /// Sorted by key.
    pub changed: Vec<ChangedVersion>,
    /// Profession names new in this dataset, in discovery order.
    pub new_berufe: Vec<String>,
    pub stats: Vec<StatRow>,
}

impl DatasetDiff {
    /// Added, removed and changed versions together.
    pub fn total_changes(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }

    /// No version was added, removed or changed.
    pub fn is_unchanged(&self) -> bool {
        self.total_changes() == 0
    }

    /// Move removals listed in `failed` over to [`DatasetDiff::unavailable`].
    pub fn hold_back_unreachable(&mut self, failed: &HashSet<String>) {
        let (unavailable, removed): (Vec<String>, Vec<String>) =
            std::mem::take(&mut self.removed)
                .into_iter()
                .partition(|key| failed.contains(key));
        self.removed = removed;
        self.unavailable = unavailable;
    }
}

/// Diff `new` against the baseline `old`.
pub fn diff_datasets(old: &MasterDataset, new: &MasterDataset) -> DatasetDiff {
    let old_versions = keyed_versions(old);
    let new_versions = keyed_versions(new);

    let mut added: Vec<String> = new_versions
        .keys()
        .filter(|k| !old_versions.contains_key(*k))
        .cloned()
        .collect();
    let mut removed: Vec<String> = old_versions
        .keys()
        .filter(|k| !new_versions.contains_key(*k))
        .cloned()
        .collect();
    added.sort_by(|a, b| compare_keys(a, b));
    removed.sort_by(|a, b| compare_keys(a, b));

    let mut changed: Vec<ChangedVersion> = new_versions
        .iter()
        .filter_map(|(key, (master, version))| {
            let (_, before) = old_versions.get(key)?;
            (before.content_hash != version.content_hash).then(|| ChangedVersion {
                key: key.clone(),
                titel: master.titel_master.clone(),
                old_date: before.publikationsdatum,
                new_date: version.publikationsdatum,
            })
        })
        .collect();
    changed.sort_by(|a, b| compare_keys(&a.key, &b.key));

    let known: HashSet<&str> = old.berufe.iter().map(|b| b.name.as_str()).collect();
    let new_berufe = new
        .berufe
        .iter()
        .filter(|b| !known.contains(b.name.as_str()))
        .map(|b| b.name.clone())
        .collect();

    let stats = old
        .meta
        .counters
        .rows()
        .into_iter()
        .zip(new.meta.counters.rows())
        .map(|((name, old), (_, new))| StatRow { name, old, new })
        .collect();

    DatasetDiff {
        added,
        removed,
        unavailable: Vec::new(),
        changed,
        new_berufe,
        stats,
    }
}

fn keyed_versions(dataset: &MasterDataset) -> HashMap<String, (&MasterRecord, &VersionRecord)> {
    dataset
        .versions()
        .map(|(m, v)| (version_key(&m.nummer, v.version), (m, v)))
        .collect()
}

/// Order `106-V2` before `106-V10` and `99-V1` before `106-V1`.
fn compare_keys(a: &str, b: &str) -> Ordering {
    key_parts(a).cmp(&key_parts(b)).then_with(|| a.cmp(b))
}

fn key_parts(key: &str) -> (u64, u64) {
    let (nummer, version) = key.split_once("-V").unwrap_or((key, ""));
    (
        nummer.parse().unwrap_or(u64::MAX),
        version.parse().unwrap_or(u64::MAX),
    )
}
