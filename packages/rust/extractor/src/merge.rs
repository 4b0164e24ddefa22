//! Merging extracted versions into a [`MasterDataset`].

use std::collections::{HashMap, HashSet};

use tracing::warn;

use modulsync_shared::{Beruf, MasterDataset, MasterRecord, version_key};

use crate::ParseFailure;
use crate::parser::ExtractedVersion;

/// Merge `batch` into `dataset` and restore every dataset invariant.
///
/// Versions are grouped under their module number. A version that is already
/// present (from the dataset or earlier in the batch) is not overwritten: the
/// first occurrence is kept and the duplicate is returned as a failure.
/// Afterwards modules and versions are sorted, master titles refreshed, the
/// profession list rebuilt and the meta counters recomputed.
pub fn merge_into(dataset: &mut MasterDataset, batch: Vec<ExtractedVersion>) -> Vec<ParseFailure> {
    let mut failures = Vec::new();
    let mut positions: HashMap<String, usize> = dataset
        .module
        .iter()
        .enumerate()
        .map(|(i, m)| (m.nummer.clone(), i))
        .collect();

    for extracted in batch {
        let key = version_key(&extracted.nummer, extracted.record.version);
        let idx = *positions.entry(extracted.nummer.clone()).or_insert_with(|| {
            dataset.module.push(MasterRecord {
                nummer: extracted.nummer.clone(),
                titel_master: String::new(),
                versionen: Vec::new(),
            });
            dataset.module.len() - 1
        });
        let master = &mut dataset.module[idx];

        if master
            .versionen
            .iter()
            .any(|v| v.version == extracted.record.version)
        {
            warn!(%key, "duplicate version, keeping first occurrence");
            failures.push(ParseFailure {
                source: extracted
                    .record
                    .quelle_url
                    .clone()
                    .unwrap_or_else(|| key.clone()),
                key: Some(key),
                reason: "duplicate version".into(),
            });
            continue;
        }

        master.versionen.push(extracted.record);
    }

    normalize(dataset);
    failures
}

/// Sort, refresh titles, rebuild professions, recompute meta.
fn normalize(dataset: &mut MasterDataset) {
    for master in &mut dataset.module {
        master.versionen.sort_by_key(|v| v.version);
        if let Some(newest) = master.versionen.iter().rev().find(|v| !v.titel.is_empty()) {
            master.titel_master = newest.titel.clone();
        }
    }
    dataset
        .module
        .sort_by(|a, b| numeric_key(&a.nummer).cmp(&numeric_key(&b.nummer)));

    let berufe: Vec<Beruf> = {
        let mut seen = HashSet::new();
        dataset
            .versions()
            .flat_map(|(_, v)| v.berufe.iter())
            .filter(|name| seen.insert(name.as_str()))
            .map(|name| Beruf { name: name.clone() })
            .collect()
    };
    dataset.berufe = berufe;

    dataset.recompute_meta();
}

fn numeric_key(nummer: &str) -> (u64, &str) {
    (nummer.parse().unwrap_or(u64::MAX), nummer)
}
