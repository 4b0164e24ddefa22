//! Core domain types: the master dataset and the catalog references it is built from.
//!
//! Field names follow the JSON document consumed downstream (`module`,
//! `versionen`, `handlungsziele`, ...), so they stay in the catalog's language.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Base URL of the module catalog.
pub const DEFAULT_SOURCE_URL: &str = "https://www.modulbaukasten.ch";

/// Flat key identifying one version across datasets: `"{nummer}-V{version}"`.
pub fn version_key(nummer: &str, version: u32) -> String {
    format!("{nummer}-V{version}")
}

// ---------------------------------------------------------------------------
// ModuleRef
// ---------------------------------------------------------------------------

/// One entry of the catalog overview: which module version to fetch and from where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRef {
    /// Natural key of the module (e.g. `"106"`).
    pub nummer: String,
    /// Version number within the module.
    pub version: u32,
    /// Title as listed in the catalog.
    pub titel: String,
    /// Absolute URL of the module's detail page.
    pub detail_url: String,
}

impl ModuleRef {
    /// Deterministic file name of the raw document for this reference.
    pub fn html_file(&self) -> String {
        format!("modul-{}-v{}.html", self.nummer, self.version)
    }

    /// Flat version key, see [`version_key`].
    pub fn key(&self) -> String {
        version_key(&self.nummer, self.version)
    }
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// Root container written to `it-module-master.json` and to every backup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterDataset {
    pub meta: Meta,
    pub berufe: Vec<Beruf>,
    pub module: Vec<MasterRecord>,
}

/// Dataset header: provenance plus the precomputed counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    /// Catalog the data was extracted from.
    pub quelle: String,
    /// When this dataset was produced.
    #[serde(deserialize_with = "de_timestamp")]
    pub erstellt: DateTime<Utc>,
    #[serde(flatten)]
    pub counters: MetaCounters,
}

/// The six aggregate counters. Must always equal the live collection sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaCounters {
    pub anzahl_master_module: u64,
    pub anzahl_versionen_total: u64,
    pub anzahl_berufe: u64,
    pub anzahl_handlungsziele_total: u64,
    pub anzahl_kenntnisse_total: u64,
    pub versionen_mit_kenntnissen: u64,
}

impl MetaCounters {
    /// Counters as `(name, value)` rows in report order.
    pub fn rows(&self) -> [(&'static str, u64); 6] {
        [
            ("master_module", self.anzahl_master_module),
            ("versionen", self.anzahl_versionen_total),
            ("berufe", self.anzahl_berufe),
            ("handlungsziele", self.anzahl_handlungsziele_total),
            ("kenntnisse", self.anzahl_kenntnisse_total),
            ("versionen_mit_kenntnissen", self.versionen_mit_kenntnissen),
        ]
    }
}

/// A profession; identity is the name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Beruf {
    pub name: String,
}

/// A catalog module with all of its known versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterRecord {
    pub nummer: String,
    /// Title of the newest version.
    pub titel_master: String,
    /// Versions ordered by version number.
    pub versionen: Vec<VersionRecord>,
}

/// One dated revision of a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    #[serde(deserialize_with = "de_version_number")]
    pub version: u32,
    #[serde(default)]
    pub titel: String,
    #[serde(default)]
    pub publikationsdatum: Option<NaiveDate>,
    /// Content fingerprint; the only signal used for change detection.
    #[serde(default)]
    pub content_hash: Option<String>,
    #[serde(default)]
    pub handlungsziele: Vec<Handlungsziel>,
    #[serde(default)]
    pub berufe: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quelle_url: Option<String>,
}

/// A goal statement with its required-knowledge items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handlungsziel {
    pub nummer: String,
    pub beschreibung: String,
    #[serde(default)]
    pub handlungsnotwendige_kenntnisse: Vec<String>,
}

/// Accept both `3` and `"3"`; older datasets stored version numbers as strings.
fn de_version_number<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid version number {s:?}"))),
    }
}

/// RFC 3339, or an ISO timestamp without offset (read as UTC) as found in
/// older backups, e.g. `2025-01-10T08:00:00.123456`.
fn de_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(stamp) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(stamp.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| serde::de::Error::custom(format!("invalid timestamp {raw:?}")))
}

impl VersionRecord {
    /// Total knowledge items across all goals.
    pub fn knowledge_count(&self) -> usize {
        self.handlungsziele
            .iter()
            .map(|hz| hz.handlungsnotwendige_kenntnisse.len())
            .sum()
    }

    pub fn has_knowledge(&self) -> bool {
        self.knowledge_count() > 0
    }
}

impl MasterDataset {
    /// An empty dataset stamped with `erstellt`; counters are zero.
    pub fn empty(quelle: impl Into<String>, erstellt: DateTime<Utc>) -> Self {
        Self {
            meta: Meta {
                quelle: quelle.into(),
                erstellt,
                counters: MetaCounters::default(),
            },
            berufe: Vec::new(),
            module: Vec::new(),
        }
    }

    /// Date the dataset was produced (UTC).
    pub fn run_date(&self) -> NaiveDate {
        self.meta.erstellt.date_naive()
    }

    /// Iterate every `(master, version)` pair in dataset order.
    pub fn versions(&self) -> impl Iterator<Item = (&MasterRecord, &VersionRecord)> {
        self.module
            .iter()
            .flat_map(|m| m.versionen.iter().map(move |v| (m, v)))
    }

    /// Count the live collections.
    pub fn live_counters(&self) -> MetaCounters {
        let mut counters = MetaCounters {
            anzahl_master_module: self.module.len() as u64,
            anzahl_berufe: self.berufe.len() as u64,
            ..MetaCounters::default()
        };
        for (_, version) in self.versions() {
            counters.anzahl_versionen_total += 1;
            counters.anzahl_handlungsziele_total += version.handlungsziele.len() as u64;
            let knowledge = version.knowledge_count() as u64;
            counters.anzahl_kenntnisse_total += knowledge;
            if knowledge > 0 {
                counters.versionen_mit_kenntnissen += 1;
            }
        }
        counters
    }

    /// Overwrite the stored counters with the live counts.
    pub fn recompute_meta(&mut self) {
        self.meta.counters = self.live_counters();
    }

    /// Counters whose stored value disagrees with the live count: `(name, stored, live)`.
    pub fn meta_mismatches(&self) -> Vec<(&'static str, u64, u64)> {
        let live = self.live_counters().rows();
        self.meta
            .counters
            .rows()
            .into_iter()
            .zip(live)
            .filter(|((_, stored), (_, actual))| stored != actual)
            .map(|((name, stored), (_, actual))| (name, stored, actual))
            .collect()
    }
}
