//! Loading and saving master datasets.

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, warn};

use modulsync_shared::{MasterDataset, ModulsyncError, Result, version_key, write_json};

/// Load the dataset at `path`.
///
/// Unparsable JSON, missing meta counters, malformed version records and
/// repeated module numbers or version keys are [`ModulsyncError::Integrity`]
/// errors. Stale meta counters are only logged; the validator reports them.
pub fn load_dataset(path: &Path) -> Result<MasterDataset> {
    let json = std::fs::read_to_string(path).map_err(|e| ModulsyncError::io(path, e))?;
    let dataset: MasterDataset =
        serde_json::from_str(&json).map_err(|e| ModulsyncError::integrity(path, e.to_string()))?;
    check_unique_keys(path, &dataset)?;

    for (name, stored, live) in dataset.meta_mismatches() {
        warn!(path = %path.display(), counter = name, stored, live, "meta counter out of date");
    }
    debug!(
        path = %path.display(),
        versions = dataset.meta.counters.anzahl_versionen_total,
        "dataset loaded"
    );

    Ok(dataset)
}

/// Every `nummer` and every version key may occur once.
fn check_unique_keys(path: &Path, dataset: &MasterDataset) -> Result<()> {
    let mut numbers = HashSet::new();
    let mut keys = HashSet::new();
    for master in &dataset.module {
        if !numbers.insert(master.nummer.as_str()) {
            return Err(ModulsyncError::integrity(
                path,
                format!("module {} appears more than once", master.nummer),
            ));
        }
        for version in &master.versionen {
            let key = version_key(&master.nummer, version.version);
            if !keys.insert(key.clone()) {
                return Err(ModulsyncError::integrity(
                    path,
                    format!("version {key} appears more than once"),
                ));
            }
        }
    }
    Ok(())
}

/// Write `dataset` to `path` as pretty JSON, atomically.
pub fn save_dataset(path: &Path, dataset: &MasterDataset) -> Result<()> {
    write_json(path, dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::tests::version;
    use chrono::{NaiveDate, Utc};
    use modulsync_shared::MasterRecord;
    use std::path::PathBuf;

    fn temp_dir(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!("modulsync-{label}-{}", uuid::Uuid::now_v7()))
    }

    #[test]
    fn save_then_load() {
        let dir = temp_dir("store");
        let path = dir.join("it-module-master.json");
        let ds = MasterDataset::empty("https://www.modulbaukasten.ch", Utc::now());

        save_dataset(&path, &ds).unwrap();
        assert_eq!(load_dataset(&path).unwrap(), ds);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn broken_json_is_an_integrity_error() {
        let dir = temp_dir("store-broken");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("broken.json");

        std::fs::write(&path, "{\"meta\": {").unwrap();
        assert!(matches!(
            load_dataset(&path),
            Err(ModulsyncError::Integrity { .. })
        ));

        std::fs::write(
            &path,
            r#"{"meta": {"quelle": "x", "erstellt": "2025-01-10T08:00:00Z"}, "berufe": [], "module": []}"#,
        )
        .unwrap();
        let err = load_dataset(&path).unwrap_err();
        assert!(matches!(err, ModulsyncError::Integrity { .. }));
        assert!(err.to_string().contains("anzahl_"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_dataset(&temp_dir("store-missing").join("none.json")).unwrap_err();
        assert!(matches!(err, ModulsyncError::Io { .. }));
    }

    fn with_masters(masters: Vec<MasterRecord>) -> MasterDataset {
        let mut ds = MasterDataset::empty("https://www.modulbaukasten.ch", Utc::now());
        ds.module = masters;
        ds.recompute_meta();
        ds
    }

    fn master(nummer: &str, versionen: Vec<modulsync_shared::VersionRecord>) -> MasterRecord {
        MasterRecord {
            nummer: nummer.into(),
            titel_master: format!("Modul {nummer}"),
            versionen,
        }
    }

    #[test]
    fn repeated_module_number_is_rejected() {
        let dir = temp_dir("store-dup-master");
        let path = dir.join("it-module-master.json");
        let ds = with_masters(vec![
            master("100", vec![version(1, "aaaa")]),
            master("100", vec![version(1, "bbbb")]),
        ]);
        save_dataset(&path, &ds).unwrap();

        let err = load_dataset(&path).unwrap_err();
        assert!(matches!(err, ModulsyncError::Integrity { .. }));
        assert!(err.to_string().contains("module 100"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn repeated_version_is_rejected() {
        let dir = temp_dir("store-dup-version");
        let path = dir.join("it-module-master.json");
        let ds = with_masters(vec![master("100", vec![version(1, "aaaa"), version(1, "bbbb")])]);
        save_dataset(&path, &ds).unwrap();

        let err = load_dataset(&path).unwrap_err();
        assert!(matches!(err, ModulsyncError::Integrity { .. }));
        assert!(err.to_string().contains("100-V1"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn backup_without_utc_offset_loads() {
        let dir = temp_dir("store-naive");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("it-module-master-2025-01-10.json");
        std::fs::write(
            &path,
            r#"{
  "meta": {
    "quelle": "https://www.modulbaukasten.ch",
    "erstellt": "2025-01-10T08:00:00.123456",
    "anzahl_master_module": 0,
    "anzahl_versionen_total": 0,
    "anzahl_berufe": 0,
    "anzahl_handlungsziele_total": 0,
    "anzahl_kenntnisse_total": 0,
    "versionen_mit_kenntnissen": 0
  },
  "berufe": [],
  "module": []
}"#,
        )
        .unwrap();

        let ds = load_dataset(&path).unwrap();
        assert_eq!(ds.run_date(), NaiveDate::from_ymd_opt(2025, 1, 10).unwrap());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
