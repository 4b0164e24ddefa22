//! Dated dataset backups.
//!
//! Backups are named `it-module-master-YYYY-MM-DD.json` and never overwritten.
//! Ordering comes from the parsed date in the name, not from file times or
//! string comparison; names whose date does not parse are ignored.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::{debug, info};

use modulsync_shared::{MasterDataset, ModulsyncError, Result, write_json};

const BACKUP_PREFIX: &str = "it-module-master-";

static BACKUP_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^it-module-master-(\d{4}-\d{2}-\d{2})\.json$").expect("valid regex")
});

/// A backup file and the date embedded in its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    pub date: NaiveDate,
    pub path: PathBuf,
}

/// File name of the backup for `date`.
pub fn backup_file_name(date: NaiveDate) -> String {
    format!("{BACKUP_PREFIX}{}.json", date.format("%Y-%m-%d"))
}

/// Date embedded in a backup file name, if the name is one.
pub fn parse_backup_date(file_name: &str) -> Option<NaiveDate> {
    let caps = BACKUP_NAME_RE.captures(file_name)?;
    NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").ok()
}

/// Every backup in `dir`, oldest first. A missing directory has no backups.
pub fn list_backups(dir: &Path) -> Result<Vec<Backup>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ModulsyncError::io(dir, e)),
    };

    let mut backups = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ModulsyncError::io(dir, e))?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        match parse_backup_date(&name) {
            Some(date) => backups.push(Backup {
                date,
                path: entry.path(),
            }),
            None if name.starts_with(BACKUP_PREFIX) => {
                debug!(file = %name, "ignoring backup with unparsable date");
            }
            None => {}
        }
    }

    backups.sort_by_key(|b| b.date);
    Ok(backups)
}

/// The newest backup dated strictly before `run_date`.
pub fn latest_before(dir: &Path, run_date: NaiveDate) -> Result<Option<Backup>> {
    Ok(list_backups(dir)?
        .into_iter()
        .filter(|b| b.date < run_date)
        .next_back())
}

/// Write `dataset` as the backup for `date` unless that backup already exists.
///
/// Returns the backup path and whether it was written by this call.
pub fn write_backup(dir: &Path, dataset: &MasterDataset, date: NaiveDate) -> Result<(PathBuf, bool)> {
    let path = dir.join(backup_file_name(date));
    if path.exists() {
        debug!(path = %path.display(), "backup already present");
        return Ok((path, false));
    }

    write_json(&path, dataset)?;
    info!(path = %path.display(), "backup written");
    Ok((path, true))
}
