//! The differ/reporter phase: baseline selection, diff, report and backup.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{info, instrument};

use modulsync_shared::{FetchIndex, PathsConfig, Result, write_atomic};

use crate::backup::{latest_before, write_backup};
use crate::diff::{DatasetDiff, diff_datasets};
use crate::report::render_update_report;
use crate::store::load_dataset;

/// What the update phase did.
#[derive(Debug)]
pub enum UpdateOutcome {
    /// No earlier backup existed; the dataset became the baseline.
    FirstVersion { run_date: NaiveDate, backup: PathBuf },
    /// The dataset was diffed against a baseline and a report written.
    Updated(UpdateSummary),
}

/// Result of a diffing run.
#[derive(Debug)]
pub struct UpdateSummary {
    pub run_date: NaiveDate,
    pub previous_date: NaiveDate,
    pub baseline: PathBuf,
    pub report_path: PathBuf,
    pub backup: PathBuf,
    /// `false` when the backup for `run_date` already existed.
    pub backup_written: bool,
    pub diff: DatasetDiff,
}

/// Path of the update report for `date`.
pub fn report_file(report_dir: &Path, date: NaiveDate) -> PathBuf {
    report_dir.join(format!("UPDATE-REPORT-{}.md", date.format("%Y-%m-%d")))
}

/// Diff the working dataset against the newest earlier backup.
///
/// The run date is the creation date of the working dataset. Both datasets
/// are loaded before anything is written, so an integrity error leaves the
/// report and backup directories untouched. Re-running on the same date
/// rewrites the same report and keeps the existing backup. Versions whose
/// download failed in the last fetch are listed as unavailable, not removed.
#[instrument(skip_all, fields(dataset = %paths.dataset_path.display()))]
pub fn update_report(paths: &PathsConfig) -> Result<UpdateOutcome> {
    let current = load_dataset(&paths.dataset_path)?;
    let run_date = current.run_date();

    let Some(baseline) = latest_before(&paths.backup_dir, run_date)? else {
        let (backup, written) = write_backup(&paths.backup_dir, &current, run_date)?;
        info!(
            %run_date,
            backup = %backup.display(),
            written,
            "no earlier backup, dataset stored as first version"
        );
        return Ok(UpdateOutcome::FirstVersion { run_date, backup });
    };

    let previous = load_dataset(&baseline.path)?;
    let mut diff = diff_datasets(&previous, &current);
    if let Some(index) = FetchIndex::load(&paths.raw_dir)? {
        diff.hold_back_unreachable(&index.failed_keys());
    }
    info!(
        %run_date,
        previous = %baseline.date,
        added = diff.added.len(),
        changed = diff.changed.len(),
        removed = diff.removed.len(),
        unavailable = diff.unavailable.len(),
        new_berufe = diff.new_berufe.len(),
        "datasets compared"
    );

    let report_path = report_file(&paths.report_dir, run_date);
    let markdown = render_update_report(&diff, baseline.date, run_date);
    write_atomic(&report_path, markdown.as_bytes())?;
    info!(path = %report_path.display(), "update report written");

    let (backup, backup_written) = write_backup(&paths.backup_dir, &current, run_date)?;

    Ok(UpdateOutcome::Updated(UpdateSummary {
        run_date,
        previous_date: baseline.date,
        baseline: baseline.path,
        report_path,
        backup,
        backup_written,
        diff,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::{backup_file_name, list_backups};
    use crate::diff::tests::{dataset_100_150, version};
    use crate::store::save_dataset;
    use chrono::{TimeZone, Utc};
    use modulsync_shared::{
        FetchFailure, FetchSummary, INDEX_FILE_NAME, MasterDataset, ModulsyncError, write_json,
    };

    fn workspace() -> PathsConfig {
        let root = std::env::temp_dir().join(format!("modulsync-update-{}", uuid::Uuid::now_v7()));
        PathsConfig::default().rooted_at(&root)
    }

    fn cleanup(paths: &PathsConfig) {
        if let Some(root) = paths.dataset_path.parent().and_then(Path::parent) {
            let _ = std::fs::remove_dir_all(root);
        }
    }

    fn dated(mut ds: MasterDataset, y: i32, m: u32, d: u32) -> MasterDataset {
        ds.meta.erstellt = Utc.with_ymd_and_hms(y, m, d, 8, 0, 0).unwrap();
        ds
    }

    #[test]
    fn first_run_seeds_the_baseline() {
        let paths = workspace();
        save_dataset(&paths.dataset_path, &dated(dataset_100_150(), 2025, 1, 10)).unwrap();

        let outcome = update_report(&paths).unwrap();
        let UpdateOutcome::FirstVersion { run_date, backup } = outcome else {
            panic!("expected first version, got {outcome:?}");
        };
        assert_eq!(run_date, NaiveDate::from_ymd_opt(2025, 1, 10).unwrap());
        assert!(backup.ends_with("it-module-master-2025-01-10.json"));
        assert!(backup.exists());
        assert!(!paths.report_dir.exists());

        cleanup(&paths);
    }

    #[test]
    fn later_run_reports_against_baseline() {
        let paths = workspace();
        save_dataset(&paths.dataset_path, &dated(dataset_100_150(), 2025, 1, 10)).unwrap();
        update_report(&paths).unwrap();

        let mut next = dated(dataset_100_150(), 2025, 2, 1);
        next.module[0].versionen.push(version(3, "neu"));
        next.module[1].versionen[0].content_hash = Some("anders".into());
        next.recompute_meta();
        save_dataset(&paths.dataset_path, &next).unwrap();

        let UpdateOutcome::Updated(summary) = update_report(&paths).unwrap() else {
            panic!("expected a diff");
        };
        assert_eq!(summary.previous_date, NaiveDate::from_ymd_opt(2025, 1, 10).unwrap());
        assert_eq!(summary.diff.added, ["100-V3"]);
        assert_eq!(summary.diff.changed[0].key, "101-V1");
        assert!(summary.backup_written);
        assert!(summary.report_path.ends_with("UPDATE-REPORT-2025-02-01.md"));

        let text = std::fs::read_to_string(&summary.report_path).unwrap();
        assert!(text.contains("- `100-V3`"));
        assert!(text.contains("| Versionen | 150 | 151 | +1 |"));
        assert_eq!(list_backups(&paths.backup_dir).unwrap().len(), 2);

        cleanup(&paths);
    }

    #[test]
    fn same_day_rerun_is_idempotent() {
        let paths = workspace();
        save_dataset(&paths.dataset_path, &dated(dataset_100_150(), 2025, 1, 10)).unwrap();
        update_report(&paths).unwrap();

        let mut next = dated(dataset_100_150(), 2025, 2, 1);
        next.module.pop();
        next.recompute_meta();
        save_dataset(&paths.dataset_path, &next).unwrap();

        let UpdateOutcome::Updated(first) = update_report(&paths).unwrap() else {
            panic!("expected a diff");
        };
        let report = std::fs::read_to_string(&first.report_path).unwrap();
        let backup = std::fs::read_to_string(&first.backup).unwrap();

        let UpdateOutcome::Updated(second) = update_report(&paths).unwrap() else {
            panic!("expected a diff");
        };
        assert!(!second.backup_written);
        assert_eq!(second.previous_date, first.previous_date);
        assert_eq!(second.diff, first.diff);
        assert_eq!(std::fs::read_to_string(&second.report_path).unwrap(), report);
        assert_eq!(std::fs::read_to_string(&second.backup).unwrap(), backup);

        cleanup(&paths);
    }

    #[test]
    fn unchanged_dataset_reports_no_changes() {
        let paths = workspace();
        let baseline = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        save_dataset(
            &paths.backup_dir.join(backup_file_name(baseline)),
            &dated(dataset_100_150(), 2025, 1, 10),
        )
        .unwrap();
        save_dataset(&paths.dataset_path, &dated(dataset_100_150(), 2025, 1, 11)).unwrap();

        let UpdateOutcome::Updated(summary) = update_report(&paths).unwrap() else {
            panic!("expected a diff");
        };
        assert!(summary.diff.is_unchanged());
        let text = std::fs::read_to_string(&summary.report_path).unwrap();
        assert!(text.contains("Keine Änderungen"));

        cleanup(&paths);
    }

    #[test]
    fn failed_fetch_is_not_reported_as_deleted() {
        let paths = workspace();
        save_dataset(&paths.dataset_path, &dated(dataset_100_150(), 2025, 1, 10)).unwrap();
        update_report(&paths).unwrap();

        let mut next = dated(dataset_100_150(), 2025, 2, 1);
        next.module.truncate(98);
        next.recompute_meta();
        save_dataset(&paths.dataset_path, &next).unwrap();

        let index = FetchIndex {
            run_id: "run".into(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            summary: FetchSummary::default(),
            entries: vec![],
            errors: vec![FetchFailure {
                nummer: "199".into(),
                version: 1,
                url: "https://www.modulbaukasten.ch/module/199/1/de-DE".into(),
                reason: "HTTP 503".into(),
            }],
        };
        write_json(&paths.raw_dir.join(INDEX_FILE_NAME), &index).unwrap();

        let UpdateOutcome::Updated(summary) = update_report(&paths).unwrap() else {
            panic!("expected a diff");
        };
        assert_eq!(summary.diff.removed, ["198-V1"]);
        assert_eq!(summary.diff.unavailable, ["199-V1"]);
        let text = std::fs::read_to_string(&summary.report_path).unwrap();
        assert!(text.contains("## Gelöschte Module\n\n- `198-V1`\n\n"));
        assert!(text.contains("## Nicht abrufbare Module\n\n- `199-V1`\n"));

        cleanup(&paths);
    }

    #[test]
    fn malformed_dataset_aborts_before_writing() {
        let paths = workspace();
        std::fs::create_dir_all(paths.dataset_path.parent().unwrap()).unwrap();
        std::fs::write(
            &paths.dataset_path,
            r#"{"meta": {"quelle": "x", "erstellt": "2025-02-01T08:00:00Z"}, "berufe": [], "module": []}"#,
        )
        .unwrap();

        let err = update_report(&paths).unwrap_err();
        assert!(matches!(err, ModulsyncError::Integrity { .. }));
        assert!(!paths.backup_dir.exists());
        assert!(!paths.report_dir.exists());

        cleanup(&paths);
    }

    #[test]
    fn malformed_baseline_aborts_before_writing() {
        let paths = workspace();
        std::fs::create_dir_all(&paths.backup_dir).unwrap();
        std::fs::write(paths.backup_dir.join("it-module-master-2025-01-10.json"), "[1, 2").unwrap();
        save_dataset(&paths.dataset_path, &dated(dataset_100_150(), 2025, 2, 1)).unwrap();

        assert!(matches!(
            update_report(&paths),
            Err(ModulsyncError::Integrity { .. })
        ));
        assert!(!paths.report_dir.exists());
        assert_eq!(list_backups(&paths.backup_dir).unwrap().len(), 1);

        cleanup(&paths);
    }
}
