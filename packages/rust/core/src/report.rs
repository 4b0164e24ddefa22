//! Markdown rendering of the update report.

use chrono::NaiveDate;

use crate::diff::DatasetDiff;

/// Characters of a master title shown in the changed-versions table.
const TITLE_WIDTH: usize = 40;

/// Render `diff` as the German markdown update report.
pub fn render_update_report(diff: &DatasetDiff, previous: NaiveDate, current: NaiveDate) -> String {
    let mut lines: Vec<String> = vec![
        "# IT-Module Datenbank Update-Report".into(),
        String::new(),
        format!("**Update-Datum:** {current}"),
        format!("**Vorherige Version:** {previous}"),
        String::new(),
        "---".into(),
        String::new(),
        "## Zusammenfassung".into(),
        String::new(),
    ];

    if diff.is_unchanged() {
        lines.push("✅ **Keine Änderungen** - Datenbank ist aktuell".into());
    } else {
        lines.push(format!("📊 **{} Änderungen** erkannt:", diff.total_changes()));
        lines.push(String::new());
        lines.push(format!("- 🆕 Neue Module: {}", diff.added.len()));
        lines.push(format!("- ♻️ Geänderte Module: {}", diff.changed.len()));
        lines.push(format!("- 🗑️ Gelöschte Module: {}", diff.removed.len()));
        lines.push(format!("- 👔 Neue Berufe: {}", diff.new_berufe.len()));
    }
    if !diff.unavailable.is_empty() {
        lines.push(String::new());
        lines.push(format!(
            "⚠️ {} Module konnten nicht abgerufen werden und gelten nicht als gelöscht",
            diff.unavailable.len()
        ));
    }
    lines.extend([String::new(), "---".to_string(), String::new()]);

    lines.push("## Statistik-Vergleich".into());
    lines.push(String::new());
    lines.push("| Metrik | Vorher | Nachher | Differenz |".into());
    lines.push("|--------|--------|---------|-----------|".into());
    for row in &diff.stats {
        let difference = row.difference();
        let signed = if difference > 0 {
            format!("+{difference}")
        } else {
            difference.to_string()
        };
        lines.push(format!(
            "| {} | {} | {} | {signed} |",
            metric_label(row.name),
            row.old,
            row.new
        ));
    }
    lines.push(String::new());

    if !diff.added.is_empty() {
        lines.push("## Neue Module".into());
        lines.push(String::new());
        lines.extend(diff.added.iter().map(|key| format!("- `{key}`")));
        lines.push(String::new());
    }

    if !diff.changed.is_empty() {
        lines.push("## Geänderte Module (neues Publikationsdatum)".into());
        lines.push(String::new());
        lines.push("| Modul | Titel | Alt | Neu |".into());
        lines.push("|-------|-------|-----|-----|".into());
        for change in &diff.changed {
            let titel: String = change.titel.chars().take(TITLE_WIDTH).collect();
            lines.push(format!(
                "| `{}` | {titel} | {} | {} |",
                change.key,
                date_or_na(change.old_date),
                date_or_na(change.new_date)
            ));
        }
        lines.push(String::new());
    }

    if !diff.removed.is_empty() {
        lines.push("## Gelöschte Module".into());
        lines.push(String::new());
        lines.extend(diff.removed.iter().map(|key| format!("- `{key}`")));
        lines.push(String::new());
    }

    if !diff.unavailable.is_empty() {
        lines.push("## Nicht abrufbare Module".into());
        lines.push(String::new());
        lines.extend(diff.unavailable.iter().map(|key| format!("- `{key}`")));
        lines.push(String::new());
    }

    if !diff.new_berufe.is_empty() {
        lines.push("## Neue Berufe".into());
        lines.push(String::new());
        lines.extend(diff.new_berufe.iter().map(|name| format!("- {name}")));
        lines.push(String::new());
    }

    lines.join("\n")
}

/// `master_module` → `Master Module`.
fn metric_label(name: &str) -> String {
    name.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn date_or_na(date: Option<NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_else(|| "N/A".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::tests::dataset_100_150;
    use crate::diff::{ChangedVersion, diff_datasets};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn unchanged_report_says_so() {
        let ds = dataset_100_150();
        let text = render_update_report(&diff_datasets(&ds, &ds), date(2025, 1, 10), date(2025, 2, 1));

        assert!(text.contains("**Update-Datum:** 2025-02-01"));
        assert!(text.contains("**Vorherige Version:** 2025-01-10"));
        assert!(text.contains("✅ **Keine Änderungen**"));
        assert!(text.contains("| Master Module | 100 | 100 | 0 |"));
        assert!(text.contains("| Versionen Mit Kenntnissen | 150 | 150 | 0 |"));
        assert!(!text.contains("## Neue Module"));
        assert!(!text.contains("## Gelöschte Module"));
    }

    #[test]
    fn sections_for_each_category() {
        let old = dataset_100_150();
        let mut new = old.clone();
        new.module.remove(0);
        new.module[0].titel_master =
            "Ein sehr langer Modultitel der über vierzig Zeichen hinausgeht".into();
        new.module[0].versionen[0].content_hash = Some("other".into());
        new.module[0].versionen[0].publikationsdatum = None;
        new.berufe.push(modulsync_shared::Beruf {
            name: "Zeichner/in EFZ".into(),
        });
        new.recompute_meta();

        let text = render_update_report(&diff_datasets(&old, &new), date(2025, 1, 10), date(2025, 2, 1));

        assert!(text.contains("📊 **3 Änderungen** erkannt:"));
        assert!(text.contains("- 🗑️ Gelöschte Module: 2"));
        assert!(text.contains("| Versionen | 150 | 148 | -2 |"));
        assert!(text.contains("| Berufe | 1 | 2 | +1 |"));
        assert!(text.contains("## Gelöschte Module\n\n- `100-V1`\n- `100-V2`\n"));
        assert!(text.contains(
            "| `101-V1` | Ein sehr langer Modultitel der über vier | 2024-01-01 | N/A |"
        ));
        assert!(text.contains("## Neue Berufe\n\n- Zeichner/in EFZ\n"));
    }

    #[test]
    fn added_keys_listed() {
        let diff = DatasetDiff {
            added: vec!["106-V4".into()],
            changed: vec![ChangedVersion {
                key: "117-V2".into(),
                titel: "Netz".into(),
                old_date: None,
                new_date: Some(date(2025, 1, 1)),
            }],
            ..DatasetDiff::default()
        };
        let text = render_update_report(&diff, date(2025, 1, 1), date(2025, 1, 2));
        assert!(text.contains("## Neue Module\n\n- `106-V4`\n"));
        assert!(text.contains("| `117-V2` | Netz | N/A | 2025-01-01 |"));
    }

    #[test]
    fn unreachable_versions_get_their_own_section() {
        let diff = DatasetDiff {
            unavailable: vec!["122-V1".into()],
            ..DatasetDiff::default()
        };
        let text = render_update_report(&diff, date(2025, 1, 1), date(2025, 1, 2));
        assert!(text.contains("✅ **Keine Änderungen**"));
        assert!(text.contains("⚠️ 1 Module konnten nicht abgerufen werden"));
        assert!(text.contains("## Nicht abrufbare Module\n\n- `122-V1`\n"));
        assert!(!text.contains("## Gelöschte Module"));
    }

    #[test]
    fn labels_are_title_cased() {
        assert_eq!(metric_label("master_module"), "Master Module");
        assert_eq!(metric_label("kenntnisse"), "Kenntnisse");
    }
}
