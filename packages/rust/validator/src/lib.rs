//! Completeness analysis of the master dataset.
//!
//! [`validate`] is a pure function over the dataset; [`write_report`] renders
//! the result to the plain-text validation report. Gaps are findings, not
//! errors: a dataset with gaps still validates successfully.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{info, instrument};

use modulsync_shared::{MasterDataset, Meta, Result, version_key, write_atomic};

/// Number of complete versions shown as examples.
const EXAMPLE_COUNT: usize = 3;

/// One completeness rule applied to every version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Check {
    Berufe,
    Handlungsziele,
    Kenntnisse,
    Publikationsdatum,
    ContentHash,
}

impl Check {
    /// All checks in report order.
    pub const ALL: [Check; 5] = [
        Check::Berufe,
        Check::Handlungsziele,
        Check::Kenntnisse,
        Check::Publikationsdatum,
        Check::ContentHash,
    ];

    fn label(self) -> &'static str {
        match self {
            Check::Berufe => "Berufe",
            Check::Handlungsziele => "Handlungsziele",
            Check::Kenntnisse => "Kenntnisse",
            Check::Publikationsdatum => "Publikationsdatum",
            Check::ContentHash => "Content-Hash",
        }
    }
}

/// Overall verdict derived from the completeness percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    /// 90 % or more.
    SehrGut,
    /// 70 % or more.
    Gut,
    Verbesserungswuerdig,
}

/// A complete version picked as an example for the report.
#[derive(Debug, Clone)]
pub struct Example {
    pub key: String,
    pub titel: String,
    pub publikationsdatum: String,
    pub berufe: usize,
    pub handlungsziele: usize,
    pub kenntnisse: usize,
}

/// Result of [`validate`].
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub meta: Meta,
    pub berufe: Vec<String>,
    pub total_versions: usize,
    pub complete_versions: usize,
    /// Failing version keys per check, in dataset order.
    pub gaps: BTreeMap<Check, Vec<String>>,
    /// Number of goals per version → number of versions.
    pub goal_distribution: BTreeMap<usize, usize>,
    /// Number of knowledge items per goal → number of goals.
    pub knowledge_distribution: BTreeMap<usize, usize>,
    pub examples: Vec<Example>,
    /// Meta counters that disagree with the live collections: `(name, stored, live)`.
    pub meta_mismatches: Vec<(&'static str, u64, u64)>,
}

impl ValidationReport {
    /// Share of versions passing every check, in percent (0 for an empty dataset).
    pub fn completeness_percent(&self) -> f64 {
        if self.total_versions == 0 {
            return 0.0;
        }
        self.complete_versions as f64 * 100.0 / self.total_versions as f64
    }

    /// Keys of the versions failing `check`.
    pub fn failing(&self, check: Check) -> &[String] {
        self.gaps.get(&check).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn rating(&self) -> Rating {
        let pct = self.completeness_percent();
        if pct >= 90.0 {
            Rating::SehrGut
        } else if pct >= 70.0 {
            Rating::Gut
        } else {
            Rating::Verbesserungswuerdig
        }
    }

    /// Render the plain-text report.
    pub fn render(&self) -> String {
        let rule = "=".repeat(60);
        let sub = "-".repeat(40);
        let mut lines: Vec<String> = vec![
            rule.clone(),
            "VALIDIERUNGSBERICHT".into(),
            rule.clone(),
            String::new(),
        ];

        lines.push("1. META-DATEN:".into());
        lines.push(sub.clone());
        lines.push(format!("  quelle: {}", self.meta.quelle));
        lines.push(format!("  erstellt: {}", self.meta.erstellt.to_rfc3339()));
        for (name, value) in self.meta.counters.rows() {
            lines.push(format!("  {name}: {value}"));
        }
        for (name, stored, live) in &self.meta_mismatches {
            lines.push(format!("  ⚠️  {name}: Meta {stored}, tatsächlich {live}"));
        }
        lines.push(String::new());

        lines.push("2. BERUFE:".into());
        lines.push(sub.clone());
        lines.push(format!("  Anzahl Berufe: {}", self.berufe.len()));
        lines.push(String::new());
        lines.push("  Liste der Berufe:".into());
        for (i, name) in self.berufe.iter().enumerate() {
            lines.push(format!("    {}. {name}", i + 1));
        }
        lines.push(String::new());

        lines.push("3. MODULE-ANALYSE:".into());
        lines.push(sub.clone());
        for check in Check::ALL {
            let failing = self.failing(check);
            lines.push(format!("  Module ohne {}: {}", check.label(), failing.len()));
            lines.extend(failing.iter().map(|key| format!("    - {key}")));
        }
        lines.push(String::new());

        lines.push("4. HANDLUNGSZIELE-VERTEILUNG:".into());
        lines.push(sub.clone());
        lines.push("  Anzahl HZ | Anzahl Module".into());
        for (count, versions) in &self.goal_distribution {
            lines.push(format!("  {count:9} | {versions:13}"));
        }
        lines.push(String::new());

        lines.push("5. KENNTNISSE-VERTEILUNG (pro Handlungsziel):".into());
        lines.push(sub.clone());
        lines.push("  Anzahl Kenntnisse | Anzahl Handlungsziele".into());
        for (count, goals) in &self.knowledge_distribution {
            lines.push(format!("  {count:17} | {goals:21}"));
        }
        lines.push(String::new());

        lines.push("6. BEISPIEL-MODULE (mit vollständigen Daten):".into());
        lines.push(sub.clone());
        for (i, ex) in self.examples.iter().enumerate() {
            let titel: String = ex.titel.chars().take(60).collect();
            lines.push(String::new());
            lines.push(format!("  Beispiel {}: Modul {}", i + 1, ex.key));
            lines.push(format!("    Titel: {titel}"));
            lines.push(format!("    Publikationsdatum: {}", ex.publikationsdatum));
            lines.push(format!("    Berufe: {}", ex.berufe));
            lines.push(format!("    Handlungsziele: {}", ex.handlungsziele));
            lines.push(format!("    Kenntnisse gesamt: {}", ex.kenntnisse));
        }
        lines.push(String::new());

        lines.push("7. QUALITÄTSBEWERTUNG:".into());
        lines.push(sub);
        lines.push(format!("  Vollständigkeit: {:.1}%", self.completeness_percent()));
        lines.push(format!(
            "    ({} von {} Module mit allen Daten)",
            self.complete_versions, self.total_versions
        ));
        lines.push(String::new());
        for check in Check::ALL {
            let n = self.failing(check).len();
            if n > 0 {
                lines.push(format!("  ⚠️  {n} Module ohne {}", check.label()));
            }
        }
        let verdict = match self.rating() {
            Rating::SehrGut => "✅ SEHR GUT - Datenqualität über 90%",
            Rating::Gut => "✓ GUT - Datenqualität über 70%",
            Rating::Verbesserungswuerdig => "⚠️  VERBESSERUNGSWÜRDIG - Datenqualität unter 70%",
        };
        lines.push(String::new());
        lines.push(format!("  {verdict}"));
        lines.push(String::new());
        lines.push(rule);

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}

/// Run every check over every version of `dataset`.
pub fn validate(dataset: &MasterDataset) -> ValidationReport {
    let mut gaps: BTreeMap<Check, Vec<String>> = BTreeMap::new();
    let mut goal_distribution = BTreeMap::new();
    let mut knowledge_distribution = BTreeMap::new();
    let mut examples = Vec::new();
    let mut total_versions = 0;
    let mut complete_versions = 0;

    for (master, version) in dataset.versions() {
        total_versions += 1;
        let key = version_key(&master.nummer, version.version);

        let failed: Vec<Check> = Check::ALL
            .into_iter()
            .filter(|check| match check {
                Check::Berufe => version.berufe.is_empty(),
                Check::Handlungsziele => version.handlungsziele.is_empty(),
                Check::Kenntnisse => !version.has_knowledge(),
                Check::Publikationsdatum => version.publikationsdatum.is_none(),
                Check::ContentHash => version
                    .content_hash
                    .as_deref()
                    .is_none_or(|h| h.is_empty()),
            })
            .collect();

        for check in &failed {
            gaps.entry(*check).or_default().push(key.clone());
        }

        if !version.handlungsziele.is_empty() {
            *goal_distribution.entry(version.handlungsziele.len()).or_insert(0) += 1;
        }
        for hz in &version.handlungsziele {
            *knowledge_distribution
                .entry(hz.handlungsnotwendige_kenntnisse.len())
                .or_insert(0) += 1;
        }

        if failed.is_empty() {
            complete_versions += 1;
            if examples.len() < EXAMPLE_COUNT {
                examples.push(Example {
                    key,
                    titel: master.titel_master.clone(),
                    publikationsdatum: version
                        .publikationsdatum
                        .map(|d| d.to_string())
                        .unwrap_or_default(),
                    berufe: version.berufe.len(),
                    handlungsziele: version.handlungsziele.len(),
                    kenntnisse: version.knowledge_count(),
                });
            }
        }
    }

    ValidationReport {
        meta: dataset.meta.clone(),
        berufe: dataset.berufe.iter().map(|b| b.name.clone()).collect(),
        total_versions,
        complete_versions,
        gaps,
        goal_distribution,
        knowledge_distribution,
        examples,
        meta_mismatches: dataset.meta_mismatches(),
    }
}

/// Validate `dataset` and write the rendered report to `report_path`.
#[instrument(skip_all, fields(report = %report_path.display()))]
pub fn write_report(dataset: &MasterDataset, report_path: &Path) -> Result<ValidationReport> {
    let report = validate(dataset);
    write_atomic(report_path, report.render().as_bytes())?;

    info!(
        versions = report.total_versions,
        complete = report.complete_versions,
        completeness = format!("{:.1}", report.completeness_percent()),
        "validation report written"
    );

    Ok(report)
}
