//! HTML → [`VersionRecord`] extraction for module detail pages.
//!
//! Anchors are element names and CSS classes of the catalog's Angular
//! Material markup, never DOM positions, so layout shuffles do not break
//! extraction. Sections that are missing yield empty lists.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use modulsync_shared::{Handlungsziel, ModulsyncError, Result, VersionRecord, normalize_text};

use crate::fingerprint::content_fingerprint;

static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{2})\.(\d{2})\.(\d{4})").expect("valid regex"));

static GOAL_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\.\s*(.*)$").expect("valid regex"));

/// Knowledge sentences inside a goal panel: `1. Kennt ... .` with optional bracketed notes.
static KNOWLEDGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d+\.\s*Kennt[^.]+(?:\([^)]+\))?\.(?:\s*\([^)]+\))?").expect("valid regex")
});

/// Page heading label: `<nummer>V<version> <titel>`.
static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{3,4})\s*V(\d+)\s*(.*)$").expect("valid regex"));

static PUBLISH_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".publish").expect("valid selector"));
static PANEL_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("mat-expansion-panel, .mat-expansion-panel").expect("valid selector")
});
static PANEL_HEADER_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("mat-expansion-panel-header, .mat-expansion-panel-header")
        .expect("valid selector")
});
static PANEL_CONTENT_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".mat-expansion-panel-content").expect("valid selector")
});
static LIST_ITEM_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li").expect("valid selector"));
static CHIP_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("mat-chip, .mat-chip, .mat-mdc-chip").expect("valid selector")
});
static HEADING_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, .module-title").expect("valid selector"));

/// Who a document belongs to, as far as the caller already knows.
#[derive(Debug, Clone, Default)]
pub struct DocumentHint {
    pub nummer: Option<String>,
    pub version: Option<u32>,
    pub titel: Option<String>,
    pub url: Option<String>,
}

/// One parsed document: the module it belongs to and its version record.
#[derive(Debug, Clone)]
pub struct ExtractedVersion {
    pub nummer: String,
    pub record: VersionRecord,
}

/// Parse a module detail page.
///
/// `nummer` and `version` come from the hint when present, otherwise from the
/// page heading. A document where neither yields both is rejected.
pub fn parse_module_html(html: &str, hint: &DocumentHint) -> Result<ExtractedVersion> {
    let doc = Html::parse_document(html);
    let heading = heading_label(&doc);

    let nummer = hint
        .nummer
        .clone()
        .or_else(|| heading.as_ref().map(|h| h.0.clone()))
        .ok_or_else(|| ModulsyncError::parse("module number not found"))?;
    let version = hint
        .version
        .or_else(|| heading.as_ref().map(|h| h.1))
        .ok_or_else(|| ModulsyncError::parse("version number not found"))?;

    let titel = hint
        .titel
        .as_deref()
        .map(normalize_text)
        .filter(|t| !t.is_empty())
        .or_else(|| heading.map(|h| h.2))
        .or_else(|| first_heading_text(&doc))
        .unwrap_or_default();

    let mut record = VersionRecord {
        version,
        titel,
        publikationsdatum: publication_date(&doc),
        content_hash: None,
        handlungsziele: goals(&doc),
        berufe: professions(&doc),
        quelle_url: hint.url.clone(),
    };
    record.content_hash = Some(content_fingerprint(&record));

    debug!(
        nummer = %nummer,
        version,
        goals = record.handlungsziele.len(),
        knowledge = record.knowledge_count(),
        berufe = record.berufe.len(),
        "document parsed"
    );

    Ok(ExtractedVersion { nummer, record })
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

fn element_text(el: ElementRef<'_>) -> String {
    normalize_text(&el.text().collect::<String>())
}

/// First `dd.mm.yyyy` inside the publish block, as a calendar date.
fn publication_date(doc: &Html) -> Option<NaiveDate> {
    let text = element_text(doc.select(&PUBLISH_SEL).next()?);
    let caps = DATE_RE.captures(&text)?;
    let date = NaiveDate::from_ymd_opt(
        caps[3].parse().ok()?,
        caps[2].parse().ok()?,
        caps[1].parse().ok()?,
    );
    if date.is_none() {
        debug!(%text, "publish block holds an impossible date");
    }
    date
}

/// Goal panels: header `N. description`, body listing the knowledge items.
fn goals(doc: &Html) -> Vec<Handlungsziel> {
    let mut goals = Vec::new();

    for panel in doc.select(&PANEL_SEL) {
        let Some(header) = panel.select(&PANEL_HEADER_SEL).next() else {
            continue;
        };
        let header_text = element_text(header);
        let Some(caps) = GOAL_HEADER_RE.captures(&header_text) else {
            debug!(%header_text, "panel header is not a numbered goal");
            continue;
        };

        let kenntnisse = panel
            .select(&PANEL_CONTENT_SEL)
            .next()
            .map(knowledge_items)
            .unwrap_or_default();

        goals.push(Handlungsziel {
            nummer: caps[1].to_string(),
            beschreibung: caps[2].trim().to_string(),
            handlungsnotwendige_kenntnisse: kenntnisse,
        });
    }

    goals
}

/// List items when the panel body is a list, else the numbered `Kennt...` sentences.
fn knowledge_items(content: ElementRef<'_>) -> Vec<String> {
    let items: Vec<String> = content
        .select(&LIST_ITEM_SEL)
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect();
    if !items.is_empty() {
        return items;
    }

    let text = element_text(content);
    KNOWLEDGE_RE
        .find_iter(&text)
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

/// Profession chips, deduplicated in document order.
fn professions(doc: &Html) -> Vec<String> {
    let mut berufe: Vec<String> = Vec::new();
    for chip in doc.select(&CHIP_SEL) {
        let name = element_text(chip);
        if !name.is_empty() && !berufe.contains(&name) {
            berufe.push(name);
        }
    }
    berufe
}

/// `(nummer, version, titel)` from a heading that reads like `106V3 Datenbanken`.
fn heading_label(doc: &Html) -> Option<(String, u32, String)> {
    doc.select(&HEADING_SEL).find_map(|el| {
        let text = element_text(el);
        let caps = LABEL_RE.captures(&text)?;
        Some((caps[1].to_string(), caps[2].parse().ok()?, caps[3].trim().to_string()))
    })
}

fn first_heading_text(doc: &Html) -> Option<String> {
    doc.select(&HEADING_SEL)
        .map(element_text)
        .find(|t| !t.is_empty())
}
