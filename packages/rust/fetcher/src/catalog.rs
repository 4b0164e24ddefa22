//! Catalog overview parsing.
//!
//! The overview page renders one `app-module-grid-item` per module version.
//! Its link points at `/module/<id>/<version>/...` and its text reads
//! `<nummer>V<version><titel>`.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use modulsync_shared::{ModuleRef, normalize_text};

static HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/module/\d+/\d+/").expect("valid regex"));

static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{3,4})\s*V(\d+)\s*(.*)$").expect("valid regex"));

static ITEM_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("app-module-grid-item").expect("valid selector"));
static LINK_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));

/// Extract the deduplicated module references from the catalog overview.
///
/// The first occurrence of a `nummer`/`version` pair wins; items without a
/// recognizable link or label are skipped.
pub fn parse_catalog(html: &str, base_url: &Url) -> Vec<ModuleRef> {
    let doc = Html::parse_document(html);

    let mut seen = HashSet::new();
    let mut refs = Vec::new();

    for item in doc.select(&ITEM_SEL) {
        let Some(href) = item
            .select(&LINK_SEL)
            .next()
            .and_then(|a| a.value().attr("href"))
        else {
            continue;
        };
        let href_path = Url::parse(href)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| href.to_string());
        if !HREF_RE.is_match(&href_path) {
            debug!(href, "grid item link is not a module link");
            continue;
        }

        let label = normalize_text(&item.text().collect::<String>());
        let Some(caps) = LABEL_RE.captures(&label) else {
            debug!(%label, "grid item label not recognized");
            continue;
        };
        let Ok(version) = caps[2].parse::<u32>() else {
            continue;
        };
        let Ok(detail_url) = base_url.join(href) else {
            continue;
        };

        let module = ModuleRef {
            nummer: caps[1].to_string(),
            version,
            titel: caps[3].trim().to_string(),
            detail_url: detail_url.to_string(),
        };

        if seen.insert(module.key()) {
            refs.push(module);
        }
    }

    refs
}
