//! Content fingerprint of a version record.
//!
//! The hash input is a canonical serialization: every text normalized, goals
//! sorted by number then description, knowledge items and professions sorted.
//! Field and record separators are ASCII control characters that never occur
//! in normalized page text, so distinct contents cannot serialize alike.

use sha2::{Digest, Sha256};

use modulsync_shared::{VersionRecord, normalize_text};

/// Number of hex characters kept from the SHA-256 digest.
pub const FINGERPRINT_LEN: usize = 16;

const FIELD_SEP: char = '\u{1f}';
const RECORD_SEP: char = '\u{1e}';

/// Compute the fingerprint over date, goals, knowledge items and professions.
pub fn content_fingerprint(record: &VersionRecord) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_content(record).as_bytes());
    let hex = format!("{:x}", hasher.finalize());
    hex[..FINGERPRINT_LEN].to_string()
}

fn canonical_content(record: &VersionRecord) -> String {
    let mut goals: Vec<(u64, String, String, Vec<String>)> = record
        .handlungsziele
        .iter()
        .map(|hz| {
            let nummer = normalize_text(&hz.nummer);
            let mut knowledge: Vec<String> = hz
                .handlungsnotwendige_kenntnisse
                .iter()
                .map(|k| normalize_text(k))
                .collect();
            knowledge.sort();
            (
                nummer.parse().unwrap_or(u64::MAX),
                nummer,
                normalize_text(&hz.beschreibung),
                knowledge,
            )
        })
        .collect();
    goals.sort();

    let mut berufe: Vec<String> = record.berufe.iter().map(|b| normalize_text(b)).collect();
    berufe.sort();
    berufe.dedup();

    let mut out = String::new();
    out.push_str("date");
    out.push(FIELD_SEP);
    if let Some(date) = record.publikationsdatum {
        out.push_str(&date.format("%Y-%m-%d").to_string());
    }

    for (_, nummer, beschreibung, knowledge) in &goals {
        out.push(RECORD_SEP);
        out.push_str("goal");
        out.push(FIELD_SEP);
        out.push_str(nummer);
        out.push(FIELD_SEP);
        out.push_str(beschreibung);
        for item in knowledge {
            out.push(RECORD_SEP);
            out.push_str("knowledge");
            out.push(FIELD_SEP);
            out.push_str(item);
        }
    }

    for beruf in &berufe {
        out.push(RECORD_SEP);
        out.push_str("beruf");
        out.push(FIELD_SEP);
        out.push_str(beruf);
    }

    out
}
