//! Text normalization applied to everything extracted from catalog pages.

/// Trim and collapse every run of whitespace (including non-breaking spaces) to one space.
pub fn normalize_text(raw: &str) -> String {
    raw.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
