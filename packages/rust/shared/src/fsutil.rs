//! Small filesystem helpers shared by every phase that persists output.

use std::path::Path;

use tracing::debug;

use crate::error::{ModulsyncError, Result};

/// Write `contents` to `path` via a temp file in the same directory and a rename,
/// so readers never observe a half-written file. Parent directories are created.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| ModulsyncError::io(parent, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = parent.join(format!(".{file_name}.tmp"));

    std::fs::write(&temp, contents).map_err(|e| ModulsyncError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| ModulsyncError::io(path, e))?;
    Ok(())
}

/// Write a JSON file (pretty-printed), atomically.
pub fn write_json<T: serde::Serialize>(path: &Path, data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| ModulsyncError::Serialization(format!("JSON serialization failed: {e}")))?;
    write_atomic(path, json.as_bytes())?;
    debug!(path = %path.display(), "wrote JSON file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_creates_parents_and_leaves_no_temp() {
        let dir = std::env::temp_dir().join(format!("modulsync-fsutil-{}", std::process::id()));
        let target = dir.join("nested").join("out.json");

        write_json(&target, &serde_json::json!({"ok": true})).expect("write");

        let content = std::fs::read_to_string(&target).expect("read back");
        assert!(content.contains("\"ok\": true"));
        assert!(!dir.join("nested").join(".out.json.tmp").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
