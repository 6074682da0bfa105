//! Per-run diagnostic dump: writes intermediate artifacts to disk.
//!
//! Disabled unless `PROJECTLENS_DUMP_DIR` is set.
//!
//! **Output structure**:
//! ```text
//! {dump_dir}/{run_id}/
//!   01-extracted-text.txt
//!   02-prompt.txt
//!   03-raw-response.txt
//!   04-sanitized.json
//!   05-report.json
//!   06-balance.json
//! ```

use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Env var naming the base dump directory.
pub const DUMP_DIR_ENV: &str = "PROJECTLENS_DUMP_DIR";

/// Returns the dump directory for a run, or `None` if diagnostics are disabled.
pub fn dump_dir_for(run_id: &Uuid) -> Option<PathBuf> {
    let base = std::env::var_os(DUMP_DIR_ENV)?;
    dump_dir_in(Path::new(&base), run_id)
}

/// Create `{base}/{run_id}`. Returns `None` (with a warning) if creation fails;
/// never blocks the pipeline.
pub fn dump_dir_in(base: &Path, run_id: &Uuid) -> Option<PathBuf> {
    let dir = base.join(run_id.to_string());

    if let Err(e) = std::fs::create_dir_all(&dir) {
        tracing::warn!(
            path = %dir.display(),
            error = %e,
            "Could not create run artifact directory"
        );
        return None;
    }

    Some(dir)
}

/// Write a JSON artifact, pretty-printed. Never panics.
pub fn dump_json<T: serde::Serialize>(dir: &Path, filename: &str, value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => dump_text(dir, filename, &json),
        Err(e) => tracing::warn!(
            file = filename,
            error = %e,
            "Could not serialize run artifact"
        ),
    }
}

/// Write a text artifact (prompt, raw model response). Never panics.
pub fn dump_text(dir: &Path, filename: &str, text: &str) {
    let path = dir.join(filename);
    match std::fs::write(&path, text.as_bytes()) {
        Ok(()) => tracing::debug!(
            path = %path.display(),
            size = text.len(),
            "Run artifact saved"
        ),
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "Could not save run artifact"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_dir_in_creates_run_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let run_id = Uuid::new_v4();
        let dir = dump_dir_in(tmp.path(), &run_id).unwrap();
        assert!(dir.exists());
        assert!(dir.ends_with(run_id.to_string()));
    }

    #[test]
    fn dump_dir_in_unwritable_base_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();
        assert!(dump_dir_in(&file, &Uuid::new_v4()).is_none());
    }

    #[test]
    fn dump_json_writes_pretty_json() {
        let tmp = tempfile::tempdir().unwrap();
        dump_json(tmp.path(), "report.json", &serde_json::json!({"title": "项目"}));
        let written = std::fs::read_to_string(tmp.path().join("report.json")).unwrap();
        assert!(written.contains("\n"));
        assert!(written.contains("项目"));
    }

    #[test]
    fn dump_text_to_missing_dir_does_not_panic() {
        dump_text(Path::new("/nonexistent/dump"), "prompt.txt", "text");
    }
}
