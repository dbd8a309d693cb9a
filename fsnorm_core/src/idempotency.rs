//! Resumability check.
//!
//! Artifacts are only ever renamed into place once complete, so the presence
//! of the output file is enough to know an entry was resolved by an earlier run.

use std::path::Path;

/// `true` when `output_path` already exists and the entry can be skipped.
pub fn already_done(output_path: &Path) -> bool {
    output_path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_existing_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wav");
        assert!(!already_done(&path));

        std::fs::write(&path, b"RIFF").unwrap();
        assert!(already_done(&path));
        assert!(!already_done(dir.path()));
    }
}
