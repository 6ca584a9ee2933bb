//! Scoped scratch files
//!
//! Every intermediate file a request creates (uploaded copy, decrypted
//! copy, conversion output) is owned by a guard that deletes it on drop,
//! so cleanup happens on success, failure, timeout, and panic unwind
//! alike. Names embed a per-request UUID so concurrent requests never
//! collide in the shared temp namespace.

use std::path::{Path, PathBuf};

use uuid::Uuid;

/// A uniquely named file under the system temp directory, removed when
/// the guard is dropped.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Reserve a unique scratch path with the given suffix, e.g.
    /// `papermill_<uuid>_decrypted.pdf`. The file itself is created by
    /// whichever tool writes to it.
    pub fn in_temp(suffix: &str) -> Self {
        let path = std::env::temp_dir().join(format!("papermill_{}_{}", Uuid::new_v4(), suffix));
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            // The tool may never have written the file; nothing to clean
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove scratch file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_paths_are_unique() {
        let a = ScratchFile::in_temp("out.pdf");
        let b = ScratchFile::in_temp("out.pdf");
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn written_file_is_removed_on_drop() {
        let scratch = ScratchFile::in_temp("drop_test.pdf");
        let path = scratch.path().to_path_buf();
        std::fs::write(&path, b"data").unwrap();
        assert!(path.exists());
        drop(scratch);
        assert!(!path.exists());
    }

    #[test]
    fn dropping_an_unwritten_scratch_is_harmless() {
        let scratch = ScratchFile::in_temp("never_written.pdf");
        let path = scratch.path().to_path_buf();
        drop(scratch);
        assert!(!path.exists());
    }
}
