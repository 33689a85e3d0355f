//! Per-request temp artifact tracking.
//!
//! Every filesystem path created on behalf of one request (materialized
//! inputs, intermediate re-encodes, concat manifests, the output itself) is
//! allocated through a [`TempSet`]. Releasing the set deletes every tracked
//! path exactly once; the `Drop` impl is the backstop that makes cleanup
//! unconditional on every exit path.

use std::path::{Path, PathBuf};

/// Tracks the temp artifacts of a single request.
///
/// Artifacts live in a shared directory; uniqueness comes from the
/// UUID-suffixed filenames, so no two requests ever reference the same path.
#[derive(Debug)]
pub struct TempSet {
    dir: PathBuf,
    paths: Vec<PathBuf>,
    released: bool,
}

impl TempSet {
    /// Create a set rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            paths: Vec::new(),
            released: false,
        })
    }

    /// Allocate a fresh unique path (`<prefix>-<uuid>.<ext>`) and track it.
    ///
    /// The file itself is not created; the caller writes it.
    pub fn create_path(&mut self, prefix: &str, ext: &str) -> PathBuf {
        let name = format!("{prefix}-{}.{ext}", uuid::Uuid::new_v4().simple());
        let path = self.dir.join(name);
        self.paths.push(path.clone());
        path
    }

    /// Track an externally created path for cleanup.
    pub fn track(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }

    /// Number of paths currently tracked.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether no paths are tracked.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Delete every tracked path. Idempotent: a second call (or the `Drop`
    /// backstop) is a no-op, as is removing a path that was never written.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        for path in self.paths.drain(..) {
            remove_artifact(&path);
        }
    }
}

impl Drop for TempSet {
    fn drop(&mut self) {
        self.release();
    }
}

fn remove_artifact(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!("removed temp artifact {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("failed to remove temp artifact {}: {e}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_path_is_unique_and_tracked() {
        let dir = tempfile::tempdir().unwrap();
        let mut temps = TempSet::new(dir.path()).unwrap();
        let a = temps.create_path("dl-image", "jpg");
        let b = temps.create_path("dl-image", "jpg");
        assert_ne!(a, b);
        assert_eq!(temps.len(), 2);
        assert_eq!(a.extension().unwrap(), "jpg");
    }

    #[test]
    fn release_removes_written_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut temps = TempSet::new(dir.path()).unwrap();
        let written = temps.create_path("output", "mp4");
        std::fs::write(&written, b"data").unwrap();
        // Never written; removal must still be a no-op.
        let phantom = temps.create_path("dl-audio", "mp3");

        temps.release();
        assert!(!written.exists());
        assert!(!phantom.exists());
    }

    #[test]
    fn release_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut temps = TempSet::new(dir.path()).unwrap();
        let path = temps.create_path("list", "txt");
        std::fs::write(&path, "file 'a'").unwrap();
        temps.release();
        temps.release();
        assert!(!path.exists());
    }

    #[test]
    fn drop_backstop_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let mut temps = TempSet::new(dir.path()).unwrap();
            let path = temps.create_path("norm", "mp4");
            std::fs::write(&path, b"intermediate").unwrap();
            path
        };
        assert!(!path.exists());
    }

    #[test]
    fn tracked_external_path_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let external = dir.path().join("upload-raw");
        std::fs::write(&external, b"upload").unwrap();
        let mut temps = TempSet::new(dir.path()).unwrap();
        temps.track(&external);
        temps.release();
        assert!(!external.exists());
    }
}
