//! Transcoding engine discovery.

use std::path::{Path, PathBuf};

use framefusion_core::{Error, Result};

/// Locate the ffmpeg binary.
///
/// A configured override path is used when it exists; otherwise `PATH` is
/// searched with [`which::which`].
pub fn find_ffmpeg(override_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = override_path {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        tracing::warn!(
            "configured ffmpeg path {} does not exist; falling back to PATH",
            path.display()
        );
    }

    which::which("ffmpeg").map_err(|_| Error::Tool {
        tool: "ffmpeg".into(),
        message: "not found in PATH (install ffmpeg or set tools.ffmpeg_path)".into(),
    })
}

/// Probe the version string of an ffmpeg binary (first line of `-version`).
pub fn ffmpeg_version(path: &Path) -> Option<String> {
    let output = std::process::Command::new(path).arg("-version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout.lines().next().map(|line| line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_override_falls_back_to_path_search() {
        let result = find_ffmpeg(Some(Path::new("/nonexistent/ffmpeg-xyz")));
        // Whether this succeeds depends on the host having ffmpeg installed;
        // either way the bogus override must not be returned.
        if let Ok(path) = result {
            assert_ne!(path, Path::new("/nonexistent/ffmpeg-xyz"));
        }
    }

    #[test]
    fn version_probe_of_non_tool_is_none() {
        assert!(ffmpeg_version(Path::new("/nonexistent/ffmpeg-xyz")).is_none());
    }
}
