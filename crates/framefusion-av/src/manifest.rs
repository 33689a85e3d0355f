//! Concat-demuxer manifest rendering.
//!
//! The engine's concat mode consumes a text manifest of `file '<path>'`
//! lines, each optionally followed by `duration <seconds>`. Paths are written
//! verbatim; callers must hand in absolute, already-materialized paths (the
//! manifest is read with `-safe 0`).

use std::path::PathBuf;

#[derive(Debug)]
struct Entry {
    path: PathBuf,
    duration: Option<f64>,
}

/// Ordered list of local files to be concatenated.
#[derive(Debug, Default)]
pub struct ConcatManifest {
    entries: Vec<Entry>,
}

impl ConcatManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a file with no duration directive (video concatenation).
    pub fn push(&mut self, path: impl Into<PathBuf>) {
        self.entries.push(Entry {
            path: path.into(),
            duration: None,
        });
    }

    /// Append a file shown for `seconds` (slideshow frames).
    pub fn push_timed(&mut self, path: impl Into<PathBuf>, seconds: f64) {
        self.entries.push(Entry {
            path: path.into(),
            duration: Some(seconds),
        });
    }

    /// Render the manifest text.
    ///
    /// When any entry carries a duration, the final file line is repeated
    /// without a duration: the concat demuxer only honors the last `duration`
    /// directive if one more `file` line follows it. That trailing entry is
    /// never played.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&format!("file '{}'\n", entry.path.display()));
            if let Some(seconds) = entry.duration {
                out.push_str(&format!("duration {seconds}\n"));
            }
        }
        if self.entries.iter().any(|e| e.duration.is_some()) {
            if let Some(last) = self.entries.last() {
                out.push_str(&format!("file '{}'\n", last.path.display()));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slideshow_manifest_repeats_final_file() {
        let mut manifest = ConcatManifest::new();
        manifest.push_timed("/tmp/a.jpg", 2.0);
        manifest.push_timed("/tmp/b.jpg", 2.0);
        let text = manifest.render();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "file '/tmp/a.jpg'",
                "duration 2",
                "file '/tmp/b.jpg'",
                "duration 2",
                "file '/tmp/b.jpg'",
            ]
        );
    }

    #[test]
    fn fractional_durations_are_preserved() {
        let mut manifest = ConcatManifest::new();
        manifest.push_timed("/tmp/a.jpg", 2.5);
        let text = manifest.render();
        assert!(text.contains("duration 2.5\n"));
    }

    #[test]
    fn concat_manifest_has_no_duration_lines() {
        let mut manifest = ConcatManifest::new();
        manifest.push("/tmp/one.mp4");
        manifest.push("/tmp/two.mp4");
        let text = manifest.render();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["file '/tmp/one.mp4'", "file '/tmp/two.mp4'"]);
    }

    #[test]
    fn single_image_manifest_still_repeats() {
        let mut manifest = ConcatManifest::new();
        manifest.push_timed("/tmp/only.png", 3.0);
        let lines_count = manifest.render().lines().count();
        // file + duration + trailing repeat
        assert_eq!(lines_count, 3);
    }

    #[test]
    fn empty_manifest_renders_empty() {
        assert_eq!(ConcatManifest::new().render(), "");
    }
}
