//! Job descriptions for the four composition recipes and their translation
//! into engine argument lists.
//!
//! A [`JobSpec`] is declarative: it names the materialized input paths and
//! recipe parameters, nothing else. The executor decides how many engine
//! invocations a job takes (Concat is three: two normalization passes plus
//! the copy-concatenation).

use std::path::{Path, PathBuf};
use std::str::FromStr;

use framefusion_core::Error;

/// Fixed output canvas width.
pub const CANVAS_WIDTH: u32 = 1920;
/// Fixed output canvas height.
pub const CANVAS_HEIGHT: u32 = 1080;

/// Frame rate every normalized concat segment is resampled to.
pub const CANVAS_FPS: u32 = 30;

/// Default per-image display time for slideshows, in seconds.
pub const DEFAULT_SLIDE_SECS: f64 = 3.0;

/// Maximum number of images accepted for one slideshow.
pub const MAX_SLIDESHOW_IMAGES: usize = 20;

/// How new audio is combined with a video's existing audio track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixMode {
    /// Drop the original audio entirely; output runs to the shorter of the
    /// two streams.
    Replace,
    /// Amplitude-mix the new audio under the original track; output audio
    /// follows the original track's length (`duration=first`), not the
    /// shorter or longer of the two. This asymmetry with `Replace` is
    /// contractual.
    Background,
}

impl FromStr for MixMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "replace" => Ok(MixMode::Replace),
            "background" => Ok(MixMode::Background),
            other => Err(Error::Validation(format!(
                "unknown mode '{other}' (expected 'replace' or 'background')"
            ))),
        }
    }
}

/// Parse a per-image slideshow duration, falling back to the default for
/// missing, non-numeric or non-positive values.
pub fn slide_duration(raw: Option<&str>) -> f64 {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(DEFAULT_SLIDE_SECS)
}

/// Declarative description of one composition job.
#[derive(Debug)]
pub enum JobSpec {
    /// Loop one still image for the full duration of an audio track.
    ImageAudio { image: PathBuf, audio: PathBuf },
    /// Show each image for a fixed number of seconds.
    Slideshow {
        images: Vec<PathBuf>,
        per_image_secs: f64,
    },
    /// Normalize each video to a canonical intermediate, then concatenate
    /// with stream copy.
    Concat { videos: Vec<PathBuf> },
    /// Combine a video with a new audio track.
    AudioMix {
        video: PathBuf,
        audio: PathBuf,
        mode: MixMode,
    },
}

impl JobSpec {
    pub fn image_audio(image: PathBuf, audio: PathBuf) -> Self {
        JobSpec::ImageAudio { image, audio }
    }

    /// Build a slideshow job. Fails if the image list is empty or exceeds
    /// [`MAX_SLIDESHOW_IMAGES`].
    pub fn slideshow(images: Vec<PathBuf>, per_image_secs: f64) -> Result<Self, Error> {
        if images.is_empty() {
            return Err(Error::Validation("slideshow requires at least one image".into()));
        }
        if images.len() > MAX_SLIDESHOW_IMAGES {
            return Err(Error::Validation(format!(
                "slideshow supports at most {MAX_SLIDESHOW_IMAGES} images (got {})",
                images.len()
            )));
        }
        Ok(JobSpec::Slideshow {
            images,
            per_image_secs,
        })
    }

    pub fn concat(first: PathBuf, second: PathBuf) -> Self {
        JobSpec::Concat {
            videos: vec![first, second],
        }
    }

    pub fn audio_mix(video: PathBuf, audio: PathBuf, mode: MixMode) -> Self {
        JobSpec::AudioMix { video, audio, mode }
    }
}

/// Scale-to-fit then center-pad onto the fixed canvas, preserving the source
/// aspect ratio.
fn scale_pad_filter() -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1",
        w = CANVAS_WIDTH,
        h = CANVAS_HEIGHT
    )
}

fn arg(s: impl Into<String>) -> String {
    s.into()
}

fn path_arg(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}

/// Still image looped under an audio track; `-shortest` ends the output with
/// the audio, not the (infinite) looped image.
pub fn image_audio_args(image: &Path, audio: &Path, output: &Path) -> Vec<String> {
    vec![
        arg("-y"),
        arg("-loop"),
        arg("1"),
        arg("-i"),
        path_arg(image),
        arg("-i"),
        path_arg(audio),
        arg("-c:v"),
        arg("libx264"),
        arg("-tune"),
        arg("stillimage"),
        arg("-preset"),
        arg("ultrafast"),
        arg("-c:a"),
        arg("aac"),
        arg("-b:a"),
        arg("192k"),
        arg("-pix_fmt"),
        arg("yuv420p"),
        arg("-vf"),
        scale_pad_filter(),
        arg("-shortest"),
        arg("-movflags"),
        arg("+faststart"),
        path_arg(output),
    ]
}

/// Slideshow from a timed concat manifest, normalized to the fixed canvas.
pub fn slideshow_args(manifest: &Path, output: &Path) -> Vec<String> {
    vec![
        arg("-y"),
        arg("-f"),
        arg("concat"),
        arg("-safe"),
        arg("0"),
        arg("-i"),
        path_arg(manifest),
        arg("-vsync"),
        arg("vfr"),
        arg("-c:v"),
        arg("libx264"),
        arg("-preset"),
        arg("ultrafast"),
        arg("-pix_fmt"),
        arg("yuv420p"),
        arg("-vf"),
        scale_pad_filter(),
        arg("-movflags"),
        arg("+faststart"),
        path_arg(output),
    ]
}

/// Re-encode one video to the canonical intermediate format: fixed canvas,
/// fixed frame rate, pinned codecs and sample rate. Copy-concatenation
/// requires matching codec parameters across segments, so every dimension a
/// source could vary in is forced here.
pub fn normalize_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        arg("-y"),
        arg("-i"),
        path_arg(input),
        arg("-c:v"),
        arg("libx264"),
        arg("-preset"),
        arg("ultrafast"),
        arg("-pix_fmt"),
        arg("yuv420p"),
        arg("-vf"),
        scale_pad_filter(),
        arg("-r"),
        arg(CANVAS_FPS.to_string()),
        arg("-c:a"),
        arg("aac"),
        arg("-ar"),
        arg("44100"),
        arg("-b:a"),
        arg("192k"),
        path_arg(output),
    ]
}

/// Join already-normalized segments without re-encoding.
pub fn concat_copy_args(manifest: &Path, output: &Path) -> Vec<String> {
    vec![
        arg("-y"),
        arg("-f"),
        arg("concat"),
        arg("-safe"),
        arg("0"),
        arg("-i"),
        path_arg(manifest),
        arg("-c"),
        arg("copy"),
        arg("-movflags"),
        arg("+faststart"),
        path_arg(output),
    ]
}

/// Replace or background-mix a video's audio track.
pub fn audio_mix_args(video: &Path, audio: &Path, mode: MixMode, output: &Path) -> Vec<String> {
    let mut args = vec![
        arg("-y"),
        arg("-i"),
        path_arg(video),
        arg("-i"),
        path_arg(audio),
    ];
    match mode {
        MixMode::Replace => {
            args.extend([
                arg("-c:v"),
                arg("copy"),
                arg("-map"),
                arg("0:v:0"),
                arg("-map"),
                arg("1:a:0"),
                arg("-c:a"),
                arg("aac"),
                arg("-b:a"),
                arg("192k"),
                arg("-shortest"),
            ]);
        }
        MixMode::Background => {
            args.extend([
                arg("-filter_complex"),
                arg("[0:a][1:a]amix=inputs=2:duration=first[aout]"),
                arg("-map"),
                arg("0:v:0"),
                arg("-map"),
                arg("[aout]"),
                arg("-c:v"),
                arg("copy"),
                arg("-c:a"),
                arg("aac"),
                arg("-b:a"),
                arg("192k"),
            ]);
        }
    }
    args.push(arg("-movflags"));
    args.push(arg("+faststart"));
    args.push(path_arg(output));
    args
}
