//! End-to-end composition tests against a real ffmpeg.
//!
//! Every test is skipped (with a note on stderr) when ffmpeg is not on PATH,
//! so the suite stays green on minimal CI images. Input media is synthesized
//! with lavfi sources rather than checked-in fixtures.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use framefusion::server::{create_router, AppContext};
use framefusion_av::TranscodeExecutor;
use framefusion_core::Config;

const BOUNDARY: &str = "x-framefusion-test-boundary";

fn ffmpeg() -> Option<PathBuf> {
    which::which("ffmpeg").ok()
}

fn ffprobe() -> Option<PathBuf> {
    which::which("ffprobe").ok()
}

fn real_ctx(ffmpeg: &Path, temp_dir: &Path) -> AppContext {
    let mut config = Config::default();
    config.temp_dir = temp_dir.to_path_buf();
    AppContext {
        config: Arc::new(config),
        executor: Arc::new(TranscodeExecutor::new(
            ffmpeg.to_path_buf(),
            2,
            Duration::from_secs(120),
        )),
        http: reqwest::Client::new(),
    }
}

/// Synthesize a media file with ffmpeg. Returns false when the local build
/// lacks the needed filter or encoder, in which case the caller skips.
fn synthesize(ffmpeg: &Path, args: &[&str], output: &Path) -> bool {
    Command::new(ffmpeg)
        .arg("-y")
        .args(args)
        .arg(output)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn probe_dimensions(ffprobe: &Path, file: &Path) -> Option<(u32, u32)> {
    let out = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=s=x:p=0",
        ])
        .arg(file)
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&out.stdout);
    let (w, h) = text.trim().split_once('x')?;
    Some((w.parse().ok()?, h.parse().ok()?))
}

fn probe_duration(ffprobe: &Path, file: &Path) -> Option<f64> {
    let out = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(file)
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    String::from_utf8_lossy(&out.stdout).trim().parse().ok()
}

struct MultipartBuilder {
    buf: Vec<u8>,
}

impl MultipartBuilder {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn file(mut self, name: &str, filename: &str, data: &[u8]) -> Self {
        self.buf.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; \
                 filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(b"\r\n");
        self
    }

    fn text(mut self, name: &str, value: &str) -> Self {
        self.buf.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    fn build(mut self, uri: &str) -> Request<Body> {
        self.buf
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(self.buf))
            .unwrap()
    }
}

async fn response_to_file(response: axum::response::Response, dest: &Path) -> usize {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    std::fs::write(dest, &bytes).unwrap();
    bytes.len()
}

fn artifact_count(dir: &Path) -> usize {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}

#[tokio::test]
async fn image_audio_output_tracks_the_audio_duration() {
    let Some(ffmpeg) = ffmpeg() else {
        eprintln!("ffmpeg not found, skipping");
        return;
    };
    let inputs = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();

    let image = inputs.path().join("frame.png");
    let audio = inputs.path().join("tone.wav");
    if !synthesize(
        &ffmpeg,
        &["-f", "lavfi", "-i", "color=c=red:s=320x240:d=0.1", "-frames:v", "1"],
        &image,
    ) || !synthesize(
        &ffmpeg,
        &["-f", "lavfi", "-i", "sine=frequency=440:duration=2"],
        &audio,
    ) {
        eprintln!("local ffmpeg cannot synthesize fixtures, skipping");
        return;
    }

    let app = create_router(real_ctx(&ffmpeg, work.path()));
    let request = MultipartBuilder::new()
        .file("image", "frame.png", &std::fs::read(&image).unwrap())
        .file("audio", "tone.wav", &std::fs::read(&audio).unwrap())
        .build("/image-audio");

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE].to_str().unwrap(),
        "video/mp4"
    );
    assert!(response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("output.mp4"));

    let out = inputs.path().join("result.mp4");
    assert!(response_to_file(response, &out).await > 0);
    assert_eq!(artifact_count(work.path()), 0);

    if let Some(ffprobe) = ffprobe() {
        if let Some(duration) = probe_duration(&ffprobe, &out) {
            assert!(
                (1.8..=2.6).contains(&duration),
                "expected ~2s output, got {duration}"
            );
        }
    }
}

#[tokio::test]
async fn slideshow_composes_uploaded_and_remote_images() {
    let Some(ffmpeg) = ffmpeg() else {
        eprintln!("ffmpeg not found, skipping");
        return;
    };
    let inputs = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();

    let mut frames = Vec::new();
    for color in ["red", "green", "blue"] {
        let frame = inputs.path().join(format!("{color}.png"));
        if !synthesize(
            &ffmpeg,
            &[
                "-f",
                "lavfi",
                "-i",
                &format!("color=c={color}:s=320x240:d=0.1"),
                "-frames:v",
                "1",
            ],
            &frame,
        ) {
            eprintln!("local ffmpeg cannot synthesize fixtures, skipping");
            return;
        }
        frames.push(std::fs::read(&frame).unwrap());
    }

    let remote = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blue.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(frames[2].clone()))
        .mount(&remote)
        .await;

    let app = create_router(real_ctx(&ffmpeg, work.path()));
    let request = MultipartBuilder::new()
        .file("images", "red.png", &frames[0])
        .file("images", "green.png", &frames[1])
        .text("imageUrls", &format!("{}/blue.png", remote.uri()))
        .text("duration", "1")
        .build("/slideshow");

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("slideshow.mp4"));

    let out = inputs.path().join("slideshow.mp4");
    assert!(response_to_file(response, &out).await > 0);
    assert_eq!(artifact_count(work.path()), 0);

    if let Some(ffprobe) = ffprobe() {
        if let Some(duration) = probe_duration(&ffprobe, &out) {
            // Three slides at one second each.
            assert!(
                (2.5..=3.8).contains(&duration),
                "expected ~3s slideshow, got {duration}"
            );
        }
    }
}

#[tokio::test]
async fn concat_normalizes_mismatched_sources() {
    let Some(ffmpeg) = ffmpeg() else {
        eprintln!("ffmpeg not found, skipping");
        return;
    };
    let inputs = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();

    // Deliberately different resolutions and frame rates.
    let clip_a = inputs.path().join("a.mp4");
    let clip_b = inputs.path().join("b.mp4");
    if !synthesize(
        &ffmpeg,
        &[
            "-f", "lavfi", "-i", "testsrc=duration=1:size=320x240:rate=10",
            "-c:v", "libx264", "-pix_fmt", "yuv420p",
        ],
        &clip_a,
    ) || !synthesize(
        &ffmpeg,
        &[
            "-f", "lavfi", "-i", "testsrc=duration=1:size=640x360:rate=25",
            "-c:v", "libx264", "-pix_fmt", "yuv420p",
        ],
        &clip_b,
    ) {
        eprintln!("local ffmpeg cannot synthesize fixtures, skipping");
        return;
    }

    let app = create_router(real_ctx(&ffmpeg, work.path()));
    let request = MultipartBuilder::new()
        .file("video1", "a.mp4", &std::fs::read(&clip_a).unwrap())
        .file("video2", "b.mp4", &std::fs::read(&clip_b).unwrap())
        .build("/concat-videos");

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("concatenated.mp4"));

    let out = inputs.path().join("joined.mp4");
    assert!(response_to_file(response, &out).await > 0);
    assert_eq!(artifact_count(work.path()), 0);

    if let Some(ffprobe) = ffprobe() {
        if let Some(duration) = probe_duration(&ffprobe, &out) {
            assert!(
                (1.7..=2.6).contains(&duration),
                "expected ~2s joined clip, got {duration}"
            );
        }
        // A copy-concat of the raw 320x240 and 640x360 sources would record
        // the first segment's parameter set and decode the second corrupt;
        // a uniform full-canvas output proves both segments were normalized.
        if let Some((width, height)) = probe_dimensions(&ffprobe, &out) {
            assert_eq!(
                (width, height),
                (1920, 1080),
                "joined clip is not on the uniform canvas"
            );
        }
    }
}

#[tokio::test]
async fn replace_and_background_modes_apply_different_duration_policies() {
    let Some(ffmpeg) = ffmpeg() else {
        eprintln!("ffmpeg not found, skipping");
        return;
    };
    let Some(ffprobe) = ffprobe() else {
        eprintln!("ffprobe not found, skipping");
        return;
    };
    let inputs = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();

    // Two-second video with its own audio track, plus a one-second overlay.
    let video = inputs.path().join("base.mp4");
    let overlay = inputs.path().join("overlay.wav");
    if !synthesize(
        &ffmpeg,
        &[
            "-f", "lavfi", "-i", "testsrc=duration=2:size=320x240:rate=10",
            "-f", "lavfi", "-i", "sine=frequency=220:duration=2",
            "-c:v", "libx264", "-pix_fmt", "yuv420p", "-c:a", "aac", "-shortest",
        ],
        &video,
    ) || !synthesize(
        &ffmpeg,
        &["-f", "lavfi", "-i", "sine=frequency=880:duration=1"],
        &overlay,
    ) {
        eprintln!("local ffmpeg cannot synthesize fixtures, skipping");
        return;
    }
    let video_bytes = std::fs::read(&video).unwrap();
    let overlay_bytes = std::fs::read(&overlay).unwrap();

    // Replace mode truncates at the shorter stream, so the new one-second
    // track wins.
    let app = create_router(real_ctx(&ffmpeg, work.path()));
    let request = MultipartBuilder::new()
        .file("video", "base.mp4", &video_bytes)
        .file("audio", "overlay.wav", &overlay_bytes)
        .text("mode", "replace")
        .build("/video-audio");
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let replaced = inputs.path().join("replaced.mp4");
    response_to_file(response, &replaced).await;

    // Background mode keeps the first input's duration.
    let app = create_router(real_ctx(&ffmpeg, work.path()));
    let request = MultipartBuilder::new()
        .file("video", "base.mp4", &video_bytes)
        .file("audio", "overlay.wav", &overlay_bytes)
        .text("mode", "background")
        .build("/video-audio");
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let mixed = inputs.path().join("mixed.mp4");
    response_to_file(response, &mixed).await;

    assert_eq!(artifact_count(work.path()), 0);

    let replaced_duration = probe_duration(&ffprobe, &replaced).unwrap();
    let mixed_duration = probe_duration(&ffprobe, &mixed).unwrap();
    assert!(
        (0.8..=1.5).contains(&replaced_duration),
        "replace should truncate to ~1s, got {replaced_duration}"
    );
    assert!(
        (1.7..=2.6).contains(&mixed_duration),
        "background should keep ~2s, got {mixed_duration}"
    );
}

#[tokio::test]
async fn omitted_mode_defaults_to_replace() {
    let Some(ffmpeg) = ffmpeg() else {
        eprintln!("ffmpeg not found, skipping");
        return;
    };
    let inputs = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();

    let video = inputs.path().join("base.mp4");
    let audio = inputs.path().join("tone.wav");
    if !synthesize(
        &ffmpeg,
        &[
            "-f", "lavfi", "-i", "testsrc=duration=1:size=320x240:rate=10",
            "-c:v", "libx264", "-pix_fmt", "yuv420p",
        ],
        &video,
    ) || !synthesize(
        &ffmpeg,
        &["-f", "lavfi", "-i", "sine=frequency=440:duration=1"],
        &audio,
    ) {
        eprintln!("local ffmpeg cannot synthesize fixtures, skipping");
        return;
    }

    let app = create_router(real_ctx(&ffmpeg, work.path()));
    let request = MultipartBuilder::new()
        .file("video", "base.mp4", &std::fs::read(&video).unwrap())
        .file("audio", "tone.wav", &std::fs::read(&audio).unwrap())
        .build("/video-audio");

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("video-with-audio.mp4"));
    assert_eq!(artifact_count(work.path()), 0);
}
