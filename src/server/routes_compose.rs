//! Composition route handlers: one orchestrator per recipe.
//!
//! Every handler walks the same path: parse the body, validate slot
//! presence, materialize inputs, build the job, drive the executor, stream
//! the output. The request's [`TempSet`] drop guard makes cleanup
//! unconditional — early validation failures, download failures and engine
//! failures all release every artifact before the error response goes out.

use std::path::PathBuf;

use axum::{
    body::Body,
    extract::{Request, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tokio_util::io::ReaderStream;

use framefusion_av::{
    job::{slide_duration, JobSpec, MixMode, MAX_SLIDESHOW_IMAGES},
    TempSet,
};
use framefusion_core::Error;

use super::error::AppError;
use super::extract::FormData;
use super::AppContext;
use crate::resolve::{materialize_all, DeclaredInput};

/// GET / — static capability descriptor.
pub async fn describe() -> impl IntoResponse {
    Json(json!({
        "status": "FrameFusion service running",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "/image-audio": "POST - Combine image and audio into video",
            "/slideshow": "POST - Create slideshow from multiple images",
            "/concat-videos": "POST - Concatenate two videos",
            "/video-audio": "POST - Add audio to video (replace or background)",
        },
    }))
}

/// POST /image-audio — loop one still image for the duration of an audio
/// track.
pub async fn image_audio(
    State(ctx): State<AppContext>,
    req: Request,
) -> Result<Response, AppError> {
    let mut temps = TempSet::new(&ctx.config.temp_dir).map_err(Error::from)?;
    let form = FormData::read(req, &mut temps).await?;

    let declared = vec![
        form.input("image", "imageUrl", "image", "jpg")?,
        form.input("audio", "audioUrl", "audio", "mp3")?,
    ];
    let resolved = materialize_all(&ctx.http, declared, &mut temps).await?;
    let (image, audio) = pair(resolved)?;

    let job = JobSpec::image_audio(image, audio);
    let output = temps.create_path("output", "mp4");
    ctx.executor.run(&job, &output, &mut temps).await?;

    stream_output(output, "output.mp4", temps).await
}

/// POST /slideshow — one video from 1-20 ordered images.
pub async fn slideshow(State(ctx): State<AppContext>, req: Request) -> Result<Response, AppError> {
    let mut temps = TempSet::new(&ctx.config.temp_dir).map_err(Error::from)?;
    let form = FormData::read(req, &mut temps).await?;

    // Uploads first, then URLs; the output plays in this order.
    let mut declared: Vec<DeclaredInput> = form
        .files("images")
        .iter()
        .map(|path| DeclaredInput::uploaded("images", path.clone()))
        .collect();
    declared.extend(
        form.url_list("imageUrls")
            .into_iter()
            .map(|url| DeclaredInput::remote("images", url, "jpg")),
    );

    if declared.is_empty() {
        return Err(Error::Validation(
            "no images supplied (use 'images' files or 'imageUrls')".into(),
        )
        .into());
    }
    if declared.len() > MAX_SLIDESHOW_IMAGES {
        return Err(Error::Validation(format!(
            "at most {MAX_SLIDESHOW_IMAGES} images are accepted (got {})",
            declared.len()
        ))
        .into());
    }

    let per_image_secs = slide_duration(form.text("duration"));
    let images = materialize_all(&ctx.http, declared, &mut temps).await?;

    let job = JobSpec::slideshow(images, per_image_secs)?;
    let output = temps.create_path("slideshow", "mp4");
    ctx.executor.run(&job, &output, &mut temps).await?;

    stream_output(output, "slideshow.mp4", temps).await
}

/// POST /concat-videos — normalize two videos, then copy-concatenate them.
pub async fn concat_videos(
    State(ctx): State<AppContext>,
    req: Request,
) -> Result<Response, AppError> {
    let mut temps = TempSet::new(&ctx.config.temp_dir).map_err(Error::from)?;
    let form = FormData::read(req, &mut temps).await?;

    let declared = vec![
        form.input("video1", "video1Url", "video1", "mp4")?,
        form.input("video2", "video2Url", "video2", "mp4")?,
    ];
    let resolved = materialize_all(&ctx.http, declared, &mut temps).await?;
    let (first, second) = pair(resolved)?;

    let job = JobSpec::concat(first, second);
    let output = temps.create_path("concat", "mp4");
    ctx.executor.run(&job, &output, &mut temps).await?;

    stream_output(output, "concatenated.mp4", temps).await
}

/// POST /video-audio — replace a video's audio track or mix new audio
/// underneath it.
pub async fn video_audio(
    State(ctx): State<AppContext>,
    req: Request,
) -> Result<Response, AppError> {
    let mut temps = TempSet::new(&ctx.config.temp_dir).map_err(Error::from)?;
    let form = FormData::read(req, &mut temps).await?;

    let declared = vec![
        form.input("video", "videoUrl", "video", "mp4")?,
        form.input("audio", "audioUrl", "audio", "mp3")?,
    ];
    let resolved = materialize_all(&ctx.http, declared, &mut temps).await?;
    let (video, audio) = pair(resolved)?;

    let mode = match form.text("mode") {
        None | Some("") => MixMode::Replace,
        Some(raw) => raw.parse::<MixMode>()?,
    };

    let job = JobSpec::audio_mix(video, audio, mode);
    let output = temps.create_path("video-audio", "mp4");
    ctx.executor.run(&job, &output, &mut temps).await?;

    stream_output(output, "video-with-audio.mp4", temps).await
}

fn pair(resolved: Vec<PathBuf>) -> Result<(PathBuf, PathBuf), Error> {
    let mut iter = resolved.into_iter();
    match (iter.next(), iter.next(), iter.next()) {
        (Some(first), Some(second), None) => Ok((first, second)),
        _ => Err(Error::Internal("resolver returned wrong input count".into())),
    }
}

/// Stream the finished output as a download, then release every artifact.
///
/// The file handle is opened before the release: the unlinked file stays
/// readable through the open descriptor, so cleanup never races the
/// still-open response stream.
async fn stream_output(
    path: PathBuf,
    download_name: &str,
    mut temps: TempSet,
) -> Result<Response, AppError> {
    let file = tokio::fs::File::open(&path).await.map_err(Error::from)?;
    let len = file.metadata().await.map_err(Error::from)?.len();

    temps.release();

    let stream = ReaderStream::new(file);
    let response = Response::builder()
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(header::CONTENT_LENGTH, len)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{download_name}\""),
        )
        .body(Body::from_stream(stream))
        .map_err(|e| Error::Internal(format!("failed to build response: {e}")))?;
    Ok(response)
}
