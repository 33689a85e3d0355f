//! Bounded async driver for the external transcoding engine.
//!
//! One [`TranscodeExecutor::run`] call yields exactly one terminal outcome
//! per job: `Ok` once the engine finishes, or an error carrying the engine's
//! stderr verbatim. There is no retry and no mid-job cancellation. A
//! fixed-size semaphore gates every engine invocation so concurrent requests
//! cannot oversubscribe CPU and disk.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::Semaphore;

use framefusion_core::{Error, Result};

use crate::job::{self, JobSpec};
use crate::manifest::ConcatManifest;
use crate::tempset::TempSet;

/// Drives ffmpeg for one job description at a time per permit.
pub struct TranscodeExecutor {
    ffmpeg: PathBuf,
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl TranscodeExecutor {
    /// Create an executor using the given ffmpeg binary, allowing at most
    /// `max_concurrent` simultaneous engine invocations.
    pub fn new(ffmpeg: PathBuf, max_concurrent: usize, timeout: Duration) -> Self {
        Self {
            ffmpeg,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            timeout,
        }
    }

    /// Run one job to completion, writing the result to `output`.
    ///
    /// Intermediate artifacts (concat manifests, normalized re-encodes) are
    /// allocated through `temps`, so they are cleaned up with the rest of
    /// the request whatever the outcome.
    pub async fn run(&self, job: &JobSpec, output: &Path, temps: &mut TempSet) -> Result<()> {
        match job {
            JobSpec::ImageAudio { image, audio } => {
                self.invoke(job::image_audio_args(image, audio, output)).await
            }
            JobSpec::Slideshow {
                images,
                per_image_secs,
            } => {
                let mut manifest = ConcatManifest::new();
                for image in images {
                    manifest.push_timed(image, *per_image_secs);
                }
                let list = temps.create_path("slideshow-list", "txt");
                tokio::fs::write(&list, manifest.render()).await?;
                self.invoke(job::slideshow_args(&list, output)).await
            }
            JobSpec::Concat { videos } => {
                // Phase 1: normalize every segment to matching codec
                // parameters. The copy-concat below silently produces a
                // broken file for mismatched segments, so this phase is a
                // correctness requirement, not an optimization.
                let parts: Vec<PathBuf> = videos
                    .iter()
                    .map(|_| temps.create_path("concat-norm", "mp4"))
                    .collect();
                futures::future::try_join_all(
                    videos
                        .iter()
                        .zip(&parts)
                        .map(|(source, part)| self.invoke(job::normalize_args(source, part))),
                )
                .await?;

                // Phase 2: container-level join without re-encoding.
                let mut manifest = ConcatManifest::new();
                for part in &parts {
                    manifest.push(part);
                }
                let list = temps.create_path("concat-list", "txt");
                tokio::fs::write(&list, manifest.render()).await?;
                self.invoke(job::concat_copy_args(&list, output)).await
            }
            JobSpec::AudioMix { video, audio, mode } => {
                self.invoke(job::audio_mix_args(video, audio, *mode, output)).await
            }
        }
    }

    /// Execute one engine invocation under the admission gate.
    async fn invoke(&self, args: Vec<String>) -> Result<()> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| Error::Internal("engine admission gate closed".into()))?;

        tracing::debug!("ffmpeg args: {:?}", args);

        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| Error::Tool {
            tool: "ffmpeg".into(),
            message: format!("failed to spawn: {e}"),
        })?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                if output.status.success() {
                    Ok(())
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    Err(Error::Tool {
                        tool: "ffmpeg".into(),
                        message: format!(
                            "exited with status {}: {}",
                            output.status,
                            stderr.trim()
                        ),
                    })
                }
            }
            Ok(Err(e)) => Err(Error::Tool {
                tool: "ffmpeg".into(),
                message: format!("I/O error waiting for process: {e}"),
            }),
            Err(_elapsed) => Err(Error::Tool {
                tool: "ffmpeg".into(),
                message: format!("timed out after {:?}", self.timeout),
            }),
        }
    }
}
