//! Input materialization.
//!
//! Each logical input slot of a request is declared as either an uploaded
//! file (already on disk, written by the upload layer) or a remote URL.
//! [`materialize_all`] turns the declared list into local paths, downloading
//! remote inputs concurrently while preserving the declared order.

use std::path::{Path, PathBuf};

use framefusion_av::TempSet;
use framefusion_core::{Error, Result};
use tokio::io::AsyncWriteExt;

/// One declared input: an upload handle or a URL string.
#[derive(Debug)]
pub enum InputSource {
    Uploaded(PathBuf),
    Remote(String),
}

/// An input slot together with its source.
#[derive(Debug)]
pub struct DeclaredInput {
    /// Logical slot name (e.g. "image", "video1").
    pub slot: String,
    pub source: InputSource,
    /// Extension used when the URL path carries none.
    pub fallback_ext: &'static str,
}

impl DeclaredInput {
    pub fn uploaded(slot: impl Into<String>, path: PathBuf) -> Self {
        Self {
            slot: slot.into(),
            source: InputSource::Uploaded(path),
            fallback_ext: "bin",
        }
    }

    pub fn remote(slot: impl Into<String>, url: String, fallback_ext: &'static str) -> Self {
        Self {
            slot: slot.into(),
            source: InputSource::Remote(url),
            fallback_ext,
        }
    }
}

/// Materialize every declared input to a local file.
///
/// Uploads pass through untouched; remote inputs download concurrently into
/// paths allocated from `temps`. The returned list matches the declared
/// order regardless of download completion order. On any failure the partial
/// downloads are deleted before the error is surfaced (and the allocated
/// paths stay tracked, so release is still a no-op for them).
pub async fn materialize_all(
    client: &reqwest::Client,
    inputs: Vec<DeclaredInput>,
    temps: &mut TempSet,
) -> Result<Vec<PathBuf>> {
    let mut resolved = Vec::with_capacity(inputs.len());
    let mut downloads = Vec::new();

    for input in inputs {
        match input.source {
            InputSource::Uploaded(path) => resolved.push(path),
            InputSource::Remote(url) => {
                let ext = url_extension(&url).unwrap_or_else(|| input.fallback_ext.to_string());
                let dest = temps.create_path(&format!("dl-{}", input.slot), &ext);
                resolved.push(dest.clone());
                downloads.push((input.slot, url, dest));
            }
        }
    }

    futures::future::try_join_all(
        downloads
            .iter()
            .map(|(slot, url, dest)| download(client, slot, url, dest)),
    )
    .await?;

    Ok(resolved)
}

/// Download one remote input, deleting the partial file on failure.
async fn download(client: &reqwest::Client, slot: &str, url: &str, dest: &Path) -> Result<()> {
    let outcome = fetch_to_file(client, slot, url, dest).await;
    if outcome.is_err() {
        match tokio::fs::remove_file(dest).await {
            Ok(()) => tracing::debug!("removed partial download {}", dest.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("failed to remove partial download {}: {e}", dest.display()),
        }
    }
    outcome
}

async fn fetch_to_file(
    client: &reqwest::Client,
    slot: &str,
    url: &str,
    dest: &Path,
) -> Result<()> {
    let mut response = client.get(url).send().await.map_err(|e| {
        Error::input_unavailable(slot, format!("request to {url} failed: {e}"))
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::input_unavailable(
            slot,
            format!("{url} returned {status}"),
        ));
    }

    let mut file = tokio::fs::File::create(dest).await?;
    while let Some(chunk) = response.chunk().await.map_err(|e| {
        Error::input_unavailable(slot, format!("download from {url} interrupted: {e}"))
    })? {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    tracing::debug!("materialized {slot} from {url} at {}", dest.display());
    Ok(())
}

/// Extract a file extension from a URL's path component, ignoring any query
/// string or fragment.
fn url_extension(url: &str) -> Option<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let after_scheme = without_query
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(without_query);
    let path = after_scheme.split_once('/').map(|(_, p)| p)?;
    let segment = path.rsplit('/').next()?;
    let (_, ext) = segment.rsplit_once('.')?;

    if ext.is_empty() || ext.len() > 5 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
