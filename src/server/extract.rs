//! Request body extraction.
//!
//! Every composition endpoint accepts its input slots either as
//! `multipart/form-data` (file parts plus text fields) or as a JSON object
//! carrying the URL variants of the same fields. [`FormData`] normalizes
//! both shapes; multipart file parts are streamed to disk and tracked in the
//! request's [`TempSet`] immediately, so they are cleaned up even if parsing
//! fails halfway through.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header;
use tokio::io::AsyncWriteExt;

use framefusion_av::TempSet;
use framefusion_core::{Error, Result};

use crate::resolve::{DeclaredInput, InputSource};

/// JSON bodies carry only URLs and small text fields; bulk media arrives as
/// multipart or by URL.
const MAX_JSON_BODY_BYTES: usize = 1024 * 1024;

/// Normalized request fields from a multipart or JSON body.
#[derive(Debug, Default)]
pub struct FormData {
    files: HashMap<String, Vec<PathBuf>>,
    text: HashMap<String, String>,
    lists: HashMap<String, Vec<String>>,
}

impl FormData {
    /// Read and normalize the request body.
    pub async fn read(req: Request, temps: &mut TempSet) -> Result<Self> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, &())
                .await
                .map_err(|e| Error::Validation(format!("malformed multipart body: {e}")))?;
            return Self::from_multipart(multipart, temps).await;
        }

        if content_type.starts_with("application/json") {
            let bytes = axum::body::to_bytes(req.into_body(), MAX_JSON_BODY_BYTES)
                .await
                .map_err(|e| Error::Validation(format!("failed to read request body: {e}")))?;
            if bytes.is_empty() {
                return Ok(Self::default());
            }
            return Self::from_json(&bytes);
        }

        if content_type.is_empty() {
            // Bodyless posts fall through to slot validation, which reports
            // which inputs are missing.
            return Ok(Self::default());
        }

        // Rejected before the body is read; nothing is buffered for types we
        // will not parse.
        Err(Error::Validation(format!(
            "unsupported content type '{content_type}' (use multipart/form-data or application/json)"
        )))
    }

    async fn from_multipart(mut multipart: Multipart, temps: &mut TempSet) -> Result<Self> {
        let mut form = Self::default();

        while let Some(mut field) = multipart
            .next_field()
            .await
            .map_err(|e| Error::Validation(format!("malformed multipart body: {e}")))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if let Some(file_name) = field.file_name().map(str::to_string) {
                let ext = sanitized_extension(&file_name);
                let prefix = format!("upload-{}", sanitized_field_name(&name));
                let dest = temps.create_path(&prefix, &ext);
                let mut file = tokio::fs::File::create(&dest).await?;
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| Error::Validation(format!("upload '{name}' truncated: {e}")))?
                {
                    file.write_all(&chunk).await?;
                }
                file.flush().await?;
                form.files.entry(name).or_default().push(dest);
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| Error::Validation(format!("field '{name}' unreadable: {e}")))?;
                // Repeated text fields accumulate as a list (e.g. imageUrls).
                match form.text.remove(&name) {
                    Some(previous) => {
                        let list = form.lists.entry(name).or_default();
                        if list.is_empty() {
                            list.push(previous);
                        }
                        list.push(value);
                    }
                    None => {
                        if let Some(list) = form.lists.get_mut(&name) {
                            list.push(value);
                        } else {
                            form.text.insert(name, value);
                        }
                    }
                }
            }
        }

        Ok(form)
    }

    fn from_json(bytes: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| Error::Validation(format!("malformed JSON body: {e}")))?;
        let serde_json::Value::Object(map) = value else {
            return Err(Error::Validation("JSON body must be an object".into()));
        };

        let mut form = Self::default();
        for (key, value) in map {
            match value {
                serde_json::Value::String(s) => {
                    form.text.insert(key, s);
                }
                serde_json::Value::Number(n) => {
                    form.text.insert(key, n.to_string());
                }
                serde_json::Value::Array(items) => {
                    let list = items
                        .into_iter()
                        .filter_map(|item| match item {
                            serde_json::Value::String(s) => Some(s),
                            _ => None,
                        })
                        .collect();
                    form.lists.insert(key, list);
                }
                _ => {}
            }
        }
        Ok(form)
    }

    /// First uploaded file for a field, if any.
    pub fn file(&self, name: &str) -> Option<&PathBuf> {
        self.files.get(name).and_then(|files| files.first())
    }

    /// All uploaded files for a field, in upload order.
    pub fn files(&self, name: &str) -> &[PathBuf] {
        self.files.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// A text field value.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.text.get(name).map(String::as_str)
    }

    /// URL list for a field: an explicit list (JSON array or repeated form
    /// field) or a comma-separated string, in declared order.
    pub fn url_list(&self, name: &str) -> Vec<String> {
        let mut urls = Vec::new();
        if let Some(list) = self.lists.get(name) {
            urls.extend(list.iter().map(|s| s.trim().to_string()));
        }
        if let Some(joined) = self.text.get(name) {
            urls.extend(joined.split(',').map(|s| s.trim().to_string()));
        }
        urls.retain(|s| !s.is_empty());
        urls
    }

    /// Resolve one required slot from its file field or URL field.
    pub fn input(
        &self,
        file_field: &str,
        url_field: &str,
        slot: &str,
        fallback_ext: &'static str,
    ) -> Result<DeclaredInput> {
        if let Some(path) = self.file(file_field) {
            return Ok(DeclaredInput {
                slot: slot.to_string(),
                source: InputSource::Uploaded(path.clone()),
                fallback_ext,
            });
        }
        if let Some(url) = self.text(url_field).filter(|u| !u.trim().is_empty()) {
            return Ok(DeclaredInput::remote(slot, url.trim().to_string(), fallback_ext));
        }
        Err(Error::input_unavailable(
            slot,
            format!("provide a '{file_field}' file or '{url_field}'"),
        ))
    }
}

/// Field names are client-supplied and end up in temp filenames; strip
/// anything that is not a plain identifier character.
fn sanitized_field_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .collect();
    if cleaned.is_empty() {
        "part".to_string()
    } else {
        cleaned
    }
}

fn sanitized_extension(file_name: &str) -> String {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");
    if ext.is_empty() || ext.len() > 5 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        "bin".to_string()
    } else {
        ext.to_ascii_lowercase()
    }
}
