//! Resolve image references (data URIs, HTTP(S) URLs, files) into RGB images.

use base64::Engine;
use facebridge_core::ExtractionError;
use image::RgbImage;
use std::time::Duration;

/// Longest prefix of a reference quoted in errors; data URIs can be megabytes.
const REFERENCE_PREVIEW_CHARS: usize = 64;

pub struct ImageFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl ImageFetcher {
    pub fn new(timeout: Duration, max_bytes: usize) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, max_bytes })
    }

    /// Fetch and decode `reference` into an RGB image.
    ///
    /// Sources larger than the byte limit are rejected before they are
    /// buffered: file sizes are checked up front and HTTP bodies are read in
    /// chunks and abandoned once they pass the limit.
    pub async fn fetch(&self, reference: &str) -> Result<RgbImage, ExtractionError> {
        let bytes = self.read_bytes(reference).await?;
        self.check_size(reference, bytes.len() as u64)?;
        tracing::debug!(reference = %preview(reference), bytes = bytes.len(), "image fetched");

        let preview = preview(reference);
        tokio::task::spawn_blocking(move || image::load_from_memory(&bytes).map(|img| img.to_rgb8()))
            .await
            .map_err(|e| ExtractionError::Inference(format!("decode task: {e}")))?
            .map_err(|e| ExtractionError::Decode {
                reference: preview,
                reason: e.to_string(),
            })
    }

    fn check_size(&self, reference: &str, len: u64) -> Result<(), ExtractionError> {
        if len > self.max_bytes as u64 {
            return Err(fetch_error(
                reference,
                format!("image is {len} bytes, limit is {}", self.max_bytes),
            ));
        }
        Ok(())
    }

    async fn read_bytes(&self, reference: &str) -> Result<Vec<u8>, ExtractionError> {
        if let Some(rest) = reference.strip_prefix("data:") {
            return decode_data_uri(rest).map_err(|reason| fetch_error(reference, reason));
        }

        if reference.starts_with("http://") || reference.starts_with("https://") {
            return self.read_http(reference).await;
        }

        let path = reference.strip_prefix("file://").unwrap_or(reference);
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| fetch_error(reference, e.to_string()))?;
        self.check_size(reference, metadata.len())?;
        tokio::fs::read(path)
            .await
            .map_err(|e| fetch_error(reference, e.to_string()))
    }

    async fn read_http(&self, reference: &str) -> Result<Vec<u8>, ExtractionError> {
        let mut response = self
            .client
            .get(reference)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| fetch_error(reference, e.to_string()))?;

        let mut body = Vec::new();
        if let Some(len) = response.content_length() {
            self.check_size(reference, len)?;
            body.reserve(len as usize);
        }
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| fetch_error(reference, e.to_string()))?
        {
            self.check_size(reference, (body.len() + chunk.len()) as u64)?;
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

/// Decode the part of a data URI after `data:`; only base64 payloads are accepted.
fn decode_data_uri(rest: &str) -> Result<Vec<u8>, String> {
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| "data URI has no payload".to_string())?;
    if !header.ends_with(";base64") {
        return Err(format!("unsupported data URI encoding: {header}"));
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| format!("invalid base64 payload: {e}"))
}

fn preview(reference: &str) -> String {
    match reference.char_indices().nth(REFERENCE_PREVIEW_CHARS) {
        Some((end, _)) => format!("{}…", &reference[..end]),
        None => reference.to_string(),
    }
}

fn fetch_error(reference: &str, reason: impl Into<String>) -> ExtractionError {
    ExtractionError::Fetch {
        reference: preview(reference),
        reason: reason.into(),
    }
}
