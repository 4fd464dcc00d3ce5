//! Turning an edited-image result into one binary payload.

use base64::Engine;
use std::time::Duration;

use crate::config::EditorConfig;
use crate::media::export::export_with_fallback;
use crate::media::types::{Blob, EditedImage, PipelineError};

/// Decode raw base64 or a `data:` URL.
///
/// A data URL's declared mime is kept; raw base64 yields an empty mime and is
/// sniffed later.
pub fn decode_base64_payload(payload: &str) -> Result<Blob, PipelineError> {
    let payload = payload.trim();

    let (mime, data, is_base64) = match payload.strip_prefix("data:") {
        Some(rest) => {
            let (header, data) = rest
                .split_once(',')
                .ok_or_else(|| PipelineError::Decode("data URL without a comma".to_string()))?;
            let mut parts = header.split(';');
            let mime = parts.next().unwrap_or("").trim().to_string();
            let is_base64 = parts.any(|p| p.trim().eq_ignore_ascii_case("base64"));
            (mime, data, is_base64)
        }
        None => (String::new(), payload, true),
    };

    let bytes = if is_base64 {
        let compact: String = data.chars().filter(|c| !c.is_whitespace()).collect();
        base64::engine::general_purpose::STANDARD
            .decode(compact)
            .map_err(|e| PipelineError::Decode(e.to_string()))?
    } else {
        data.as_bytes().to_vec()
    };

    if bytes.is_empty() {
        return Err(PipelineError::EmptyBlob);
    }
    Ok(Blob::new(bytes, mime))
}

/// Download `url`; the blob's mime comes from the response's content type
pub async fn fetch_remote(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<Blob, PipelineError> {
    let response = client.get(url).timeout(timeout).send().await?.error_for_status()?;

    let mime = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or("").trim().to_string())
        .unwrap_or_default();

    let bytes = response.bytes().await?.to_vec();
    if bytes.is_empty() {
        return Err(PipelineError::EmptyBlob);
    }

    tracing::debug!(url, mime = %mime, size = bytes.len(), "fetched remote image");
    Ok(Blob::new(bytes, mime))
}

/// First payload that can be obtained, trying canvas, blob, base64 and the
/// remote URL in that order. With nothing usable the last error is returned.
pub async fn obtain_payload(
    image: EditedImage,
    client: &reqwest::Client,
    config: &EditorConfig,
) -> Result<Blob, PipelineError> {
    let mut last_error = None;

    if let Some(surface) = &image.canvas {
        match export_with_fallback(surface.as_ref(), &config.export_mime, config.export_timeout()).await {
            Ok(blob) => return Ok(blob),
            Err(e) => {
                tracing::warn!(error = %e, "canvas export failed");
                last_error = Some(e);
            }
        }
    }

    if let Some(blob) = image.blob {
        if !blob.is_empty() {
            return Ok(blob);
        }
        last_error = Some(PipelineError::EmptyBlob);
    }

    if let Some(payload) = &image.base64 {
        match decode_base64_payload(payload) {
            Ok(blob) => return Ok(blob),
            Err(e) => {
                tracing::warn!(error = %e, "base64 payload unusable");
                last_error = Some(e);
            }
        }
    }

    if let Some(url) = &image.remote_url {
        match fetch_remote(client, url, config.remote_fetch_timeout()).await {
            Ok(blob) => return Ok(blob),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "remote image fetch failed");
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or(PipelineError::NoSource))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::export::RasterSurface;
    use async_trait::async_trait;

    struct Broken;

    #[async_trait]
    impl RasterSurface for Broken {
        async fn to_blob(&self, _mime: &str) -> Result<Blob, PipelineError> {
            Err(PipelineError::Encode("gpu lost".to_string()))
        }
    }

    #[test]
    fn test_decode_data_url() {
        let blob = decode_base64_payload("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(blob.mime, "image/png");
        assert_eq!(blob.bytes, b"hello");
    }

    #[test]
    fn test_decode_raw_base64() {
        let blob = decode_base64_payload(" aGVs\nbG8= ").unwrap();
        assert_eq!(blob.mime, "");
        assert_eq!(blob.bytes, b"hello");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_base64_payload("data:image/png;base64,***"),
            Err(PipelineError::Decode(_))
        ));
        assert!(matches!(
            decode_base64_payload("data:image/png;base64"),
            Err(PipelineError::Decode(_))
        ));
        assert!(matches!(decode_base64_payload(""), Err(PipelineError::EmptyBlob)));
    }

    #[tokio::test]
    async fn test_falls_through_to_next_source() {
        let image = EditedImage {
            canvas: Some(Box::new(Broken)),
            blob: Some(Blob::new(Vec::new(), "image/png")),
            base64: Some("data:image/gif;base64,R0lG".to_string()),
            remote_url: None,
        };
        let config = EditorConfig::default();

        let blob = obtain_payload(image, &reqwest::Client::new(), &config).await.unwrap();
        assert_eq!(blob.mime, "image/gif");
        assert_eq!(blob.bytes, b"GIF");
    }

    #[tokio::test]
    async fn test_no_source() {
        let config = EditorConfig::default();
        let err = obtain_payload(EditedImage::default(), &reqwest::Client::new(), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoSource));
    }
}
