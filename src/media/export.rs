//! Raster export with a bounded-time PNG fallback.

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use crate::media::types::{Blob, PipelineError};

pub const PNG_MIME: &str = "image/png";

/// Something that can encode its pixels on request
#[async_trait]
pub trait RasterSurface: Send + Sync {
    /// Encode at `mime`. The returned blob reports what was actually produced.
    async fn to_blob(&self, mime: &str) -> Result<Blob, PipelineError>;
}

/// In-memory RGBA canvas
#[derive(Debug, Clone)]
pub struct ImageSurface {
    image: Arc<RgbaImage>,
}

impl ImageSurface {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

#[async_trait]
impl RasterSurface for ImageSurface {
    async fn to_blob(&self, mime: &str) -> Result<Blob, PipelineError> {
        let format = ImageFormat::from_mime_type(mime)
            .ok_or_else(|| PipelineError::Encode(format!("unsupported mime type {}", mime)))?;
        let image = Arc::clone(&self.image);

        let bytes = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, image::ImageError> {
            let mut cursor = Cursor::new(Vec::new());
            DynamicImage::ImageRgba8(image.as_ref().clone()).write_to(&mut cursor, format)?;
            Ok(cursor.into_inner())
        })
        .await
        .map_err(|e| PipelineError::Encode(e.to_string()))?
        .map_err(|e| PipelineError::Encode(e.to_string()))?;

        Ok(Blob::new(bytes, format.to_mime_type()))
    }
}

async fn export_once(
    surface: &dyn RasterSurface,
    mime: &str,
    timeout: Duration,
) -> Result<Blob, PipelineError> {
    let blob = tokio::time::timeout(timeout, surface.to_blob(mime))
        .await
        .map_err(|_| PipelineError::ExportTimeout(timeout))??;

    if blob.is_empty() {
        return Err(PipelineError::EmptyBlob);
    }
    Ok(blob)
}

/// Export at `mime`, retrying once as PNG when that fails, times out or
/// comes back empty. Each attempt gets its own `timeout`.
pub async fn export_with_fallback(
    surface: &dyn RasterSurface,
    mime: &str,
    timeout: Duration,
) -> Result<Blob, PipelineError> {
    match export_once(surface, mime, timeout).await {
        Ok(blob) => return Ok(blob),
        Err(e) if mime == PNG_MIME => return Err(e),
        Err(e) => {
            tracing::warn!(mime, error = %e, "raster export failed, falling back to PNG");
        }
    }

    export_once(surface, PNG_MIME, timeout).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    /// Encodes only PNG; everything else errors
    struct PngOnly;

    #[async_trait]
    impl RasterSurface for PngOnly {
        async fn to_blob(&self, mime: &str) -> Result<Blob, PipelineError> {
            if mime == PNG_MIME {
                Ok(Blob::new(vec![1, 2, 3], PNG_MIME))
            } else {
                Err(PipelineError::Encode("no encoder".to_string()))
            }
        }
    }

    /// Returns an empty blob for the requested type
    struct EmptyWebp;

    #[async_trait]
    impl RasterSurface for EmptyWebp {
        async fn to_blob(&self, mime: &str) -> Result<Blob, PipelineError> {
            if mime == PNG_MIME {
                Ok(Blob::new(vec![9], PNG_MIME))
            } else {
                Ok(Blob::new(Vec::new(), mime))
            }
        }
    }

    struct Hangs;

    #[async_trait]
    impl RasterSurface for Hangs {
        async fn to_blob(&self, _mime: &str) -> Result<Blob, PipelineError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_encode_failure_falls_back_to_png() {
        let blob = export_with_fallback(&PngOnly, "image/webp", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(blob.mime, PNG_MIME);
    }

    #[tokio::test]
    async fn test_empty_blob_falls_back_to_png() {
        let blob = export_with_fallback(&EmptyWebp, "image/webp", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(blob.bytes, vec![9]);
    }

    #[tokio::test]
    async fn test_timeout_is_distinct_from_encode_failure() {
        let err = export_with_fallback(&Hangs, "image/webp", Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ExportTimeout(_)));
    }

    #[tokio::test]
    async fn test_image_surface_encodes_png() {
        let surface = ImageSurface::new(RgbaImage::from_pixel(4, 3, Rgba([200, 10, 10, 255])));
        let blob = surface.to_blob(PNG_MIME).await.unwrap();
        assert_eq!(blob.mime, PNG_MIME);
        assert_eq!(&blob.bytes[..4], &[0x89, b'P', b'N', b'G']);
        assert_eq!(image::guess_format(&blob.bytes).unwrap(), ImageFormat::Png);
    }

    #[tokio::test]
    async fn test_image_surface_unknown_mime_falls_back() {
        let surface = ImageSurface::new(RgbaImage::new(2, 2));
        assert!(matches!(
            surface.to_blob("image/x-nope").await,
            Err(PipelineError::Encode(_))
        ));

        let blob = export_with_fallback(&surface, "image/x-nope", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(blob.mime, PNG_MIME);
    }
}
