use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::media::export::RasterSurface;
use crate::services::ServiceError;

/// Broad media category, used to filter the file library
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Document => "document",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "image" => MediaKind::Image,
            "video" => MediaKind::Video,
            "audio" => MediaKind::Audio,
            _ => MediaKind::Document,
        }
    }

    pub fn from_mime(mime: &str) -> Self {
        match mime.split('/').next().unwrap_or("") {
            "image" => MediaKind::Image,
            "video" => MediaKind::Video,
            "audio" => MediaKind::Audio,
            _ => MediaKind::Document,
        }
    }
}

/// Encoded bytes plus the mime type the producer reported
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Blob {
    pub bytes: Vec<u8>,
    /// Empty when the producer did not say
    pub mime: String,
}

impl Blob {
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// File handed to the storage service
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// What the storage service returns for an accepted upload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub id: String,
    pub src: String,
    pub thumb: Option<String>,
}

/// Row of the media library
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub id: String,
    pub kind: MediaKind,
    /// Date bucket, `YYYY/MM/DD`
    pub bucket: String,
    pub filename: String,
    pub mime: String,
    pub size: i64,
    pub sha256: String,
    pub src: String,
    pub created_at: i64,
}

/// Result of an image-editor save. Sources are tried in field order.
#[derive(Default)]
pub struct EditedImage {
    pub canvas: Option<Box<dyn RasterSurface>>,
    pub blob: Option<Blob>,
    /// Raw base64 or a `data:` URL
    pub base64: Option<String>,
    pub remote_url: Option<String>,
}

impl EditedImage {
    pub fn from_canvas(surface: impl RasterSurface + 'static) -> Self {
        Self {
            canvas: Some(Box::new(surface)),
            ..Default::default()
        }
    }

    pub fn from_blob(blob: Blob) -> Self {
        Self {
            blob: Some(blob),
            ..Default::default()
        }
    }

    pub fn from_base64(payload: impl Into<String>) -> Self {
        Self {
            base64: Some(payload.into()),
            ..Default::default()
        }
    }

    pub fn from_remote_url(url: impl Into<String>) -> Self {
        Self {
            remote_url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.canvas.is_none()
            && self.blob.is_none()
            && self.base64.is_none()
            && self.remote_url.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    #[default]
    Idle,
    Exporting,
    Uploading,
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Exporting => "exporting",
            PipelineState::Uploading => "uploading",
            PipelineState::Failed => "failed",
        }
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("A media commit is already in progress")]
    Busy,

    #[error("Raster export timed out after {0:?}")]
    ExportTimeout(Duration),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error("Export produced an empty blob")]
    EmptyBlob,

    #[error("Failed to decode payload: {0}")]
    Decode(String),

    #[error("Failed to fetch remote image: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("Edited image carried no usable payload")]
    NoSource,

    #[error("Storage declined the upload")]
    UploadRejected,

    #[error("Upload failed: {0}")]
    Upload(#[from] ServiceError),

    #[error("No active edit target")]
    NoTarget,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_from_mime() {
        assert_eq!(MediaKind::from_mime("image/webp"), MediaKind::Image);
        assert_eq!(MediaKind::from_mime("video/mp4"), MediaKind::Video);
        assert_eq!(MediaKind::from_mime("audio/mpeg"), MediaKind::Audio);
        assert_eq!(MediaKind::from_mime("application/pdf"), MediaKind::Document);
        assert_eq!(MediaKind::from_mime(""), MediaKind::Document);
    }

    #[test]
    fn test_edited_image_emptiness() {
        assert!(EditedImage::default().is_empty());
        assert!(!EditedImage::from_base64("AAAA").is_empty());
    }
}
