use image::ImageFormat;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

use crate::media::export::PNG_MIME;
use crate::media::types::Blob;

/// `<anything>/<YYYY>/<MM>/<DD>/<filename>`, query and fragment ignored
const STORAGE_URL_PATTERN: &str = r"(?:^|/)(\d{4})/(\d{2})/(\d{2})/([^/?#]+)(?:[?#].*)?$";

fn storage_url_regex() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(STORAGE_URL_PATTERN).ok())
        .as_ref()
}

/// Location of a stored file recovered from its URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPath {
    /// `YYYY/MM/DD`
    pub bucket: String,
    pub filename: String,
}

impl StoredPath {
    /// Filename without its extension
    pub fn stem(&self) -> &str {
        Path::new(&self.filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.filename)
    }
}

pub fn parse_storage_url(url: &str) -> Option<StoredPath> {
    let caps = storage_url_regex()?.captures(url)?;
    Some(StoredPath {
        bucket: format!("{}/{}/{}", &caps[1], &caps[2], &caps[3]),
        filename: caps[4].to_string(),
    })
}

/// Preferred file extension for a mime type
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    match essence.as_str() {
        "" => None,
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/svg+xml" => Some("svg"),
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        "audio/mpeg" => Some("mp3"),
        "audio/ogg" => Some("ogg"),
        "application/pdf" => Some("pdf"),
        other => ImageFormat::from_mime_type(other)
            .and_then(|format| format.extensions_str().first().copied()),
    }
}

/// Extension and mime for a produced blob: its reported type first, then a
/// sniff of the bytes, then PNG
pub fn resolve_format(blob: &Blob) -> (&'static str, String) {
    if let Some(ext) = extension_for_mime(&blob.mime) {
        return (ext, blob.mime.clone());
    }

    if let Ok(format) = image::guess_format(&blob.bytes) {
        if let Some(ext) = format.extensions_str().first().copied() {
            return (ext, format.to_mime_type().to_string());
        }
    }

    tracing::debug!(mime = %blob.mime, "could not determine blob type, assuming PNG");
    ("png", PNG_MIME.to_string())
}

/// Name for an edited image and the bucket to store it in.
///
/// A re-save of a stored file keeps its stem and date bucket; anything else
/// gets a fresh timestamped name.
pub fn edited_file_name(source_url: Option<&str>, ext: &str, now_ms: i64) -> (String, Option<String>) {
    match source_url.and_then(parse_storage_url) {
        Some(path) => (format!("{}.{}", path.stem(), ext), Some(path.bucket)),
        None => (format!("edited-{}.{}", now_ms, ext), None),
    }
}
