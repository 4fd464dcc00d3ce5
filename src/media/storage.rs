use async_trait::async_trait;
use rusqlite::params;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::config::EditorConfig;
use crate::database::{Database, DbError};
use crate::media::types::{MediaKind, StoredFile, UploadFile, UploadedFile};
use crate::services::{ServiceError, StorageService};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Db(e) => ServiceError::Db(e),
            StorageError::Io(e) => ServiceError::Io(e),
        }
    }
}

impl Database {
    /// Create the media library table
    pub fn create_media_tables(&self) -> Result<(), DbError> {
        let conn = self.conn.lock().map_err(|_| DbError::Lock)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS media_files (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                bucket TEXT NOT NULL,
                filename TEXT NOT NULL,
                mime TEXT NOT NULL,
                size INTEGER NOT NULL,
                sha256 TEXT NOT NULL,
                src TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE(bucket, filename)
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_media_files_kind
             ON media_files(kind, created_at DESC)",
            [],
        )?;

        Ok(())
    }

    pub fn insert_media_file(&self, file: &StoredFile) -> Result<(), DbError> {
        let conn = self.conn.lock().map_err(|_| DbError::Lock)?;

        conn.execute(
            "INSERT INTO media_files (id, kind, bucket, filename, mime, size, sha256, src, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                file.id,
                file.kind.as_str(),
                file.bucket,
                file.filename,
                file.mime,
                file.size,
                file.sha256,
                file.src,
                file.created_at,
            ],
        )?;

        Ok(())
    }

    pub fn get_media_file(&self, id: &str) -> Result<Option<StoredFile>, DbError> {
        let conn = self.conn.lock().map_err(|_| DbError::Lock)?;

        let mut stmt = conn.prepare(
            "SELECT id, kind, bucket, filename, mime, size, sha256, src, created_at
             FROM media_files WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], row_to_stored_file)?;

        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn find_media_file(&self, bucket: &str, filename: &str) -> Result<Option<StoredFile>, DbError> {
        let conn = self.conn.lock().map_err(|_| DbError::Lock)?;

        let mut stmt = conn.prepare(
            "SELECT id, kind, bucket, filename, mime, size, sha256, src, created_at
             FROM media_files WHERE bucket = ?1 AND filename = ?2",
        )?;
        let mut rows = stmt.query_map(params![bucket, filename], row_to_stored_file)?;

        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Newest first
    pub fn list_media_files(&self, kind: MediaKind) -> Result<Vec<StoredFile>, DbError> {
        let conn = self.conn.lock().map_err(|_| DbError::Lock)?;

        let mut stmt = conn.prepare(
            "SELECT id, kind, bucket, filename, mime, size, sha256, src, created_at
             FROM media_files WHERE kind = ?1
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let files = stmt
            .query_map(params![kind.as_str()], row_to_stored_file)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(files)
    }

    pub fn delete_media_file(&self, id: &str) -> Result<bool, DbError> {
        let conn = self.conn.lock().map_err(|_| DbError::Lock)?;
        let affected = conn.execute("DELETE FROM media_files WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }
}

fn row_to_stored_file(row: &rusqlite::Row) -> Result<StoredFile, rusqlite::Error> {
    let kind: String = row.get(1)?;
    Ok(StoredFile {
        id: row.get(0)?,
        kind: MediaKind::from_str(&kind),
        bucket: row.get(2)?,
        filename: row.get(3)?,
        mime: row.get(4)?,
        size: row.get(5)?,
        sha256: row.get(6)?,
        src: row.get(7)?,
        created_at: row.get(8)?,
    })
}

/// Hex SHA-256 of `bytes`
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Keep `[A-Za-z0-9._-]`, replace the rest with dashes
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();

    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

fn is_valid_bucket(bucket: &str) -> bool {
    let parts: Vec<&str> = bucket.split('/').collect();
    parts.len() == 3
        && [4, 2, 2]
            .iter()
            .zip(&parts)
            .all(|(len, part)| part.len() == *len && part.bytes().all(|b| b.is_ascii_digit()))
}

fn with_suffix(filename: &str, n: u32) -> String {
    let path = Path::new(filename);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(filename);
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}-{}.{}", stem, n, ext),
        None => format!("{}-{}", stem, n),
    }
}

/// Files on local disk under date buckets, indexed in `media_files`
pub struct LocalStorage {
    db: Arc<Database>,
    root: PathBuf,
    public_base_url: String,
}

impl LocalStorage {
    pub fn new(db: Arc<Database>, config: &EditorConfig) -> Self {
        Self {
            db,
            root: config.storage_root.clone(),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, bucket: &str, filename: &str) -> PathBuf {
        bucket
            .split('/')
            .fold(self.root.clone(), |path, part| path.join(part))
            .join(filename)
    }

    fn src_for(&self, bucket: &str, filename: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, bucket, filename)
    }

    async fn store(&self, file: UploadFile, path_hint: Option<&str>) -> Result<Option<UploadedFile>, StorageError> {
        if file.bytes.is_empty() {
            tracing::warn!(name = %file.name, "declining empty upload");
            return Ok(None);
        }

        let bucket = match path_hint {
            Some(hint) if is_valid_bucket(hint) => hint.to_string(),
            Some(hint) => {
                tracing::warn!(hint, "ignoring malformed path hint");
                chrono::Utc::now().format("%Y/%m/%d").to_string()
            }
            None => chrono::Utc::now().format("%Y/%m/%d").to_string(),
        };

        let sha256 = content_hash(&file.bytes);
        let requested = sanitize_filename(&file.name);
        let mut filename = requested.clone();
        let mut n = 0;

        while let Some(existing) = self.db.find_media_file(&bucket, &filename)? {
            if existing.sha256 == sha256 {
                tracing::debug!(id = %existing.id, "identical upload, reusing stored file");
                return Ok(Some(UploadedFile {
                    id: existing.id,
                    src: existing.src,
                    thumb: None,
                }));
            }
            n += 1;
            filename = with_suffix(&requested, n);
        }

        let path = self.path_for(&bucket, &filename);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &file.bytes).await?;

        let stored = StoredFile {
            id: uuid::Uuid::new_v4().to_string(),
            kind: MediaKind::from_mime(&file.mime),
            src: self.src_for(&bucket, &filename),
            bucket,
            filename,
            mime: file.mime,
            size: file.bytes.len() as i64,
            sha256,
            created_at: chrono::Utc::now().timestamp_millis(),
        };
        self.db.insert_media_file(&stored)?;

        tracing::info!(id = %stored.id, src = %stored.src, size = stored.size, "stored upload");
        Ok(Some(UploadedFile {
            id: stored.id,
            src: stored.src,
            thumb: None,
        }))
    }

    async fn remove(&self, id: &str) -> Result<bool, StorageError> {
        let Some(file) = self.db.get_media_file(id)? else {
            return Ok(false);
        };

        match tokio::fs::remove_file(self.path_for(&file.bucket, &file.filename)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(id, "media file already missing on disk");
            }
            Err(e) => return Err(e.into()),
        }

        Ok(self.db.delete_media_file(id)?)
    }
}

#[async_trait]
impl StorageService for LocalStorage {
    async fn upload_file(
        &self,
        file: UploadFile,
        path_hint: Option<&str>,
    ) -> Result<Option<UploadedFile>, ServiceError> {
        Ok(self.store(file, path_hint).await?)
    }

    async fn get_files(&self, kind: MediaKind) -> Result<Vec<StoredFile>, ServiceError> {
        Ok(self.db.list_media_files(kind)?)
    }

    async fn delete_file(&self, id: &str) -> Result<bool, ServiceError> {
        Ok(self.remove(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(dir: &Path) -> LocalStorage {
        let config = EditorConfig {
            storage_root: dir.to_path_buf(),
            public_base_url: "/uploads/".to_string(),
            ..Default::default()
        };
        LocalStorage::new(Arc::new(Database::in_memory().unwrap()), &config)
    }

    fn png(name: &str, bytes: &[u8]) -> UploadFile {
        UploadFile {
            name: name.to_string(),
            mime: "image/png".to_string(),
            bytes: bytes.to_vec(),
        }
    }

    #[tokio::test]
    async fn test_upload_into_hinted_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());

        let uploaded = storage
            .upload_file(png("harbor.png", b"pixels"), Some("2024/03/09"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(uploaded.src, "/uploads/2024/03/09/harbor.png");

        let on_disk = std::fs::read(dir.path().join("2024").join("03").join("09").join("harbor.png")).unwrap();
        assert_eq!(on_disk, b"pixels");

        let files = storage.get_files(MediaKind::Image).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].sha256, content_hash(b"pixels"));
        assert!(storage.get_files(MediaKind::Video).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_collisions_and_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let hint = Some("2024/01/02");

        let first = storage.upload_file(png("a.png", b"one"), hint).await.unwrap().unwrap();
        let same = storage.upload_file(png("a.png", b"one"), hint).await.unwrap().unwrap();
        let other = storage.upload_file(png("a.png", b"two"), hint).await.unwrap().unwrap();

        assert_eq!(same.id, first.id);
        assert_eq!(other.src, "/uploads/2024/01/02/a-1.png");
        assert_ne!(other.id, first.id);
    }

    #[tokio::test]
    async fn test_malformed_hint_and_empty_upload() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());

        let uploaded = storage
            .upload_file(png("../../etc/x.png", b"z"), Some("../../etc"))
            .await
            .unwrap()
            .unwrap();
        let today = chrono::Utc::now().format("%Y/%m/%d").to_string();
        assert_eq!(uploaded.src, format!("/uploads/{}/x.png", today));

        assert!(storage.upload_file(png("e.png", b""), None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let uploaded = storage.upload_file(png("d.png", b"bye"), Some("2024/05/06")).await.unwrap().unwrap();

        assert!(storage.delete_file(&uploaded.id).await.unwrap());
        assert!(!dir.path().join("2024/05/06/d.png").exists());
        assert!(!storage.delete_file(&uploaded.id).await.unwrap());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("My Photo (1).JPG"), "My-Photo--1-.JPG");
        assert_eq!(sanitize_filename("..."), "file");
        assert_eq!(sanitize_filename("dir/sub/name.png"), "name.png");
    }
}
