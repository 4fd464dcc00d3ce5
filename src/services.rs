//! Interfaces of the collaborators the editor core talks to.
//!
//! The core never touches bytes on disk, HTTP endpoints or the post table
//! directly; hosts hand it implementations of these traits. `Database` and
//! `LocalStorage` are the bundled implementations.

use async_trait::async_trait;
use thiserror::Error;

use crate::database::DbError;
use crate::media::types::{MediaKind, StoredFile, UploadFile, UploadedFile};
use crate::post::types::{CategoryNode, PostRecord};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request rejected: {0}")]
    Rejected(String),
}

/// Byte storage for uploaded media
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Store `file`, optionally inside the date bucket named by `path_hint`
    /// (`YYYY/MM/DD`). `None` means the service declined the upload.
    async fn upload_file(
        &self,
        file: UploadFile,
        path_hint: Option<&str>,
    ) -> Result<Option<UploadedFile>, ServiceError>;

    async fn get_files(&self, kind: MediaKind) -> Result<Vec<StoredFile>, ServiceError>;

    /// False when no file has `id`
    async fn delete_file(&self, id: &str) -> Result<bool, ServiceError>;
}

/// Post records
#[async_trait]
pub trait PersistenceService: Send + Sync {
    async fn load_post(&self, id: &str) -> Result<Option<PostRecord>, ServiceError>;

    /// Insert or update; returns the record id
    async fn save_post(&self, record: &PostRecord) -> Result<String, ServiceError>;
}

/// Category trees per language
#[async_trait]
pub trait TaxonomyService: Send + Sync {
    async fn list_categories(&self, language: &str) -> Result<Vec<CategoryNode>, ServiceError>;
}
