use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::EditorConfig;
use crate::database::{Database, DbError};
use crate::editor::{ActiveEditTarget, DocumentController, DocumentError, SaveOutcome};
use crate::media::{
    EditSurface, EditedImage, LocalStorage, MediaCommitPipeline, MediaKind, PipelineError,
    StoredFile, UploadFile, UploadedFile,
};
use crate::post::types::{CategoryNode, PostSummary, PresentationMode};
use crate::services::{ServiceError, StorageService, TaxonomyService};

/// Everything a host needs for one editing window
pub struct AppState {
    pub db: Arc<Database>,
    pub storage: Arc<LocalStorage>,
    pub pipeline: MediaCommitPipeline,
    pub controller: Mutex<DocumentController>,
}

impl AppState {
    /// Open the default database and load the stored editor config
    pub fn open() -> Result<Self, DbError> {
        let db = Database::new()?;
        let config = db.get_editor_config().unwrap_or_default();
        Ok(Self::with_database(Arc::new(db), config))
    }

    pub fn with_database(db: Arc<Database>, config: EditorConfig) -> Self {
        let storage = Arc::new(LocalStorage::new(db.clone(), &config));
        let pipeline = MediaCommitPipeline::new(storage.clone(), config.clone());

        AppState {
            db,
            storage,
            pipeline,
            controller: Mutex::new(DocumentController::new(config)),
        }
    }
}

/// Error shape handed back to the host UI
#[derive(Debug, Serialize)]
pub struct CommandError {
    message: String,
    /// Form field to focus, for validation failures
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<String>,
}

impl CommandError {
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    fn new(message: impl Into<String>) -> Self {
        CommandError {
            message: message.into(),
            field: None,
        }
    }
}

impl From<DbError> for CommandError {
    fn from(e: DbError) -> Self {
        CommandError::new(e.to_string())
    }
}

impl From<ServiceError> for CommandError {
    fn from(e: ServiceError) -> Self {
        CommandError::new(e.to_string())
    }
}

impl From<PipelineError> for CommandError {
    fn from(e: PipelineError) -> Self {
        CommandError::new(e.to_string())
    }
}

impl From<DocumentError> for CommandError {
    fn from(e: DocumentError) -> Self {
        match &e {
            DocumentError::Validation(issues) => CommandError {
                message: e.to_string(),
                field: issues.first().map(|i| i.field.as_str().to_string()),
            },
            _ => CommandError::new(e.to_string()),
        }
    }
}

// Config commands
pub fn get_config(state: &AppState) -> Result<EditorConfig, CommandError> {
    Ok(state.db.get_editor_config()?)
}

pub fn save_config(state: &AppState, config: &EditorConfig) -> Result<(), CommandError> {
    state.db.save_editor_config(config)?;
    tracing::info!("editor config saved; takes effect for new windows");
    Ok(())
}

// Post commands
pub async fn new_post(state: &AppState, mode: PresentationMode) {
    let mut controller = state.controller.lock().await;
    controller.reset();
    controller.set_presentation_mode(mode);
}

pub async fn open_post(state: &AppState, id: &str) -> Result<(), CommandError> {
    let mut controller = state.controller.lock().await;
    controller.load(state.db.as_ref(), id).await?;
    controller.load_categories(state.db.as_ref()).await?;
    Ok(())
}

pub fn list_posts(state: &AppState) -> Result<Vec<PostSummary>, CommandError> {
    Ok(state.db.list_posts()?)
}

pub fn delete_post(state: &AppState, id: &str) -> Result<bool, CommandError> {
    Ok(state.db.delete_post(id)?)
}

pub async fn save_post(state: &AppState) -> Result<SaveOutcome, CommandError> {
    let mut controller = state.controller.lock().await;
    Ok(controller.save(state.db.as_ref()).await?)
}

pub async fn publish_post(state: &AppState) -> Result<SaveOutcome, CommandError> {
    let mut controller = state.controller.lock().await;
    Ok(controller.publish(state.db.as_ref()).await?)
}

pub async fn list_categories(state: &AppState, language: &str) -> Result<Vec<CategoryNode>, CommandError> {
    Ok(state.db.list_categories(language).await?)
}

// Media commands
pub async fn list_media(state: &AppState, kind: MediaKind) -> Result<Vec<StoredFile>, CommandError> {
    Ok(state.storage.get_files(kind).await?)
}

/// Delete a stored file. Unless `force` is set, files referenced by the open
/// document are kept.
pub async fn delete_media(state: &AppState, id: &str, force: bool) -> Result<bool, CommandError> {
    if !force {
        if let Some(file) = state.db.get_media_file(id)? {
            let controller = state.controller.lock().await;
            let doc = controller.document();
            let in_use = doc.thumbnail == file.src
                || doc
                    .blocks
                    .blocks()
                    .iter()
                    .any(|b| b.media_urls().contains(&file.src.as_str()));
            if in_use {
                return Err(CommandError::new(format!(
                    "{} is still used by this post",
                    file.filename
                )));
            }
        }
    }

    Ok(state.storage.delete_file(id).await?)
}

pub async fn set_media_target(state: &AppState, target: ActiveEditTarget) {
    state.controller.lock().await.set_target(target);
}

/// Upload a picked file into the active target
pub async fn upload_media(state: &AppState, file: UploadFile) -> Result<UploadedFile, CommandError> {
    Ok(state.pipeline.commit_file_into(&state.controller, file).await?)
}

/// Commit an image-editor save into the active target
pub async fn commit_edited_image(
    state: &AppState,
    image: EditedImage,
    source_url: Option<&str>,
    surface: &dyn EditSurface,
) -> Result<UploadedFile, CommandError> {
    Ok(state
        .pipeline
        .commit_into(&state.controller, image, source_url, surface)
        .await?)
}

/// Use an already-stored file or a pasted URL for the active target
pub async fn pick_media(state: &AppState, url: &str) -> Result<bool, CommandError> {
    let mut controller = state.controller.lock().await;
    let target = controller
        .take_target()
        .ok_or_else(|| CommandError::from(PipelineError::NoTarget))?;
    Ok(controller.apply_media_url(&target, url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::BlockKind;
    use crate::post::types::DocumentField;

    fn state(dir: &std::path::Path) -> AppState {
        let config = EditorConfig {
            storage_root: dir.to_path_buf(),
            ..Default::default()
        };
        AppState::with_database(Arc::new(Database::in_memory().unwrap()), config)
    }

    #[tokio::test]
    async fn test_validation_error_names_field() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());

        let err = save_post(&state).await.unwrap_err();
        assert_eq!(err.field(), Some(DocumentField::Title.as_str()));
    }

    #[tokio::test]
    async fn test_upload_and_guarded_delete() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());

        new_post(&state, PresentationMode::Video).await;
        let block_id = state.controller.lock().await.document().blocks.blocks()[0].id.clone();
        assert_eq!(
            state.controller.lock().await.document().blocks.blocks()[0].kind(),
            BlockKind::Video
        );

        set_media_target(&state, ActiveEditTarget::block(&block_id)).await;
        let uploaded = upload_media(
            &state,
            UploadFile {
                name: "clip.mp4".to_string(),
                mime: "video/mp4".to_string(),
                bytes: vec![0, 0, 0, 24],
            },
        )
        .await
        .unwrap();

        let files = list_media(&state, MediaKind::Video).await.unwrap();
        assert_eq!(files.len(), 1);

        let err = delete_media(&state, &uploaded.id, false).await.unwrap_err();
        assert!(err.message().contains("clip.mp4"));
        assert!(delete_media(&state, &uploaded.id, true).await.unwrap());
    }

    #[tokio::test]
    async fn test_pick_media_needs_target() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());

        assert!(pick_media(&state, "/uploads/x.png").await.is_err());

        set_media_target(&state, ActiveEditTarget::thumbnail()).await;
        assert!(pick_media(&state, "/uploads/x.png").await.unwrap());
        assert_eq!(state.controller.lock().await.document().thumbnail, "/uploads/x.png");
    }
}
