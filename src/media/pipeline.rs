//! Media commit pipeline: `Idle -> Exporting -> Uploading -> Idle | Failed`.
//!
//! Only one commit runs at a time. The edit surface is closed and the busy
//! flag cleared on every exit path by [`CommitGuard`], including when the
//! storage service errors.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::EditorConfig;
use crate::editor::controller::DocumentController;
use crate::editor::target::ActiveEditTarget;
use crate::media::naming::{edited_file_name, resolve_format};
use crate::media::source::obtain_payload;
use crate::media::types::{EditedImage, PipelineError, PipelineState, UploadFile, UploadedFile};
use crate::services::StorageService;

/// The image editor's window, as far as the pipeline is concerned
pub trait EditSurface: Send + Sync {
    fn set_busy(&self, busy: bool);
    fn close(&self);
}

pub struct MediaCommitPipeline {
    storage: Arc<dyn StorageService>,
    http: reqwest::Client,
    config: EditorConfig,
    busy: AtomicBool,
    state: Mutex<PipelineState>,
}

/// Releases the pipeline when dropped
struct CommitGuard<'a> {
    pipeline: &'a MediaCommitPipeline,
    surface: Option<&'a dyn EditSurface>,
}

impl Drop for CommitGuard<'_> {
    fn drop(&mut self) {
        if let Some(surface) = self.surface {
            surface.set_busy(false);
            surface.close();
        }
        if self.pipeline.state() != PipelineState::Failed {
            self.pipeline.set_state(PipelineState::Idle);
        }
        self.pipeline.busy.store(false, Ordering::SeqCst);
    }
}

impl MediaCommitPipeline {
    pub fn new(storage: Arc<dyn StorageService>, config: EditorConfig) -> Self {
        Self {
            storage,
            http: reqwest::Client::new(),
            config,
            busy: AtomicBool::new(false),
            state: Mutex::new(PipelineState::Idle),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state.lock().map(|s| *s).unwrap_or(PipelineState::Failed)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    fn set_state(&self, next: PipelineState) {
        if let Ok(mut state) = self.state.lock() {
            if *state != next {
                tracing::info!(from = state.as_str(), to = next.as_str(), "media pipeline state");
                *state = next;
            }
        }
    }

    fn begin<'a>(&'a self, surface: Option<&'a dyn EditSurface>) -> Result<CommitGuard<'a>, PipelineError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!("media commit already in flight");
            return Err(PipelineError::Busy);
        }
        if let Some(surface) = surface {
            surface.set_busy(true);
        }
        Ok(CommitGuard {
            pipeline: self,
            surface,
        })
    }

    fn fail(&self, err: PipelineError) -> PipelineError {
        tracing::warn!(error = %err, "media commit failed");
        self.set_state(PipelineState::Failed);
        err
    }

    async fn upload(&self, file: UploadFile, path_hint: Option<&str>) -> Result<UploadedFile, PipelineError> {
        self.set_state(PipelineState::Uploading);
        let name = file.name.clone();
        let uploaded = self
            .storage
            .upload_file(file, path_hint)
            .await?
            .ok_or(PipelineError::UploadRejected)?;
        tracing::info!(name = %name, src = %uploaded.src, "media committed");
        Ok(uploaded)
    }

    async fn export_and_upload(
        &self,
        image: EditedImage,
        source_url: Option<&str>,
    ) -> Result<UploadedFile, PipelineError> {
        self.set_state(PipelineState::Exporting);
        let blob = obtain_payload(image, &self.http, &self.config).await?;

        // The produced blob decides the type, not the requested one
        let (ext, mime) = resolve_format(&blob);
        let (name, path_hint) =
            edited_file_name(source_url, ext, chrono::Utc::now().timestamp_millis());

        let file = UploadFile {
            name,
            mime,
            bytes: blob.bytes,
        };
        self.upload(file, path_hint.as_deref()).await
    }

    /// Commit an image-editor result. `source_url` is the media being
    /// edited, if any; re-saves of stored files keep their name and bucket.
    pub async fn commit_edited(
        &self,
        image: EditedImage,
        source_url: Option<&str>,
        surface: &dyn EditSurface,
    ) -> Result<UploadedFile, PipelineError> {
        let _guard = self.begin(Some(surface))?;
        self.export_and_upload(image, source_url)
            .await
            .map_err(|e| self.fail(e))
    }

    /// Upload a file from the picker as-is
    pub async fn commit_file(
        &self,
        file: UploadFile,
        path_hint: Option<&str>,
    ) -> Result<UploadedFile, PipelineError> {
        let _guard = self.begin(None)?;
        self.upload(file, path_hint).await.map_err(|e| self.fail(e))
    }

    /// User closed the editor. An in-flight upload keeps running.
    pub fn dismiss(&self, surface: &dyn EditSurface) {
        if self.is_busy() {
            tracing::debug!("edit surface dismissed while a commit is in flight");
        }
        surface.close();
    }

    /// Commit an edited image into the controller's active target.
    ///
    /// The target is taken up front; the controller is not locked while the
    /// export and upload run, and the write re-reads the current document.
    /// A commit refused as busy hands the target back and leaves the surface
    /// open.
    pub async fn commit_into(
        &self,
        controller: &tokio::sync::Mutex<DocumentController>,
        image: EditedImage,
        source_url: Option<&str>,
        surface: &dyn EditSurface,
    ) -> Result<UploadedFile, PipelineError> {
        let Some(target) = controller.lock().await.take_target() else {
            surface.close();
            return Err(PipelineError::NoTarget);
        };

        let uploaded = match self.commit_edited(image, source_url, surface).await {
            Err(PipelineError::Busy) => return Err(self.restore_target(controller, target).await),
            result => result?,
        };
        self.apply(controller, &target, &uploaded).await;
        Ok(uploaded)
    }

    /// Upload a picked file into the controller's active target
    pub async fn commit_file_into(
        &self,
        controller: &tokio::sync::Mutex<DocumentController>,
        file: UploadFile,
    ) -> Result<UploadedFile, PipelineError> {
        let target = controller
            .lock()
            .await
            .take_target()
            .ok_or(PipelineError::NoTarget)?;

        let uploaded = match self.commit_file(file, None).await {
            Err(PipelineError::Busy) => return Err(self.restore_target(controller, target).await),
            result => result?,
        };
        self.apply(controller, &target, &uploaded).await;
        Ok(uploaded)
    }

    async fn restore_target(
        &self,
        controller: &tokio::sync::Mutex<DocumentController>,
        target: ActiveEditTarget,
    ) -> PipelineError {
        let mut controller = controller.lock().await;
        // A target picked while this commit waited wins
        if controller.target().is_none() {
            controller.set_target(target);
        }
        PipelineError::Busy
    }

    async fn apply(
        &self,
        controller: &tokio::sync::Mutex<DocumentController>,
        target: &ActiveEditTarget,
        uploaded: &UploadedFile,
    ) {
        let mut controller = controller.lock().await;
        if !controller.apply_media_url(target, &uploaded.src) {
            tracing::warn!(src = %uploaded.src, "uploaded media had nowhere to go");
        }
    }
}
