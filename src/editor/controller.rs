//! Document controller: the only place the document is mutated.
//!
//! Every operation funnels through [`DocumentController::after_change`], which
//! drives the settle machine and keeps the baseline snapshot current while
//! the document is still seeding.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::blocks::{Block, BlockKind, Direction, SequencingMode};
use crate::config::EditorConfig;
use crate::editor::dirty::{DirtyTracker, ExtraScalars};
use crate::editor::error::DocumentError;
use crate::editor::settle::{Clock, SettleDetector, SettleState, SystemClock};
use crate::editor::target::{self, ActiveEditTarget, TargetId};
use crate::post::types::{
    slugify, tree_contains, validate, CategoryNode, Document, PostRecord, PostStatus,
    PresentationMode,
};
use crate::services::{PersistenceService, TaxonomyService};

/// Result of a successful save or publish
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutcome {
    pub id: String,
    /// True when the save created the post; the controller has been reset
    pub created: bool,
}

pub struct DocumentController {
    document: Document,
    extras: ExtraScalars,
    dirty: DirtyTracker,
    settle: SettleDetector,
    clock: Arc<dyn Clock>,
    config: EditorConfig,
    target: Option<ActiveEditTarget>,
    categories: Vec<CategoryNode>,
}

impl DocumentController {
    pub fn new(config: EditorConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: EditorConfig, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now_ms();
        let document = Document::new(&config.default_language);
        let settle = SettleDetector::new(config.settle_window(), now);

        let mut controller = DocumentController {
            document,
            extras: ExtraScalars::new(),
            dirty: DirtyTracker::new(),
            settle,
            clock,
            config,
            target: None,
            categories: Vec::new(),
        };
        controller.begin_session();
        controller
    }

    // ==================== Read access ====================

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn extras(&self) -> &ExtraScalars {
        &self.extras
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn categories(&self) -> &[CategoryNode] {
        &self.categories
    }

    pub fn target(&self) -> Option<&ActiveEditTarget> {
        self.target.as_ref()
    }

    pub fn settle_state(&self) -> SettleState {
        self.settle.state()
    }

    pub fn is_settled(&self) -> bool {
        self.settle.is_settled_at(self.clock.now_ms())
    }

    /// Unsaved changes since the baseline; always false before settle
    pub fn is_dirty(&self) -> bool {
        self.is_settled() && self.dirty.is_dirty(&self.document, &self.extras)
    }

    pub fn changed_fields(&self) -> Vec<String> {
        if !self.is_settled() {
            return Vec::new();
        }
        self.dirty.changed_fields(&self.document, &self.extras)
    }

    /// Freeze the baseline if the quiet window has elapsed
    pub fn poll_settle(&mut self) -> bool {
        self.settle.poll(self.clock.now_ms())
    }

    // ==================== Lifecycle ====================

    /// Replace the document with a persisted record
    pub fn hydrate(&mut self, record: PostRecord) {
        tracing::info!(id = ?record.id, "hydrating post");
        self.document = Document::from_record(record);
        self.extras.clear();
        self.begin_session();
    }

    /// Load a post through the persistence service.
    ///
    /// On failure the current document is left as it was.
    pub async fn load(
        &mut self,
        persistence: &dyn PersistenceService,
        id: &str,
    ) -> Result<(), DocumentError> {
        match persistence.load_post(id).await? {
            Some(record) => {
                self.hydrate(record);
                Ok(())
            }
            None => {
                tracing::warn!(id, "post not found");
                Err(DocumentError::NotFound(id.to_string()))
            }
        }
    }

    /// Start over with an empty document
    pub fn reset(&mut self) {
        let mode = self.document.presentation_mode;
        self.document = Document::new(&self.config.default_language);
        self.document.presentation_mode = mode;
        self.extras.clear();
        self.begin_session();
        tracing::debug!("document reset");
    }

    fn begin_session(&mut self) {
        self.target = None;
        self.seed_governing_block();
        self.settle.reset(self.clock.now_ms());
        self.dirty.capture(&self.document, &self.extras);
    }

    /// Insert the mode's governing block when none exists
    fn seed_governing_block(&mut self) -> bool {
        let Some(kind) = self.document.presentation_mode.governing_kind() else {
            return false;
        };
        if self.document.governing_block_count() > 0 {
            return false;
        }

        self.document.blocks.append(Block::new(kind));
        tracing::debug!(kind = kind.as_str(), "auto-seeded governing block");
        true
    }

    fn after_change(&mut self) {
        if self.settle.on_change(self.clock.now_ms()) {
            self.dirty.capture(&self.document, &self.extras);
        }
    }

    // ==================== Document fields ====================

    pub fn set_presentation_mode(&mut self, mode: PresentationMode) {
        if self.document.presentation_mode == mode {
            return;
        }
        self.document.presentation_mode = mode;
        self.seed_governing_block();
        self.after_change();
    }

    /// Edit scalar fields and FAQs
    pub fn update_document<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Document),
    {
        f(&mut self.document);
        self.seed_governing_block();
        self.after_change();
    }

    /// Set a host-owned form value that takes part in dirty tracking
    pub fn set_extra(&mut self, key: &str, value: Value) {
        self.extras.insert(key.to_string(), value);
        self.after_change();
    }

    pub async fn load_categories(
        &mut self,
        taxonomy: &dyn TaxonomyService,
    ) -> Result<(), DocumentError> {
        self.categories = taxonomy.list_categories(&self.document.language).await?;
        Ok(())
    }

    /// Switch language; the category is cleared when the new tree lacks it
    pub async fn set_language(
        &mut self,
        language: &str,
        taxonomy: &dyn TaxonomyService,
    ) -> Result<(), DocumentError> {
        let categories = taxonomy.list_categories(language).await?;

        self.document.language = language.to_string();
        if let Some(category_id) = &self.document.category_id {
            if !tree_contains(&categories, category_id) {
                tracing::debug!(category_id = %category_id, language, "clearing category");
                self.document.category_id = None;
            }
        }
        self.categories = categories;
        self.after_change();
        Ok(())
    }

    // ==================== Blocks ====================

    fn check_single_instance(&self, kind: BlockKind) -> Result<(), DocumentError> {
        let mode = self.document.presentation_mode;
        let single = matches!(
            mode,
            PresentationMode::Poll | PresentationMode::Video | PresentationMode::Quiz
        );
        if single
            && mode.governing_kind() == Some(kind)
            && self.document.governing_block_count() > 0
        {
            return Err(DocumentError::Guard(format!(
                "{} mode allows a single {} block",
                mode.as_str(),
                kind.as_str()
            )));
        }
        Ok(())
    }

    /// Append a new block of `kind`; returns its id
    pub fn add_block(&mut self, kind: BlockKind) -> Result<String, DocumentError> {
        self.check_single_instance(kind)?;
        let block = Block::new(kind);
        let id = block.id.clone();
        self.document.blocks.append(block);
        self.after_change();
        Ok(id)
    }

    pub fn insert_block(&mut self, index: usize, kind: BlockKind) -> Result<String, DocumentError> {
        self.check_single_instance(kind)?;
        let block = Block::new(kind);
        let id = block.id.clone();
        self.document.blocks.insert_at(index, block);
        self.after_change();
        Ok(id)
    }

    /// Remove a block; refused silently when it would empty a mandatory mode
    pub fn remove_block(&mut self, id: &str) -> bool {
        let mandatory = self.document.presentation_mode.requires_block();
        let removed = self.document.blocks.remove(id, mandatory);
        if removed {
            if self.target.as_ref().and_then(|t| t.block_id()) == Some(id) {
                self.target = None;
            }
            self.after_change();
        }
        removed
    }

    pub fn move_block(&mut self, index: usize, direction: Direction) -> bool {
        let moved = self.document.blocks.move_block(index, direction);
        if moved {
            self.after_change();
        }
        moved
    }

    pub fn move_block_to(&mut self, from: usize, to: usize) -> bool {
        let moved = self.document.blocks.move_to(from, to);
        if moved {
            self.after_change();
        }
        moved
    }

    pub fn set_sequencing_mode(&mut self, mode: SequencingMode) {
        self.document.blocks.set_mode(mode);
        self.after_change();
    }

    pub fn update_block<F>(&mut self, id: &str, f: F) -> bool
    where
        F: FnOnce(&mut Block),
    {
        let updated = self.document.blocks.update(id, f);
        if updated {
            self.after_change();
        }
        updated
    }

    // ==================== Media targets ====================

    pub fn set_target(&mut self, target: ActiveEditTarget) {
        self.target = Some(target);
    }

    /// Consume the active target
    pub fn take_target(&mut self) -> Option<ActiveEditTarget> {
        self.target.take()
    }

    /// Write `url` wherever `target` resolves against the current document
    pub fn apply_media_url(&mut self, target: &ActiveEditTarget, url: &str) -> bool {
        let applied = match &target.target {
            TargetId::Thumbnail => {
                self.document.thumbnail = url.to_string();
                true
            }
            TargetId::Block(id) => {
                let updated = self
                    .document
                    .blocks
                    .find(id)
                    .and_then(|block| target::apply_to_block(block, target, url));
                match updated {
                    Some(block) => self.document.blocks.replace(block),
                    None => {
                        tracing::warn!(block_id = %id, sub_field = ?target.sub_field, "media target did not resolve");
                        false
                    }
                }
            }
        };

        if applied {
            self.after_change();
        }
        applied
    }

    // ==================== Save ====================

    pub async fn save(
        &mut self,
        persistence: &dyn PersistenceService,
    ) -> Result<SaveOutcome, DocumentError> {
        self.commit(persistence, false).await
    }

    pub async fn publish(
        &mut self,
        persistence: &dyn PersistenceService,
    ) -> Result<SaveOutcome, DocumentError> {
        self.commit(persistence, true).await
    }

    async fn commit(
        &mut self,
        persistence: &dyn PersistenceService,
        publish: bool,
    ) -> Result<SaveOutcome, DocumentError> {
        self.poll_settle();

        let mut candidate = self.document.clone();
        if candidate.slug.trim().is_empty() {
            candidate.slug = slugify(&candidate.title);
        }
        if publish {
            candidate.status = PostStatus::Published;
            if candidate.published_at.is_none() {
                candidate.published_at = Some(chrono::Utc::now().timestamp_millis());
            }
        }

        let issues = validate(&candidate, publish);
        if !issues.is_empty() {
            tracing::debug!(field = issues[0].field.as_str(), "save blocked by validation");
            return Err(DocumentError::Validation(issues));
        }

        let id = persistence.save_post(&candidate.to_record()).await.map_err(|e| {
            tracing::error!(error = %e, "failed to save post");
            DocumentError::from(e)
        })?;

        if self.document.is_new() {
            tracing::info!(id = %id, publish, "created post");
            self.reset();
            return Ok(SaveOutcome { id, created: true });
        }

        tracing::info!(id = %id, publish, "saved post");
        candidate.id = Some(id.clone());
        self.document = candidate;
        self.dirty.capture(&self.document, &self.extras);
        self.settle.settle_now();

        Ok(SaveOutcome { id, created: false })
    }
}
