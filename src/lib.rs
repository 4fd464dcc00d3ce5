pub mod blocks;
pub mod commands;
pub mod config;
pub mod database;
pub mod editor;
pub mod media;
pub mod post;
pub mod services;

pub use blocks::{Block, BlockContent, BlockKind, BlockSequence, Direction, SequencingMode};
pub use commands::{AppState, CommandError};
pub use config::EditorConfig;
pub use database::{Database, DbError};
pub use editor::{ActiveEditTarget, DocumentController, DocumentError, SaveOutcome};
pub use media::{EditedImage, LocalStorage, MediaCommitPipeline, PipelineError, PipelineState};
pub use post::types::{Document, PostRecord, PresentationMode};
pub use services::{PersistenceService, ServiceError, StorageService, TaxonomyService};

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the stderr log subscriber. `RUST_LOG` overrides the default
/// `info` level. Safe to call more than once.
pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
