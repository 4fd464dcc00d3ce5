//! Media: edited-image export, payload sources, naming, the commit pipeline
//! and the local storage service.

pub mod export;
pub mod naming;
pub mod pipeline;
pub mod source;
pub mod storage;
pub mod types;

pub use export::{export_with_fallback, ImageSurface, RasterSurface};
pub use pipeline::{EditSurface, MediaCommitPipeline};
pub use storage::{LocalStorage, StorageError};
pub use types::*;
