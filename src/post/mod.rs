//! The post document, its persisted record and the category taxonomy.

pub mod types;
pub mod storage;

pub use types::*;
