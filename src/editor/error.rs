use thiserror::Error;

use crate::post::types::ValidationIssue;
use crate::services::ServiceError;

#[derive(Error, Debug)]
pub enum DocumentError {
    /// Issues in form order; the first one is the field to focus
    #[error("Validation failed: {}", .0.first().map(|i| i.message.as_str()).unwrap_or("invalid document"))]
    Validation(Vec<ValidationIssue>),

    #[error("Post not found: {0}")]
    NotFound(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] ServiceError),

    #[error("Not allowed: {0}")]
    Guard(String),
}

impl DocumentError {
    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            DocumentError::Validation(issues) => issues,
            _ => &[],
        }
    }
}
