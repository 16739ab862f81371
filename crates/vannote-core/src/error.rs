//! VanNote Error Definitions
//!
//! Defines error types used throughout the data layer.

use thiserror::Error;

use crate::types::{AnnotationId, CollectionId, TemplateId, VideoId};

/// Core data layer error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Not Found Errors
    // =========================================================================
    #[error("Video not found: {0}")]
    VideoNotFound(VideoId),

    #[error("Annotation not found: {0}")]
    AnnotationNotFound(AnnotationId),

    #[error("Collection not found: {0}")]
    CollectionNotFound(CollectionId),

    #[error("Template not found: {0}")]
    TemplateNotFound(TemplateId),

    // =========================================================================
    // Storage Errors
    // =========================================================================
    #[error("Stored list '{key}' is corrupted: {message}")]
    StorageCorrupted { key: String, message: String },

    #[error("Storage backend error: {0}")]
    Storage(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    // =========================================================================
    // Exchange Errors
    // =========================================================================
    #[error("No data to export")]
    NothingToExport,

    #[error("Invalid import document: {0}")]
    InvalidImport(String),

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Core data layer result type
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Returns true for the "target id does not resolve" family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoreError::VideoNotFound(_)
                | CoreError::AnnotationNotFound(_)
                | CoreError::CollectionNotFound(_)
                | CoreError::TemplateNotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_family() {
        assert!(CoreError::VideoNotFound("v1".into()).is_not_found());
        assert!(CoreError::TemplateNotFound("t1".into()).is_not_found());
        assert!(!CoreError::NothingToExport.is_not_found());
        assert!(!CoreError::ValidationError("x".into()).is_not_found());
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            CoreError::AnnotationNotFound("a1".into()).to_string(),
            "Annotation not found: a1"
        );
        let err = CoreError::StorageCorrupted {
            key: "videos".into(),
            message: "expected array".into(),
        };
        assert_eq!(
            err.to_string(),
            "Stored list 'videos' is corrupted: expected array"
        );
    }
}
