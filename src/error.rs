//! Serving error taxonomy
//!
//! Errors that reach callers of the read path. Cache I/O failures are
//! deliberately absent: the store downgrades them to misses or no-ops and
//! they never surface past it.

use thiserror::Error;

use crate::document::{ExtractionError, TransformationError};

/// Errors surfaced by passage serving and validation
#[derive(Debug, Error)]
pub enum ServeError {
    /// Malformed parameter combination (client-side, never touches the cache)
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Unknown document, tree, or reference (client-side, never touches the cache)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Passage extraction engine failure
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    /// Media transformation engine failure
    #[error("Transformation failed: {0}")]
    Transformation(#[from] TransformationError),

    /// Engine call exceeded the configured bound
    #[error("Engine call timed out after {0} seconds")]
    Timeout(u64),

    /// Reading the document's own storage location failed
    #[error("Document storage error: {0}")]
    Storage(#[from] std::io::Error),
}

/// Result type alias for serving operations
pub type ServeResult<T> = std::result::Result<T, ServeError>;
