//! Collaborator contracts
//!
//! Seams to the external engines and the metadata collaborator. The
//! extraction and transformation engines live outside this crate; only
//! their call contracts are defined here.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use super::types::{DocumentRecord, NavigationIndex};

/// Passage extraction engine failure
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ExtractionError {
    pub message: String,
}

impl ExtractionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Media transformation engine failure
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransformationError {
    pub message: String,
}

impl TransformationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Extracts the base XML for a reference out of a document.
///
/// Reference validity is assumed pre-checked by the caller; an error here
/// is an engine failure, not a bad address.
#[async_trait]
pub trait PassageExtractor: Send + Sync {
    async fn extract(
        &self,
        document: &DocumentRecord,
        reference: &str,
        range_end: Option<&str>,
        tree: &str,
    ) -> Result<String, ExtractionError>;
}

/// A transformed passage plus the content type it should be served with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    pub content: String,
    pub content_type: String,
}

/// Transforms base XML into a media-specific rendering.
///
/// Implementors declare the media types they handle and override
/// [`transform_supported`](TransformationEngine::transform_supported);
/// the provided [`transform`](TransformationEngine::transform) routes
/// unsupported media through the passthrough fallback, returning the
/// input unchanged.
#[async_trait]
pub trait TransformationEngine: Send + Sync {
    /// Media types this engine can produce
    fn supported_media_types(&self) -> &HashSet<String>;

    /// Content type a rendering of `media` should be served with.
    ///
    /// Defaults to the media string itself; engines with a mapping
    /// (e.g. `"html"` -> `"text/html"`) override this.
    fn content_type_for(&self, media: &str) -> String {
        media.to_string()
    }

    /// Transform `xml` into one of the supported media types
    async fn transform_supported(
        &self,
        media: &str,
        document: &DocumentRecord,
        xml: &str,
    ) -> Result<Transformed, TransformationError>;

    /// Transform with passthrough fallback for unsupported media
    async fn transform(
        &self,
        media: &str,
        document: &DocumentRecord,
        xml: &str,
    ) -> Result<Transformed, TransformationError> {
        if !self.supported_media_types().contains(media) {
            return Ok(Transformed {
                content: xml.to_string(),
                content_type: self.content_type_for(media),
            });
        }
        self.transform_supported(media, document, xml).await
    }
}

/// Navigation and document metadata collaborator.
///
/// Owns the document records and navigation indexes; this crate consumes
/// them and never mutates them.
#[async_trait]
pub trait DocumentCatalog: Send + Sync {
    /// Look up one document's record
    async fn document(&self, identifier: &str) -> Option<DocumentRecord>;

    /// Look up one document's navigation index
    async fn navigation(&self, identifier: &str) -> Option<NavigationIndex>;

    /// All document identifiers, for corpus-wide batch enumeration
    async fn document_ids(&self) -> Vec<String>;
}

/// One worker's engine instances
pub struct EngineSet {
    pub extractor: Arc<dyn PassageExtractor>,
    pub transformer: Arc<dyn TransformationEngine>,
}

/// Builds engine instances for batch workers.
///
/// Each worker calls this once and owns the returned set for its lifetime;
/// no engine or session state is shared across workers.
#[async_trait]
pub trait EngineProvider: Send + Sync {
    async fn engines(&self) -> EngineSet;
}
