//! Read-through serving path
//!
//! Request-time lookup logic: validate the address, serve from the cache,
//! otherwise generate and populate. Validation failures never touch the
//! cache; engine failures propagate to the caller.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::cache::{CacheKey, CacheStore};
use crate::document::{
    DocumentCatalog, DocumentRecord, PassageExtractor, TransformationEngine, Transformed,
    DEFAULT_MEDIA_TYPE,
};
use crate::error::{ServeError, ServeResult};

/// Serves passages and media renderings read-through against the cache.
///
/// Executes inline with the request: a cache miss blocks the caller on
/// engine latency, bounded by the configured timeout.
pub struct PassageService {
    catalog: Arc<dyn DocumentCatalog>,
    store: CacheStore,
    extractor: Arc<dyn PassageExtractor>,
    transformer: Arc<dyn TransformationEngine>,
    engine_timeout: Duration,
}

impl PassageService {
    pub fn new(
        catalog: Arc<dyn DocumentCatalog>,
        store: CacheStore,
        extractor: Arc<dyn PassageExtractor>,
        transformer: Arc<dyn TransformationEngine>,
        engine_timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            store,
            extractor,
            transformer,
            engine_timeout,
        }
    }

    /// Base-XML passage for a reference, from cache or freshly extracted.
    ///
    /// `tree` defaults to the document's default tree when unspecified.
    pub async fn get_passage_or_cache(
        &self,
        document: &str,
        reference: &str,
        range_end: Option<&str>,
        tree: Option<&str>,
    ) -> ServeResult<String> {
        let (record, tree) = self.resolve(document, reference, range_end, tree).await?;
        self.base_passage(&record, reference, range_end, &tree).await
    }

    /// Media rendering for a reference, from cache or generated.
    ///
    /// For non-default media the cache is consulted for the transformed
    /// artifact first, skipping base-passage resolution entirely when the
    /// final artifact is already present.
    pub async fn get_transformed_or_cache(
        &self,
        document: &str,
        reference: &str,
        range_end: Option<&str>,
        tree: Option<&str>,
        media: &str,
    ) -> ServeResult<Transformed> {
        let (record, tree) = self.resolve(document, reference, range_end, tree).await?;

        if media == DEFAULT_MEDIA_TYPE {
            let content = self.base_passage(&record, reference, range_end, &tree).await?;
            return Ok(Transformed {
                content,
                content_type: DEFAULT_MEDIA_TYPE.to_string(),
            });
        }

        let key = CacheKey {
            document: &record.identifier,
            reference,
            range_end,
            media,
            tree: &tree,
        };
        if let Some(content) = self.store.get(&key).await {
            return Ok(Transformed {
                content,
                content_type: self.transformer.content_type_for(media),
            });
        }

        let base = self.base_passage(&record, reference, range_end, &tree).await?;
        tracing::info!(
            document = %record.identifier,
            reference,
            tree = tree.as_str(),
            media,
            "transforming content"
        );
        let transformed = self.transform_bounded(media, &record, &base).await?;
        self.store.save(&key, &transformed.content).await;
        Ok(transformed)
    }

    /// Whole source file of a document; no reference, no cache involved
    pub async fn get_full_document(&self, document: &str) -> ServeResult<String> {
        let record = self.document_record(document).await?;
        Ok(tokio::fs::read_to_string(&record.filepath).await?)
    }

    async fn document_record(&self, document: &str) -> ServeResult<DocumentRecord> {
        if document.is_empty() {
            return Err(ServeError::Validation(
                "document identifier was not provided".to_string(),
            ));
        }
        self.catalog
            .document(document)
            .await
            .ok_or_else(|| ServeError::NotFound(format!("unknown document `{document}`")))
    }

    /// Address validation: document, tree defaulting, reference membership.
    ///
    /// Runs before any cache access, so invalid requests leave the cache
    /// tree untouched.
    async fn resolve(
        &self,
        document: &str,
        reference: &str,
        range_end: Option<&str>,
        tree: Option<&str>,
    ) -> ServeResult<(DocumentRecord, String)> {
        let record = self.document_record(document).await?;
        let nav = self.catalog.navigation(document).await.ok_or_else(|| {
            ServeError::NotFound(format!("document `{document}` does not support navigation"))
        })?;

        let tree = tree.unwrap_or(&record.default_tree).to_string();
        if !nav.has_tree(&tree) {
            return Err(ServeError::NotFound(format!(
                "unknown tree `{tree}` for document `{document}`"
            )));
        }

        if reference.is_empty() {
            return Err(ServeError::Validation(
                "reference parameter was not provided".to_string(),
            ));
        }
        if !nav.contains(&tree, reference) {
            return Err(ServeError::NotFound(format!(
                "unknown reference `{reference}` in tree `{tree}`"
            )));
        }
        if let Some(end) = range_end {
            if !nav.contains(&tree, end) {
                return Err(ServeError::NotFound(format!(
                    "unknown reference `{end}` in tree `{tree}`"
                )));
            }
        }

        Ok((record, tree))
    }

    async fn base_passage(
        &self,
        record: &DocumentRecord,
        reference: &str,
        range_end: Option<&str>,
        tree: &str,
    ) -> ServeResult<String> {
        let key = CacheKey {
            document: &record.identifier,
            reference,
            range_end,
            media: DEFAULT_MEDIA_TYPE,
            tree,
        };
        if let Some(content) = self.store.get(&key).await {
            return Ok(content);
        }

        tracing::info!(
            document = %record.identifier,
            reference,
            tree,
            "generating content"
        );
        let passage = timeout(
            self.engine_timeout,
            self.extractor.extract(record, reference, range_end, tree),
        )
        .await
        .map_err(|_| ServeError::Timeout(self.engine_timeout.as_secs()))??;

        self.store.save(&key, &passage).await;
        Ok(passage)
    }

    async fn transform_bounded(
        &self,
        media: &str,
        record: &DocumentRecord,
        base: &str,
    ) -> ServeResult<Transformed> {
        let transformed = timeout(
            self.engine_timeout,
            self.transformer.transform(media, record, base),
        )
        .await
        .map_err(|_| ServeError::Timeout(self.engine_timeout.as_secs()))??;
        Ok(transformed)
    }
}
