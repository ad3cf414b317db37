//! Batch cache warming
//!
//! Brings every navigable reference of every document in the corpus to a
//! warmed state: a cached base passage plus a cached artifact per
//! requested media type. One WorkItem per document; a bounded pool of
//! workers drains the queue in no particular order. Each worker builds
//! its own engine instances once and owns them for its lifetime.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tokio::time::timeout;

use crate::cache::{CacheKey, CacheStore};
use crate::document::{
    DocumentCatalog, DocumentRecord, EngineProvider, EngineSet, WorkItem, DEFAULT_MEDIA_TYPE,
};
use crate::error::{ServeError, ServeResult};

use super::stats::{BatchReport, BatchStatsInternal};

/// Batch pipeline configuration
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Upper bound on parallel workers; the pool size is
    /// `min(workers, document count)`
    pub workers: usize,
    /// Media types to warm beyond the base passage
    pub media_types: Vec<String>,
    /// Regenerate artifacts that are already cached
    pub force: bool,
    /// Bound on each extraction/transformation call
    pub engine_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            media_types: Vec::new(),
            force: false,
            engine_timeout: Duration::from_secs(30),
        }
    }
}

/// Cooperative cancellation signal.
///
/// Checked between WorkItems and between references; there is no
/// mid-engine-call abort beyond the engine timeout.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Offline pipeline that pre-warms the cache across the corpus
pub struct BatchGenerator {
    catalog: Arc<dyn DocumentCatalog>,
    store: CacheStore,
    engines: Arc<dyn EngineProvider>,
    config: BatchConfig,
}

impl BatchGenerator {
    pub fn new(
        catalog: Arc<dyn DocumentCatalog>,
        store: CacheStore,
        engines: Arc<dyn EngineProvider>,
        config: BatchConfig,
    ) -> Self {
        Self {
            catalog,
            store,
            engines,
            config,
        }
    }

    /// Run one warming pass over the whole corpus.
    ///
    /// Re-running with `force = false` against a fully warmed corpus
    /// performs zero writes. Failures are isolated: a bad reference or a
    /// bad document never aborts sibling work.
    pub async fn run(&self, cancel: CancelFlag) -> BatchReport {
        let started = Instant::now();
        let stats = Arc::new(BatchStatsInternal::default());

        let ids = self.catalog.document_ids().await;
        let total = ids.len();
        if total == 0 {
            tracing::info!("batch generation: empty corpus, nothing to do");
            return stats.snapshot(cancel.is_cancelled(), started.elapsed());
        }

        let queue: VecDeque<WorkItem> = ids
            .into_iter()
            .map(|document_id| WorkItem {
                document_id,
                media_types: self.config.media_types.clone(),
                force: self.config.force,
            })
            .collect();
        let queue = Arc::new(tokio::sync::Mutex::new(queue));

        let workers = self.config.workers.max(1).min(total);
        tracing::info!(
            documents = total,
            workers,
            force = self.config.force,
            media_types = ?self.config.media_types,
            "batch generation starting"
        );

        let mut pool = JoinSet::new();
        for worker_id in 0..workers {
            let context = WorkerContext {
                worker_id,
                queue: queue.clone(),
                catalog: self.catalog.clone(),
                store: self.store.clone(),
                engines: self.engines.clone(),
                engine_timeout: self.config.engine_timeout,
                cancel: cancel.clone(),
                stats: stats.clone(),
                total,
                started,
            };
            pool.spawn(worker_loop(context));
        }

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "batch worker panicked");
            }
        }

        let report = stats.snapshot(cancel.is_cancelled(), started.elapsed());
        tracing::info!(
            documents_completed = report.documents_completed,
            documents_failed = report.documents_failed,
            artifacts_generated = report.artifacts_generated,
            references_failed = report.references_failed,
            cancelled = report.cancelled,
            elapsed_secs = report.elapsed.as_secs_f64(),
            "batch generation finished"
        );
        report
    }
}

struct WorkerContext {
    worker_id: usize,
    queue: Arc<tokio::sync::Mutex<VecDeque<WorkItem>>>,
    catalog: Arc<dyn DocumentCatalog>,
    store: CacheStore,
    engines: Arc<dyn EngineProvider>,
    engine_timeout: Duration,
    cancel: CancelFlag,
    stats: Arc<BatchStatsInternal>,
    total: usize,
    started: Instant,
}

/// One worker: build engines once, then drain the queue
async fn worker_loop(ctx: WorkerContext) {
    let engines = ctx.engines.engines().await;

    loop {
        if ctx.cancel.is_cancelled() {
            tracing::debug!(worker = ctx.worker_id, "worker stopping on cancellation");
            break;
        }
        let item = { ctx.queue.lock().await.pop_front() };
        let Some(item) = item else {
            break;
        };

        match warm_document(&ctx, &engines, &item).await {
            Ok(false) => {
                // Cut short by cancellation; the outer check exits the loop.
                continue;
            }
            Ok(true) => {
                let done = ctx.stats.inc_documents_completed();
                let artifacts = ctx.stats.artifacts();
                let elapsed = ctx.started.elapsed().as_secs_f64();
                let rate = if elapsed > 0.0 {
                    artifacts as f64 / elapsed
                } else {
                    0.0
                };
                tracing::info!(
                    worker = ctx.worker_id,
                    document = %item.document_id,
                    documents_done = done,
                    documents_total = ctx.total,
                    artifacts,
                    artifacts_per_sec = rate,
                    "document warmed"
                );
            }
            Err(e) => {
                ctx.stats.inc_documents_failed();
                tracing::warn!(
                    worker = ctx.worker_id,
                    document = %item.document_id,
                    error = %e,
                    "document skipped, continuing with remaining work"
                );
            }
        }
    }
}

/// Warm every (tree, reference) pair of one document.
///
/// Returns whether the document was fully processed (`false` when the
/// cancellation signal cut it short). An error means the document itself
/// could not be processed (no record or navigation). Engine failures on
/// individual references are logged and counted inside, and never
/// propagate.
async fn warm_document(
    ctx: &WorkerContext,
    engines: &EngineSet,
    item: &WorkItem,
) -> ServeResult<bool> {
    let record = ctx
        .catalog
        .document(&item.document_id)
        .await
        .ok_or_else(|| ServeError::NotFound(format!("unknown document `{}`", item.document_id)))?;
    let nav = ctx.catalog.navigation(&item.document_id).await.ok_or_else(|| {
        ServeError::NotFound(format!(
            "document `{}` does not support navigation",
            item.document_id
        ))
    })?;

    for (tree, descriptors) in &nav.references {
        for descriptor in descriptors {
            if ctx.cancel.is_cancelled() {
                return Ok(false);
            }
            ctx.stats.inc_references_visited();

            let reference = descriptor.identifier.as_str();
            if let Err(e) = warm_reference(ctx, engines, item, &record, tree, reference).await {
                ctx.stats.inc_references_failed();
                tracing::warn!(
                    document = %record.identifier,
                    tree = tree.as_str(),
                    reference,
                    error = %e,
                    "reference generation failed, skipping"
                );
            }
        }
    }
    Ok(true)
}

/// Warm the base passage and every requested rendering of one reference
async fn warm_reference(
    ctx: &WorkerContext,
    engines: &EngineSet,
    item: &WorkItem,
    record: &DocumentRecord,
    tree: &str,
    reference: &str,
) -> ServeResult<()> {
    let base_key = CacheKey {
        document: &record.identifier,
        reference,
        range_end: None,
        media: DEFAULT_MEDIA_TYPE,
        tree,
    };

    let base_content = match ctx.store.get(&base_key).await {
        Some(content) if !item.force => content,
        _ => {
            let passage = timeout(
                ctx.engine_timeout,
                engines.extractor.extract(record, reference, None, tree),
            )
            .await
            .map_err(|_| ServeError::Timeout(ctx.engine_timeout.as_secs()))??;
            ctx.store.save(&base_key, &passage).await;
            ctx.stats.inc_artifacts_generated();
            passage
        }
    };

    for media in &item.media_types {
        let key = CacheKey {
            media: media.as_str(),
            ..base_key
        };
        if ctx.store.get(&key).await.is_none() || item.force {
            let transformed = timeout(
                ctx.engine_timeout,
                engines.transformer.transform(media, record, &base_content),
            )
            .await
            .map_err(|_| ServeError::Timeout(ctx.engine_timeout.as_secs()))??;
            ctx.store.save(&key, &transformed.content).await;
            ctx.stats.inc_artifacts_generated();
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::document::{
        ExtractionError, InMemoryCatalog, NavigationIndex, PassageExtractor, RefDescriptor,
        TransformationEngine, Transformed, TransformationError,
    };
    use async_trait::async_trait;
    use std::collections::{BTreeMap, HashSet};
    use std::path::PathBuf;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    struct MockExtractor {
        calls: Arc<AtomicUsize>,
        fail_for: Option<String>,
    }

    #[async_trait]
    impl PassageExtractor for MockExtractor {
        async fn extract(
            &self,
            document: &DocumentRecord,
            reference: &str,
            _range_end: Option<&str>,
            tree: &str,
        ) -> Result<String, ExtractionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_for.as_deref() == Some(document.identifier.as_str()) {
                return Err(ExtractionError::new("engine exploded"));
            }
            Ok(format!("<tei>{}/{}/{}</tei>", document.identifier, tree, reference))
        }
    }

    struct MockTransformer {
        calls: Arc<AtomicUsize>,
        supported: HashSet<String>,
    }

    #[async_trait]
    impl TransformationEngine for MockTransformer {
        fn supported_media_types(&self) -> &HashSet<String> {
            &self.supported
        }

        async fn transform_supported(
            &self,
            _media: &str,
            _document: &DocumentRecord,
            xml: &str,
        ) -> Result<Transformed, TransformationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Transformed {
                content: format!("<html>{xml}</html>"),
                content_type: "text/html".to_string(),
            })
        }
    }

    struct MockProvider {
        extract_calls: Arc<AtomicUsize>,
        transform_calls: Arc<AtomicUsize>,
        builds: Arc<AtomicUsize>,
        fail_for: Option<String>,
    }

    #[async_trait]
    impl EngineProvider for MockProvider {
        async fn engines(&self) -> EngineSet {
            self.builds.fetch_add(1, Ordering::SeqCst);
            EngineSet {
                extractor: Arc::new(MockExtractor {
                    calls: self.extract_calls.clone(),
                    fail_for: self.fail_for.clone(),
                }),
                transformer: Arc::new(MockTransformer {
                    calls: self.transform_calls.clone(),
                    supported: ["html".to_string()].into_iter().collect(),
                }),
            }
        }
    }

    struct Fixture {
        _dir: TempDir,
        store: CacheStore,
        catalog: Arc<InMemoryCatalog>,
        extract_calls: Arc<AtomicUsize>,
        transform_calls: Arc<AtomicUsize>,
        builds: Arc<AtomicUsize>,
    }

    fn two_ref_document(id: &str) -> (DocumentRecord, NavigationIndex) {
        let mut refs = BTreeMap::new();
        refs.insert(
            "default".to_string(),
            vec![RefDescriptor::new("p1"), RefDescriptor::new("p2")],
        );
        (
            DocumentRecord {
                identifier: id.to_string(),
                filepath: PathBuf::from(format!("/corpus/{id}.xml")),
                default_tree: "default".to_string(),
            },
            NavigationIndex::new(refs),
        )
    }

    fn fixture(document_ids: &[&str]) -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(CacheConfig {
            root: dir.path().to_path_buf(),
            ..CacheConfig::default()
        });
        let mut catalog = InMemoryCatalog::new();
        for id in document_ids {
            let (record, nav) = two_ref_document(id);
            catalog.insert(record, nav);
        }
        Fixture {
            _dir: dir,
            store,
            catalog: Arc::new(catalog),
            extract_calls: Arc::new(AtomicUsize::new(0)),
            transform_calls: Arc::new(AtomicUsize::new(0)),
            builds: Arc::new(AtomicUsize::new(0)),
        }
    }

    impl Fixture {
        fn generator(&self, config: BatchConfig) -> BatchGenerator {
            self.generator_failing(config, None)
        }

        fn generator_failing(&self, config: BatchConfig, fail_for: Option<&str>) -> BatchGenerator {
            BatchGenerator::new(
                self.catalog.clone(),
                self.store.clone(),
                Arc::new(MockProvider {
                    extract_calls: self.extract_calls.clone(),
                    transform_calls: self.transform_calls.clone(),
                    builds: self.builds.clone(),
                    fail_for: fail_for.map(String::from),
                }),
                config,
            )
        }
    }

    fn html_config(workers: usize, force: bool) -> BatchConfig {
        BatchConfig {
            workers,
            media_types: vec!["html".to_string()],
            force,
            engine_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn warms_base_and_media_artifacts() {
        let fx = fixture(&["ms001"]);
        let report = fx.generator(html_config(2, false)).run(CancelFlag::new()).await;

        assert_eq!(report.documents_completed, 1);
        assert_eq!(report.references_visited, 2);
        assert_eq!(report.artifacts_generated, 4);
        assert_eq!(report.references_failed, 0);
        assert!(!report.cancelled);
        assert_eq!(fx.store.stats().await.unwrap().files, 4);
    }

    #[tokio::test]
    async fn second_pass_is_a_fixed_point() {
        let fx = fixture(&["ms001", "ms002"]);

        let first = fx.generator(html_config(2, false)).run(CancelFlag::new()).await;
        assert_eq!(first.artifacts_generated, 8);

        let extracts_before = fx.extract_calls.load(Ordering::SeqCst);
        let second = fx.generator(html_config(2, false)).run(CancelFlag::new()).await;
        assert_eq!(second.artifacts_generated, 0);
        assert_eq!(second.documents_completed, 2);
        assert_eq!(fx.extract_calls.load(Ordering::SeqCst), extracts_before);
        assert_eq!(fx.transform_calls.load(Ordering::SeqCst), extracts_before);
    }

    #[tokio::test]
    async fn force_regenerates_everything() {
        let fx = fixture(&["ms001"]);

        fx.generator(html_config(1, false)).run(CancelFlag::new()).await;
        let report = fx.generator(html_config(1, true)).run(CancelFlag::new()).await;

        assert_eq!(report.artifacts_generated, 4);
        assert_eq!(fx.extract_calls.load(Ordering::SeqCst), 4);
        assert_eq!(fx.store.stats().await.unwrap().files, 4);
    }

    #[tokio::test]
    async fn one_failing_document_does_not_abort_the_rest() {
        let fx = fixture(&["ms001", "ms002", "ms003"]);
        let generator = fx.generator_failing(html_config(2, false), Some("ms002"));
        let report = generator.run(CancelFlag::new()).await;

        // ms002's two references fail at extraction; everything else warms.
        assert_eq!(report.documents_completed, 3);
        assert_eq!(report.references_failed, 2);
        assert_eq!(report.artifacts_generated, 8);
        assert_eq!(fx.store.stats().await.unwrap().files, 8);
    }

    #[tokio::test]
    async fn unknown_document_counts_as_failed() {
        let fx = fixture(&["ms001"]);

        // A catalog that lists an id it cannot resolve.
        struct HalfCatalog {
            inner: Arc<InMemoryCatalog>,
        }

        #[async_trait]
        impl DocumentCatalog for HalfCatalog {
            async fn document(&self, identifier: &str) -> Option<DocumentRecord> {
                self.inner.document(identifier).await
            }
            async fn navigation(&self, identifier: &str) -> Option<NavigationIndex> {
                self.inner.navigation(identifier).await
            }
            async fn document_ids(&self) -> Vec<String> {
                vec!["ms001".to_string(), "ghost".to_string()]
            }
        }

        let generator = BatchGenerator::new(
            Arc::new(HalfCatalog {
                inner: fx.catalog.clone(),
            }),
            fx.store.clone(),
            Arc::new(MockProvider {
                extract_calls: fx.extract_calls.clone(),
                transform_calls: fx.transform_calls.clone(),
                builds: fx.builds.clone(),
                fail_for: None,
            }),
            html_config(2, false),
        );
        let report = generator.run(CancelFlag::new()).await;

        assert_eq!(report.documents_completed, 1);
        assert_eq!(report.documents_failed, 1);
        assert_eq!(report.artifacts_generated, 4);
    }

    #[tokio::test]
    async fn cancellation_stops_between_items() {
        let fx = fixture(&["ms001", "ms002"]);
        let cancel = CancelFlag::new();
        cancel.cancel();

        let report = fx.generator(html_config(2, false)).run(cancel).await;
        assert!(report.cancelled);
        assert_eq!(report.documents_completed, 0);
        assert_eq!(report.artifacts_generated, 0);
    }

    #[tokio::test]
    async fn each_worker_builds_engines_once() {
        let fx = fixture(&["ms001", "ms002", "ms003", "ms004"]);
        fx.generator(html_config(3, false)).run(CancelFlag::new()).await;
        assert_eq!(fx.builds.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn pool_never_exceeds_document_count() {
        let fx = fixture(&["ms001"]);
        fx.generator(html_config(8, false)).run(CancelFlag::new()).await;
        // min(workers, documents) = 1
        assert_eq!(fx.builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_corpus_is_a_noop() {
        let fx = fixture(&[]);
        let report = fx.generator(html_config(4, false)).run(CancelFlag::new()).await;
        assert_eq!(report, BatchReport { elapsed: report.elapsed, ..BatchReport::default() });
        assert_eq!(fx.builds.load(Ordering::SeqCst), 0);
    }
}
