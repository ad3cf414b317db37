//! Palimpsest
//!
//! Disk prerendering cache and parallel batch pipeline for
//! hierarchically-addressed document passages.
//!
//! Serving a passage means extracting a fragment of a source XML document
//! and, for non-default media types, transforming it. Both steps are
//! expensive. This crate caches the results on disk under deterministic
//! hash-derived paths, serves them read-through at request time, and
//! pre-warms the whole corpus offline with a bounded worker pool.
//!
//! # Modules
//!
//! - `cache`: cache key derivation and the fail-safe disk store
//! - `document`: document/navigation types and collaborator contracts
//! - `serve`: the request-time read-through path
//! - `batch`: the offline parallel warming pipeline
//! - `config`: environment-level configuration
//!
//! The HTTP layer, the relational catalog, CLI parsing, and the actual
//! extraction/transformation engines live outside this crate and are
//! reached through the traits in [`document`].

pub mod batch;
pub mod cache;
pub mod config;
pub mod document;
pub mod error;
pub mod serve;

pub use batch::{BatchConfig, BatchGenerator, BatchReport, CancelFlag};
pub use cache::{CacheConfig, CacheKey, CacheMetrics, CacheStore, CacheTreeStats, Confirmation};
pub use config::Config;
pub use document::{
    DocumentCatalog, DocumentRecord, EngineProvider, EngineSet, ExtractionError, InMemoryCatalog,
    NavigationIndex, PassageExtractor, RefDescriptor, TransformationEngine, Transformed,
    TransformationError, WorkItem, DEFAULT_MEDIA_TYPE,
};
pub use error::{ServeError, ServeResult};
pub use serve::PassageService;
