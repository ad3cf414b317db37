//! Document model and collaborator contracts
//!
//! Types describing documents and their navigation structure, plus the
//! trait seams to the external collaborators: the passage extraction
//! engine, the media transformation engine, and the metadata catalog.

mod catalog;
mod traits;
mod types;

pub use catalog::InMemoryCatalog;
pub use traits::{
    DocumentCatalog, EngineProvider, EngineSet, ExtractionError, PassageExtractor,
    TransformationEngine, Transformed, TransformationError,
};
pub use types::{DocumentRecord, NavigationIndex, RefDescriptor, WorkItem, DEFAULT_MEDIA_TYPE};
