//! In-memory catalog
//!
//! Reference implementation of [`DocumentCatalog`] backed by plain maps.
//! The production metadata collaborator is a database; this stands in for
//! it in embedders and tests. Read-only once built, so no locking.

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::traits::DocumentCatalog;
use super::types::{DocumentRecord, NavigationIndex};

/// Map-backed document catalog
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    documents: BTreeMap<String, (DocumentRecord, NavigationIndex)>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document with its navigation index
    pub fn insert(&mut self, record: DocumentRecord, navigation: NavigationIndex) {
        self.documents
            .insert(record.identifier.clone(), (record, navigation));
    }

    /// Number of registered documents
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl DocumentCatalog for InMemoryCatalog {
    async fn document(&self, identifier: &str) -> Option<DocumentRecord> {
        self.documents.get(identifier).map(|(record, _)| record.clone())
    }

    async fn navigation(&self, identifier: &str) -> Option<NavigationIndex> {
        self.documents.get(identifier).map(|(_, nav)| nav.clone())
    }

    async fn document_ids(&self) -> Vec<String> {
        self.documents.keys().cloned().collect()
    }
}
