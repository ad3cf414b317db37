//! Document and navigation data types

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Media type of an untransformed base passage
pub const DEFAULT_MEDIA_TYPE: &str = "application/xml";

/// Metadata for one document, as supplied by the catalog collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Stable document identifier used for cache addressing
    pub identifier: String,
    /// Storage location of the source file
    pub filepath: PathBuf,
    /// Tree used when a request leaves the tree unspecified
    pub default_tree: String,
}

/// One navigable reference within a tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefDescriptor {
    /// The reference string, as addressed by clients
    pub identifier: String,
}

impl RefDescriptor {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
        }
    }
}

/// Per-document navigation structure: which (tree, reference) pairs exist.
///
/// Built once by the metadata collaborator and never mutated afterwards.
/// `references` drives ordered batch iteration; the derived valid-reference
/// sets answer membership checks on the read path.
#[derive(Debug, Clone, Default)]
pub struct NavigationIndex {
    /// Tree name -> ordered reference descriptors
    pub references: BTreeMap<String, Vec<RefDescriptor>>,
    /// Tree name -> set of valid reference strings
    valid: HashMap<String, HashSet<String>>,
}

impl NavigationIndex {
    /// Build an index from ordered references per tree.
    ///
    /// The valid-reference sets are derived from the same descriptors, so
    /// the two views cannot disagree.
    pub fn new(references: BTreeMap<String, Vec<RefDescriptor>>) -> Self {
        let valid = references
            .iter()
            .map(|(tree, refs)| {
                let set = refs.iter().map(|r| r.identifier.clone()).collect();
                (tree.clone(), set)
            })
            .collect();
        Self { references, valid }
    }

    /// Whether the named tree exists in this document
    pub fn has_tree(&self, tree: &str) -> bool {
        self.references.contains_key(tree)
    }

    /// Whether `reference` is a valid address within `tree`
    pub fn contains(&self, tree: &str, reference: &str) -> bool {
        self.valid
            .get(tree)
            .map(|set| set.contains(reference))
            .unwrap_or(false)
    }

    /// Ordered references for one tree, if it exists
    pub fn tree_references(&self, tree: &str) -> Option<&[RefDescriptor]> {
        self.references.get(tree).map(|v| v.as_slice())
    }
}

/// Unit of batch work: warm every navigable reference of one document
#[derive(Debug, Clone)]
pub struct WorkItem {
    /// Document to warm
    pub document_id: String,
    /// Media types to generate beyond the base passage
    pub media_types: Vec<String>,
    /// Regenerate even when an artifact is already cached
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> NavigationIndex {
        let mut refs = BTreeMap::new();
        refs.insert(
            "default".to_string(),
            vec![RefDescriptor::new("p1"), RefDescriptor::new("p2")],
        );
        NavigationIndex::new(refs)
    }

    #[test]
    fn valid_set_matches_references() {
        let nav = index();
        assert!(nav.has_tree("default"));
        assert!(nav.contains("default", "p1"));
        assert!(nav.contains("default", "p2"));
        assert!(!nav.contains("default", "p99"));
        assert!(!nav.contains("alt", "p1"));
    }

    #[test]
    fn tree_references_preserve_order() {
        let nav = index();
        let refs = nav.tree_references("default").unwrap();
        assert_eq!(refs[0].identifier, "p1");
        assert_eq!(refs[1].identifier, "p2");
        assert!(nav.tree_references("alt").is_none());
    }
}
