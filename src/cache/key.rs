//! Cache key derivation
//!
//! Maps an artifact identity to a deterministic relative path. The full
//! SHA-256 digest of the document identifier is split into fixed-width
//! sharding directories to bound fan-out on large corpora, followed by a
//! directory named with the full digest. Filenames concatenate truncated
//! digests of the remaining key fields.
//!
//! Truncating to 8 hex characters (32 bits) admits a nonzero collision
//! probability across a large corpus; two colliding artifacts would share
//! a path and cross-contaminate. Accepted and documented, not eliminated.
//!
//! No normalization is applied to any field: differing whitespace or case
//! in a reference is a different key.

use std::path::PathBuf;

use sha2::{Digest, Sha256};

/// Hex characters kept for per-field filename digests
const SHORT_HASH_LEN: usize = 8;

/// Separator between filename digest segments
const SEGMENT_SEPARATOR: &str = "__";

/// Extension of every cache artifact
const ARTIFACT_EXTENSION: &str = "prerender";

/// Identity of one cached artifact.
///
/// Equal keys derive equal paths; keys differing in any field derive
/// different paths (barring the documented truncation collision risk).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheKey<'a> {
    /// Document identifier
    pub document: &'a str,
    /// Reference (or range start) within the tree
    pub reference: &'a str,
    /// Optional range end
    pub range_end: Option<&'a str>,
    /// Media type of the artifact
    pub media: &'a str,
    /// Navigation tree the reference belongs to
    pub tree: &'a str,
}

/// Full SHA-256 digest of a string, hex-encoded
fn sha_hex(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    hex::encode(hasher.finalize())
}

/// Truncated digest used for filename segments
fn short_sha(s: &str) -> String {
    let mut digest = sha_hex(s);
    digest.truncate(SHORT_HASH_LEN);
    digest
}

/// Derive the relative path for a key.
///
/// Pure: identical inputs always yield the identical path.
pub fn relative_path(key: &CacheKey<'_>, levels: usize, chars_per_level: usize) -> PathBuf {
    let digest = sha_hex(key.document);

    let mut path = PathBuf::new();
    for level in 0..levels {
        let start = level * chars_per_level;
        // Sharding deeper than the digest is long stops contributing levels.
        if start + chars_per_level > digest.len() {
            break;
        }
        path.push(&digest[start..start + chars_per_level]);
    }
    path.push(&digest);

    let mut segments = vec![short_sha(key.tree), short_sha(key.reference)];
    if let Some(end) = key.range_end {
        segments.push(short_sha(end));
    }
    segments.push(short_sha(key.media));

    path.push(format!(
        "{}.{}",
        segments.join(SEGMENT_SEPARATOR),
        ARTIFACT_EXTENSION
    ));
    path
}
