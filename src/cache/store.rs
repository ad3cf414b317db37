//! Disk artifact store
//!
//! Reads and writes prerendered artifacts at paths derived from cache
//! keys. All reads are fail-safe: a missing, unreadable, or malformed
//! artifact is a miss, never an error. All write failures are caught,
//! logged, and counted; a cache write never fails the operation that
//! produced the content.
//!
//! Writes go through a temp file in the target directory followed by a
//! rename, so a concurrent reader can never observe a partially-written
//! artifact. Concurrent writers to the same key are last-writer-wins.
//!
//! There is no eviction. The tree grows without bound until `clear`.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::key::{relative_path, CacheKey};

/// Cache store configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Root directory of the artifact tree
    pub root: PathBuf,
    /// When false, every lookup misses and every save is a no-op
    pub enabled: bool,
    /// Log individual cache events at info instead of debug
    pub verbose: bool,
    /// Number of hash-derived sharding directory levels
    pub levels: usize,
    /// Hex characters per sharding level
    pub chars_per_level: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/tmp/prerender"),
            enabled: true,
            verbose: false,
            levels: 3,
            chars_per_level: 2,
        }
    }
}

/// On-disk artifact body: a single-field JSON envelope
#[derive(Serialize, Deserialize)]
struct CacheEnvelope {
    content: String,
}

/// Snapshot of store counters.
///
/// Swallowed I/O errors surface here (and in warn logs) rather than
/// propagating to callers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub corrupt_reads: u64,
    pub write_failures: u64,
}

#[derive(Debug, Default)]
struct MetricsInternal {
    hits: AtomicU64,
    misses: AtomicU64,
    corrupt_reads: AtomicU64,
    write_failures: AtomicU64,
}

impl MetricsInternal {
    fn snapshot(&self) -> CacheMetrics {
        CacheMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            corrupt_reads: self.corrupt_reads.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}

/// Aggregate numbers for the on-disk tree (admin visibility)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheTreeStats {
    /// Artifact files present
    pub files: u64,
    /// Total artifact bytes
    pub bytes: u64,
}

/// Explicit gate for destructive cache administration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Yes,
    No,
}

/// Read/write access to the artifact namespace.
///
/// An explicitly constructed value; inject it wherever cache access is
/// needed rather than reaching for a process-wide instance.
#[derive(Clone)]
pub struct CacheStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    config: CacheConfig,
    metrics: MetricsInternal,
    temp_seq: AtomicU64,
}

impl CacheStore {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                config,
                metrics: MetricsInternal::default(),
                temp_seq: AtomicU64::new(0),
            }),
        }
    }

    /// Absolute path an artifact for `key` lives at
    pub fn artifact_path(&self, key: &CacheKey<'_>) -> PathBuf {
        let config = &self.inner.config;
        config
            .root
            .join(relative_path(key, config.levels, config.chars_per_level))
    }

    /// Retrieve cached content, or miss.
    ///
    /// Absent, unreadable, and corrupt artifacts are all misses; the
    /// distinction only shows up in metrics and logs.
    pub async fn get(&self, key: &CacheKey<'_>) -> Option<String> {
        if !self.inner.config.enabled {
            return None;
        }

        let path = self.artifact_path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.inner.metrics.misses.fetch_add(1, Ordering::Relaxed);
                self.log_event(format_args!(
                    "cache miss: {}?ref={} ({})",
                    key.document, key.reference, key.media
                ));
                return None;
            }
            Err(e) => {
                self.inner.metrics.misses.fetch_add(1, Ordering::Relaxed);
                self.inner
                    .metrics
                    .corrupt_reads
                    .fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    document = key.document,
                    reference = key.reference,
                    media = key.media,
                    error = %e,
                    "cache artifact unreadable, treating as miss"
                );
                return None;
            }
        };

        match serde_json::from_slice::<CacheEnvelope>(&bytes) {
            Ok(envelope) => {
                self.inner.metrics.hits.fetch_add(1, Ordering::Relaxed);
                self.log_event(format_args!(
                    "cache hit: {}?ref={} ({}) - {} chars",
                    key.document,
                    key.reference,
                    key.media,
                    envelope.content.len()
                ));
                Some(envelope.content)
            }
            Err(e) => {
                self.inner.metrics.misses.fetch_add(1, Ordering::Relaxed);
                self.inner
                    .metrics
                    .corrupt_reads
                    .fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    document = key.document,
                    reference = key.reference,
                    media = key.media,
                    error = %e,
                    "cache artifact corrupted, treating as miss"
                );
                None
            }
        }
    }

    /// Store content for `key`.
    ///
    /// Never fails the caller: I/O errors are logged, counted, and
    /// swallowed. The return value reports whether the write landed and
    /// exists for metrics and tests only.
    pub async fn save(&self, key: &CacheKey<'_>, content: &str) -> bool {
        if !self.inner.config.enabled {
            return false;
        }

        let path = self.artifact_path(key);
        match self.write_envelope(&path, content).await {
            Ok(()) => {
                self.log_event(format_args!(
                    "cache save: {}?ref={} ({}) - {} chars",
                    key.document,
                    key.reference,
                    key.media,
                    content.len()
                ));
                true
            }
            Err(e) => {
                self.inner
                    .metrics
                    .write_failures
                    .fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    document = key.document,
                    reference = key.reference,
                    media = key.media,
                    error = %e,
                    "cache save failed, continuing without caching"
                );
                false
            }
        }
    }

    /// Write-to-temp then rename, so readers never see a partial artifact
    async fn write_envelope(&self, path: &Path, content: &str) -> io::Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "artifact path has no parent"))?;
        tokio::fs::create_dir_all(parent).await?;

        let body = serde_json::to_vec(&CacheEnvelope {
            content: content.to_string(),
        })
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let file_name = path
            .file_name()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "artifact path has no file name"))?
            .to_string_lossy()
            .to_string();
        let seq = self.inner.temp_seq.fetch_add(1, Ordering::Relaxed);
        let temp = parent.join(format!(".{}.tmp.{}.{}", file_name, std::process::id(), seq));

        tokio::fs::write(&temp, &body).await?;
        if let Err(e) = tokio::fs::rename(&temp, path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e);
        }
        Ok(())
    }

    /// Counter snapshot
    pub fn metrics(&self) -> CacheMetrics {
        self.inner.metrics.snapshot()
    }

    /// Walk the artifact tree and count files and bytes
    pub async fn stats(&self) -> io::Result<CacheTreeStats> {
        let root = self.inner.config.root.clone();
        tokio::task::spawn_blocking(move || {
            if !root.exists() {
                return Ok(CacheTreeStats::default());
            }
            let mut stats = CacheTreeStats::default();
            walk_tree(&root, &mut stats)?;
            Ok(stats)
        })
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
    }

    /// Delete the whole artifact tree.
    ///
    /// Requires [`Confirmation::Yes`]; anything else leaves the tree
    /// untouched. Returns whether a tree was deleted.
    pub async fn clear(&self, confirmation: Confirmation) -> io::Result<bool> {
        if confirmation != Confirmation::Yes {
            tracing::warn!(
                root = %self.inner.config.root.display(),
                "cache clear requested without confirmation, refusing"
            );
            return Ok(false);
        }

        let root = &self.inner.config.root;
        if !root.exists() {
            return Ok(false);
        }
        tokio::fs::remove_dir_all(root).await?;
        tracing::info!(root = %root.display(), "cache tree cleared");
        Ok(true)
    }

    fn log_event(&self, message: std::fmt::Arguments<'_>) {
        if self.inner.config.verbose {
            tracing::info!("{}", message);
        } else {
            tracing::debug!("{}", message);
        }
    }
}

fn walk_tree(dir: &Path, stats: &mut CacheTreeStats) -> io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            walk_tree(&entry.path(), stats)?;
        } else if file_type.is_file() {
            stats.files += 1;
            stats.bytes += entry.metadata()?.len();
        }
    }
    Ok(())
}
