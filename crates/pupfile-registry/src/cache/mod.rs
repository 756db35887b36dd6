//! Two-level metadata cache with fetch deduplication.
//!
//! Maps canonical module key → (version → release metadata). Entries are
//! populated lazily on first access and live until [`MetadataCache::clear`];
//! there is no TTL — correctness relies on explicit invalidation, not
//! staleness windows. Concurrent callers for the same uncached key share a
//! single in-flight fetch; a failed fetch is never cached, so a later call
//! retries.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use indexmap::IndexMap;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use pupfile_core::types::ReleaseMetadata;

use crate::forge::ReleaseSource;
use crate::RegistryResult;

/// Default upper bound on simultaneous in-flight fetches during batch warming
pub const DEFAULT_WARM_CONCURRENCY: usize = 5;

/// Pause between batch-warm windows, to stay within Forge rate limits
const WARM_WINDOW_PAUSE: Duration = Duration::from_millis(100);

/// In-memory release metadata cache over an injected release source
#[derive(Debug)]
pub struct MetadataCache<F> {
    /// Collaborator consulted on cache miss
    source: F,
    /// canonical module key → version → release metadata, in source order
    entries: DashMap<String, IndexMap<String, ReleaseMetadata>>,
    /// Per-key gates serializing duplicate fetches
    inflight: DashMap<String, Arc<Mutex<()>>>,
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cached modules
    pub modules: usize,
    /// Number of cached releases across all modules
    pub releases: usize,
}

impl<F: ReleaseSource> MetadataCache<F> {
    /// Create a cache over a release source
    pub fn new(source: F) -> Self {
        Self {
            source,
            entries: DashMap::new(),
            inflight: DashMap::new(),
        }
    }

    /// Get the ordered release list for a module, fetching on miss.
    ///
    /// Under concurrent callers, at most one fetch per key is in flight;
    /// the others await it and then read the populated entry.
    pub async fn release_list(&self, canonical_key: &str) -> RegistryResult<Vec<ReleaseMetadata>> {
        if let Some(entry) = self.entries.get(canonical_key) {
            tracing::trace!(module = canonical_key, "metadata cache hit");
            return Ok(entry.values().cloned().collect());
        }

        let gate = self
            .inflight
            .entry(canonical_key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = gate.lock().await;

        // Another caller may have populated the entry while we waited
        if let Some(entry) = self.entries.get(canonical_key) {
            return Ok(entry.values().cloned().collect());
        }

        tracing::debug!(module = canonical_key, "metadata cache miss, fetching");
        let releases = self.source.fetch_releases(canonical_key).await?;

        let mut versions = IndexMap::with_capacity(releases.len());
        for release in &releases {
            versions.insert(release.version.clone(), release.clone());
        }
        self.entries.insert(canonical_key.to_string(), versions);
        self.inflight.remove(canonical_key);

        Ok(releases)
    }

    /// Get the cached metadata for one (module, version) pair, fetching the
    /// module's release list on miss
    pub async fn release(
        &self,
        canonical_key: &str,
        version: &str,
    ) -> RegistryResult<Option<ReleaseMetadata>> {
        if !self.entries.contains_key(canonical_key) {
            self.release_list(canonical_key).await?;
        }
        Ok(self
            .entries
            .get(canonical_key)
            .and_then(|versions| versions.get(version).cloned()))
    }

    /// Warm the cache for a list of modules with bounded concurrency.
    ///
    /// Modules are processed in fixed-size windows; each window's fetches
    /// run concurrently and the whole window is awaited before the next
    /// starts, with a short pause between windows. A per-module failure is
    /// logged and skipped. Cancellation is checked at window boundaries.
    pub async fn warm(&self, keys: &[String], concurrency: usize, cancel: &CancellationToken) {
        let window_size = concurrency.max(1);
        let mut windows = keys.chunks(window_size).peekable();

        while let Some(window) = windows.next() {
            if cancel.is_cancelled() {
                tracing::debug!("batch warm cancelled");
                return;
            }

            let fetches = window.iter().map(|key| async move {
                if let Err(error) = self.release_list(key).await {
                    tracing::warn!(module = %key, %error, "skipping failed warm fetch");
                }
            });
            futures::future::join_all(fetches).await;

            if windows.peek().is_some() {
                tokio::time::sleep(WARM_WINDOW_PAUSE).await;
            }
        }
    }

    /// Empty both cache levels unconditionally
    pub fn clear(&self) {
        self.entries.clear();
        self.inflight.clear();
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let releases = self.entries.iter().map(|entry| entry.len()).sum();
        CacheStats {
            modules: self.entries.len(),
            releases,
        }
    }
}
