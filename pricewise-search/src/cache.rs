//! In-memory result cache.
//!
//! Caches finished [`ComparisonResult`]s keyed by the normalized query and
//! the selected provider set. Uses [`moka`] for async-friendly caching with
//! a TTL and automatic eviction. Each [`ResultCache`] is owned by one
//! service instance.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use moka::future::Cache;

use crate::types::{ComparisonResult, Query};

/// Maximum number of cached comparison results.
const MAX_CACHE_ENTRIES: u64 = 256;

/// Composite cache key: normalized query + provider set hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    query: Query,
    provider_hash: u64,
}

impl CacheKey {
    /// Build a deterministic key.
    ///
    /// The provider list is sorted and de-duplicated before hashing, so
    /// `["a", "b"]` and `["b", "a"]` share a key. An empty list means
    /// "all providers".
    pub fn new(query: &Query, providers: &[String]) -> Self {
        Self {
            query: query.clone(),
            provider_hash: hash_providers(providers),
        }
    }
}

/// TTL cache of non-degraded comparison results.
#[derive(Debug, Clone)]
pub struct ResultCache {
    inner: Option<Cache<CacheKey, ComparisonResult>>,
}

impl ResultCache {
    /// Create a cache holding entries for `ttl`. A zero TTL disables caching.
    pub fn new(ttl: Duration) -> Self {
        let inner = (!ttl.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(MAX_CACHE_ENTRIES)
                .time_to_live(ttl)
                .build()
        });
        Self { inner }
    }

    /// A cache that stores nothing.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Returns `true` if entries are stored.
    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Look up a cached result.
    pub async fn get(&self, key: &CacheKey) -> Option<ComparisonResult> {
        self.inner.as_ref()?.get(key).await
    }

    /// Store `result`. Degraded results are never stored.
    pub async fn insert(&self, key: CacheKey, result: &ComparisonResult) {
        if result.degraded {
            return;
        }
        if let Some(cache) = &self.inner {
            cache.insert(key, result.clone()).await;
        }
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        if let Some(cache) = &self.inner {
            cache.invalidate_all();
        }
    }
}

/// Order-independent hash of a provider name list.
fn hash_providers(providers: &[String]) -> u64 {
    let mut sorted: Vec<&str> = providers.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();
    let mut hasher = DefaultHasher::new();
    for name in sorted {
        name.hash(&mut hasher);
    }
    hasher.finish()
}
