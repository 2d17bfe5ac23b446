//! # pricewise-search
//!
//! Multi-provider product search and price comparison core for Pricewise.
//!
//! A query is normalized, fanned out to every registered provider
//! concurrently, and the returned listings are normalized into canonical
//! products, deduplicated across providers and ranked by price and
//! delivery time.
//!
//! ## Design
//!
//! - Providers implement one [`Provider`] trait: a search operation, a
//!   local non-failing fallback and a record extractor
//! - Every call goes through a safe-call wrapper with timeout, retry with
//!   backoff and a per-provider circuit breaker
//! - Provider failures become data: fallback outcomes and result warnings
//! - Aggregation is deterministic for a given set of provider outcomes
//! - Optional in-memory result cache with configurable TTL
//!
//! ## Security
//!
//! - No network listeners; this is a library, not a server
//! - Search queries are logged only at trace level
//! - API keys are never logged

pub mod aggregate;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod manager;
pub mod provider;
pub mod providers;
pub mod query;
pub mod safe_call;
pub mod types;

pub use aggregate::Aggregator;
pub use cache::{CacheKey, ResultCache};
pub use config::{CurrencyTable, HealthPolicy, RetryPolicy};
pub use error::{NormalizationLoss, ProviderError, Result, SearchError};
pub use health::{
    Admission, HealthSnapshot, HealthStatus, HealthTracker, ProviderHealth, StatusView,
};
pub use manager::{DiagnosticReport, DiagnosticStatus, FanOut, ServiceManager, DIAGNOSTIC_QUERY};
pub use provider::{
    DefaultExtractor, Provider, ProviderDescriptor, ProviderRegistry, RecordExtractor,
};
pub use query::{DictionaryNormalizer, QueryHints, QueryNormalizer};
pub use types::{
    CallOutcome, CanonicalProduct, Capability, ComparisonResult, FallbackReason, OutcomeKind,
    PriceRange, ProductDraft, ProviderOutcome, Query, RawRecord,
};

use tokio_util::sync::CancellationToken;

/// Per-request options for [`ComparisonService::search`].
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Restrict the search to these providers. Empty means all.
    pub providers: Vec<String>,
    /// Category hint.
    pub category: Option<String>,
    /// Quantity hint; overrides a quantity found in the query text.
    pub quantity: Option<String>,
    /// Cap on ranked results.
    pub max_results: Option<usize>,
    /// Abandon outstanding provider calls when cancelled.
    pub cancel: Option<CancellationToken>,
}

impl SearchOptions {
    fn hints(&self) -> QueryHints {
        QueryHints {
            category: self.category.clone(),
            quantity: self.quantity.clone(),
            max_results: self.max_results,
        }
    }
}

/// The product search service: normalizer, service manager, aggregator and cache.
///
/// Build one per process and share it by reference; all methods take `&self`.
pub struct ComparisonService {
    normalizer: Box<dyn QueryNormalizer>,
    manager: ServiceManager,
    aggregator: Aggregator,
    cache: ResultCache,
}

impl std::fmt::Debug for ComparisonService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComparisonService")
            .field("manager", &self.manager)
            .field("aggregator", &self.aggregator)
            .field("cache_enabled", &self.cache.is_enabled())
            .finish_non_exhaustive()
    }
}

impl ComparisonService {
    /// Service over `manager` with the default normalizer, currency table
    /// and no cache.
    pub fn new(manager: ServiceManager) -> Self {
        Self {
            normalizer: Box::new(DictionaryNormalizer::default()),
            manager,
            aggregator: Aggregator::default(),
            cache: ResultCache::disabled(),
        }
    }

    /// Replace the query normalizer.
    #[must_use]
    pub fn with_normalizer(mut self, normalizer: impl QueryNormalizer + 'static) -> Self {
        self.normalizer = Box::new(normalizer);
        self
    }

    /// Replace the aggregator.
    #[must_use]
    pub fn with_aggregator(mut self, aggregator: Aggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    /// Replace the result cache.
    #[must_use]
    pub fn with_cache(mut self, cache: ResultCache) -> Self {
        self.cache = cache;
        self
    }

    /// The underlying service manager.
    pub fn manager(&self) -> &ServiceManager {
        &self.manager
    }

    /// Search every selected provider and compare the results.
    ///
    /// Always returns a result; provider failures, unknown provider names
    /// and dropped records show up in [`ComparisonResult::warnings`].
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn example() -> pricewise_search::Result<()> {
    /// use pricewise_search::providers::CatalogProvider;
    /// use pricewise_search::{
    ///     ComparisonService, HealthPolicy, ProviderDescriptor, SearchOptions, ServiceManager,
    /// };
    /// use std::sync::Arc;
    ///
    /// let manager = ServiceManager::new(
    ///     vec![ProviderDescriptor::new(Arc::new(CatalogProvider::builtin()))],
    ///     HealthPolicy::default(),
    /// )?;
    /// let service = ComparisonService::new(manager);
    /// let result = service.search("2 kg atta", &SearchOptions::default()).await;
    /// if let Some(best) = result.best_pick {
    ///     println!("{} on {} for {}", best.title, best.platform, best.price);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn search(&self, raw: &str, options: &SearchOptions) -> ComparisonResult {
        let query = self.normalizer.normalize(raw, &options.hints());
        if query.text().is_empty() {
            let mut result = ComparisonResult::empty("");
            result.degraded_providers = self.manager.registry().names();
            result
                .warnings
                .push(SearchError::Config("query is empty after normalization".into()));
            return result;
        }

        let key = CacheKey::new(&query, &options.providers);
        if let Some(hit) = self.cache.get(&key).await {
            tracing::debug!("serving comparison from cache");
            return hit;
        }

        let cancel = options.cancel.clone().unwrap_or_default();
        let subset = (!options.providers.is_empty()).then_some(options.providers.as_slice());
        let fan_out = self.manager.search(&query, subset, &cancel).await;

        let mut result = self
            .aggregator
            .aggregate(&query, &fan_out.outcomes, self.manager.registry());
        if fan_out.outcomes.is_empty() {
            // No provider was selected, so none contributed.
            result.degraded_providers = self.manager.registry().names();
        }
        if !fan_out.warnings.is_empty() {
            let mut warnings = fan_out.warnings;
            warnings.append(&mut result.warnings);
            result.warnings = warnings;
        }

        if !cancel.is_cancelled() {
            self.cache.insert(key, &result).await;
        }
        result
    }

    /// Current health of every provider. Never calls a provider.
    pub fn status(&self) -> HealthSnapshot {
        self.manager.status()
    }

    /// Run the diagnostic query through every provider.
    pub async fn test_all(&self) -> Vec<DiagnosticReport> {
        self.manager.test_all().await
    }
}
