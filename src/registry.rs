//! Builds the search service from [`PricewiseConfig`].
//!
//! Providers are registered in a fixed order (Tavily, DuckDuckGo, local
//! index, static catalog), skipping disabled sections. Tavily is also
//! skipped when no API key is configured.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use pricewise_search::catalog::{self, CatalogEntry};
use pricewise_search::providers::{
    CatalogProvider, DuckDuckGoProvider, LocalIndexProvider, TavilyProvider,
};
use pricewise_search::{
    Aggregator, ComparisonService, DictionaryNormalizer, Provider, ProviderDescriptor,
    ResultCache, ServiceManager,
};

use crate::config::{PricewiseConfig, ProviderSection};
use crate::error::Result;

/// Build a ready-to-serve service from `config`.
///
/// # Errors
///
/// Returns an error if the config is invalid, the catalog file cannot be
/// loaded, an HTTP client cannot be built, or no provider is enabled.
pub fn build_service(config: &PricewiseConfig) -> Result<ComparisonService> {
    config.validate()?;
    let graceful = config.graceful_degradation;
    let providers = &config.providers;

    let reference = Arc::new(match &providers.local_index.settings.catalog {
        Some(path) => load_catalog(path)?,
        None => catalog::builtin(),
    });

    let mut descriptors = Vec::new();

    let tavily = &providers.tavily;
    if tavily.enabled {
        if tavily.settings.api_key.as_deref().is_some_and(|k| !k.is_empty()) {
            let provider =
                TavilyProvider::with_fallback_catalog(tavily.settings.clone(), reference.clone())?;
            descriptors.push(describe(Arc::new(provider), tavily, graceful));
        } else {
            tracing::warn!("tavily enabled but no API key configured, skipping");
        }
    }

    let duckduckgo = &providers.duckduckgo;
    if duckduckgo.enabled {
        let provider = DuckDuckGoProvider::with_fallback_catalog(
            duckduckgo.settings.clone(),
            reference.clone(),
        )?;
        descriptors.push(describe(Arc::new(provider), duckduckgo, graceful));
    }

    let local_index = &providers.local_index;
    if local_index.enabled {
        let provider =
            LocalIndexProvider::new(local_index.settings.index.clone(), reference.to_vec())?;
        descriptors.push(describe(Arc::new(provider), local_index, graceful));
    }

    let mock = &providers.mock;
    if mock.enabled {
        let provider = CatalogProvider::new(CatalogProvider::NAME, reference.clone())
            .with_max_results(mock.settings.max_results);
        descriptors.push(describe(Arc::new(provider), mock, graceful));
    }

    let manager = ServiceManager::new(descriptors, config.health.clone())?;
    let normalizer = DictionaryNormalizer::default().with_synonyms(config.query.synonyms.clone());

    Ok(ComparisonService::new(manager)
        .with_normalizer(normalizer)
        .with_aggregator(Aggregator::new(config.currency.clone()))
        .with_cache(ResultCache::new(Duration::from_secs(config.cache_ttl_secs))))
}

fn describe<C>(
    provider: Arc<dyn Provider>,
    section: &ProviderSection<C>,
    graceful: bool,
) -> ProviderDescriptor {
    ProviderDescriptor::new(provider)
        .with_timeout(section.timeout())
        .with_retry(section.retry.clone())
        .with_fallback(graceful)
}

fn load_catalog(path: &Path) -> Result<Vec<CatalogEntry>> {
    let json = std::fs::read_to_string(path)?;
    let entries = catalog::from_json(&json)?;
    tracing::info!(path = %path.display(), entries = entries.len(), "catalog loaded");
    Ok(entries)
}
