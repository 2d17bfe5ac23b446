//! Static catalog provider.
//!
//! Serves keyword matches from an in-memory catalog. Used as the offline
//! mock store and in tests; it never fails.

use std::sync::Arc;

use async_trait::async_trait;

use crate::catalog::{self, CatalogEntry};
use crate::error::ProviderError;
use crate::provider::Provider;
use crate::types::{Capability, Query, RawRecord};

/// Keyword search over a fixed catalog.
#[derive(Debug, Clone)]
pub struct CatalogProvider {
    name: String,
    entries: Arc<Vec<CatalogEntry>>,
    max_results: usize,
}

impl CatalogProvider {
    /// Default provider name.
    pub const NAME: &'static str = "mock";

    /// Provider over the built-in catalog.
    pub fn builtin() -> Self {
        Self::new(Self::NAME, Arc::new(catalog::builtin()))
    }

    /// Provider named `name` over `entries`.
    pub fn new(name: impl Into<String>, entries: Arc<Vec<CatalogEntry>>) -> Self {
        Self {
            name: name.into(),
            entries,
            max_results: 20,
        }
    }

    /// Cap the records returned per query.
    #[must_use]
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    fn lookup(&self, query: &Query) -> Vec<RawRecord> {
        let limit = query
            .max_results()
            .map_or(self.max_results, |m| m.min(self.max_results));
        catalog::find(&self.entries, query)
            .into_iter()
            .take(limit)
            .map(CatalogEntry::to_record)
            .collect()
    }
}

#[async_trait]
impl Provider for CatalogProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &[Capability] {
        &[Capability::StaticCatalog]
    }

    async fn search(&self, query: &Query) -> Result<Vec<RawRecord>, ProviderError> {
        let records = self.lookup(query);
        tracing::debug!(provider = %self.name, count = records.len(), "catalog lookup");
        Ok(records)
    }

    fn fallback(&self, query: &Query) -> Option<Vec<RawRecord>> {
        Some(self.lookup(query))
    }
}
