//! Trait definition for pluggable search providers, and the registry that
//! pairs each provider with its call policy.
//!
//! Each provider (Tavily, DuckDuckGo, the local index, the static catalog)
//! implements [`Provider`]. The safe-call wrapper never talks to a provider
//! directly; it goes through a [`ProviderDescriptor`], which carries the
//! timeout and retry budget for that provider.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::RetryPolicy;
use crate::error::{NormalizationLoss, ProviderError, SearchError};
use crate::types::{Capability, ProductDraft, Query, RawRecord};

/// A pluggable source of product search results.
///
/// All implementations must be `Send + Sync` for concurrent fan-out.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Unique provider name used in logs, health reports and provenance.
    fn name(&self) -> &str;

    /// Capability tags for this provider.
    fn capabilities(&self) -> &[Capability];

    /// Search for products matching `query`.
    ///
    /// May perform network I/O and may fail. Timeouts and retries are
    /// applied by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the provider cannot answer.
    async fn search(&self, query: &Query) -> Result<Vec<RawRecord>, ProviderError>;

    /// Degraded response used when the provider is circuit-broken or
    /// exhausted its retries.
    ///
    /// Must not fail and must not block; local data only. `None` means the
    /// provider has no fallback.
    fn fallback(&self, _query: &Query) -> Option<Vec<RawRecord>> {
        None
    }

    /// Map one of this provider's raw records to a product draft.
    ///
    /// The default reads the common field names used by the built-in
    /// providers (`title`/`name`, `price`, `platform`/`store`/`source`, ...).
    ///
    /// # Errors
    ///
    /// Returns [`NormalizationLoss`] if the record lacks required fields.
    fn extract(&self, record: &RawRecord) -> Result<ProductDraft, NormalizationLoss> {
        default_extract(record)
    }
}

/// Read the common field layout shared by the built-in providers.
///
/// # Errors
///
/// Returns [`NormalizationLoss`] when title, price or platform is missing.
pub fn default_extract(record: &RawRecord) -> Result<ProductDraft, NormalizationLoss> {
    let title = record
        .first_text(&["title", "name"])
        .ok_or_else(|| NormalizationLoss::new(&record.reference, "missing title"))?;
    let price = record
        .first_text(&["price"])
        .ok_or_else(|| NormalizationLoss::new(&record.reference, "missing price"))?;
    let url = record.first_text(&["url", "link"]);
    let platform = record
        .first_text(&["platform", "store", "source"])
        .or_else(|| url.clone())
        .ok_or_else(|| NormalizationLoss::new(&record.reference, "missing platform"))?;

    Ok(ProductDraft {
        title,
        price,
        platform,
        quantity: record.first_text(&["quantity", "unit", "size"]),
        delivery: record.first_text(&["delivery", "delivery_time", "eta"]),
        url,
    })
}

/// Turns raw records into product drafts on behalf of the aggregator.
pub trait RecordExtractor {
    /// Extract a draft from a record produced by `provider`.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizationLoss`] if the record cannot be mapped.
    fn extract(&self, provider: &str, record: &RawRecord)
        -> Result<ProductDraft, NormalizationLoss>;
}

/// Extractor that applies [`default_extract`] to every provider's records.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultExtractor;

impl RecordExtractor for DefaultExtractor {
    fn extract(
        &self,
        _provider: &str,
        record: &RawRecord,
    ) -> Result<ProductDraft, NormalizationLoss> {
        default_extract(record)
    }
}

/// A provider plus the policy the safe-call wrapper applies to it.
#[derive(Clone)]
pub struct ProviderDescriptor {
    provider: Arc<dyn Provider>,
    timeout: Duration,
    retry: RetryPolicy,
    fallback_enabled: bool,
}

impl ProviderDescriptor {
    /// Default per-attempt timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

    /// Wrap `provider` with the default timeout and retry policy.
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            timeout: Self::DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            fallback_enabled: true,
        }
    }

    /// Set the per-attempt timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Enable or disable the fallback path. Disabled means exhausted calls
    /// resolve to a `Failure` outcome.
    #[must_use]
    pub fn with_fallback(mut self, enabled: bool) -> Self {
        self.fallback_enabled = enabled;
        self
    }

    /// Provider name.
    pub fn name(&self) -> &str {
        self.provider.name()
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// Per-attempt timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Retry policy.
    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Run the fallback generator, if enabled and provided.
    pub fn fallback(&self, query: &Query) -> Option<Vec<RawRecord>> {
        if self.fallback_enabled {
            self.provider.fallback(query)
        } else {
            None
        }
    }

    /// Validates timeout and retry settings.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.timeout.is_zero() {
            return Err(SearchError::Config(format!(
                "provider {}: timeout must be greater than 0",
                self.name()
            )));
        }
        self.retry
            .validate()
            .map_err(|e| SearchError::Config(format!("provider {}: {e}", self.name())))
    }
}

impl fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("name", &self.name())
            .field("capabilities", &self.provider.capabilities())
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("fallback_enabled", &self.fallback_enabled)
            .finish()
    }
}

/// Registered providers in registration order.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    descriptors: Vec<ProviderDescriptor>,
}

impl ProviderRegistry {
    /// Build a registry, rejecting empty sets, duplicate names and invalid
    /// descriptor settings.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] on any setup fault.
    pub fn new(descriptors: Vec<ProviderDescriptor>) -> Result<Self, SearchError> {
        if descriptors.is_empty() {
            return Err(SearchError::Config(
                "at least one provider must be registered".into(),
            ));
        }
        let mut seen = HashSet::new();
        for descriptor in &descriptors {
            if !seen.insert(descriptor.name().to_string()) {
                return Err(SearchError::Config(format!(
                    "duplicate provider name: {}",
                    descriptor.name()
                )));
            }
            descriptor.validate()?;
        }
        Ok(Self { descriptors })
    }

    /// Descriptors in registration order.
    pub fn descriptors(&self) -> &[ProviderDescriptor] {
        &self.descriptors
    }

    /// Look up a descriptor by provider name.
    pub fn get(&self, name: &str) -> Option<&ProviderDescriptor> {
        self.descriptors.iter().find(|d| d.name() == name)
    }

    /// Registration index of `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.descriptors.iter().position(|d| d.name() == name)
    }

    /// Provider names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.descriptors.iter().map(|d| d.name().to_string()).collect()
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Always `false`: construction rejects empty registries.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl RecordExtractor for ProviderRegistry {
    fn extract(
        &self,
        provider: &str,
        record: &RawRecord,
    ) -> Result<ProductDraft, NormalizationLoss> {
        match self.get(provider) {
            Some(descriptor) => descriptor.provider().extract(record),
            None => default_extract(record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// A mock provider for testing trait bounds and async execution.
    struct MockProvider {
        name: &'static str,
        records: Vec<RawRecord>,
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn capabilities(&self) -> &[Capability] {
            &[Capability::StaticCatalog]
        }

        async fn search(&self, _query: &Query) -> Result<Vec<RawRecord>, ProviderError> {
            if self.records.is_empty() {
                return Err(ProviderError::Unavailable("mock provider failure".into()));
            }
            Ok(self.records.clone())
        }
    }

    fn mock(name: &'static str) -> Arc<dyn Provider> {
        Arc::new(MockProvider {
            name,
            records: vec![RawRecord::new(
                "r1",
                json!({ "name": "Milk", "price": "₹30", "platform": "Blinkit" }),
            )],
        })
    }

    #[test]
    fn mock_provider_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MockProvider>();
        assert_send_sync::<ProviderDescriptor>();
    }

    #[tokio::test]
    async fn mock_provider_returns_records() {
        let provider = mock("mock");
        let records = provider.search(&Query::new("milk")).await.expect("records");
        assert_eq!(records.len(), 1);
        assert!(provider.fallback(&Query::new("milk")).is_none());
    }

    #[tokio::test]
    async fn mock_provider_propagates_errors() {
        let provider = MockProvider {
            name: "broken",
            records: vec![],
        };
        let err = provider.search(&Query::new("milk")).await.unwrap_err();
        assert!(err.to_string().contains("mock provider failure"));
    }

    #[test]
    fn default_extract_reads_common_fields() {
        let record = RawRecord::new(
            "r1",
            json!({
                "name": "Amul Taaza Milk",
                "price": 29,
                "store": "BigBasket",
                "unit": "500 ml",
                "delivery_time": "30 mins",
                "link": "https://www.bigbasket.com/pd/1"
            }),
        );
        let draft = default_extract(&record).expect("draft");
        assert_eq!(draft.title, "Amul Taaza Milk");
        assert_eq!(draft.price, "29");
        assert_eq!(draft.platform, "BigBasket");
        assert_eq!(draft.quantity.as_deref(), Some("500 ml"));
        assert_eq!(draft.delivery.as_deref(), Some("30 mins"));
        assert_eq!(draft.url.as_deref(), Some("https://www.bigbasket.com/pd/1"));
    }

    #[test]
    fn default_extract_uses_url_as_platform() {
        let record = RawRecord::new(
            "r2",
            json!({ "title": "Rice", "price": "99", "url": "https://www.jiomart.com/p/2" }),
        );
        let draft = default_extract(&record).expect("draft");
        assert_eq!(draft.platform, "https://www.jiomart.com/p/2");
    }

    #[test]
    fn default_extract_reports_missing_price() {
        let record = RawRecord::new("r3", json!({ "title": "Rice", "platform": "Zepto" }));
        let loss = default_extract(&record).unwrap_err();
        assert_eq!(loss.reference, "r3");
        assert_eq!(loss.reason, "missing price");
    }

    #[test]
    fn registry_rejects_empty() {
        let err = ProviderRegistry::new(vec![]).unwrap_err();
        assert!(err.to_string().contains("at least one provider"));
    }

    #[test]
    fn registry_rejects_duplicates() {
        let err = ProviderRegistry::new(vec![
            ProviderDescriptor::new(mock("same")),
            ProviderDescriptor::new(mock("same")),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("duplicate provider name: same"));
    }

    #[test]
    fn registry_rejects_zero_timeout() {
        let err = ProviderRegistry::new(vec![
            ProviderDescriptor::new(mock("a")).with_timeout(Duration::ZERO)
        ])
        .unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn registry_preserves_registration_order() {
        let registry = ProviderRegistry::new(vec![
            ProviderDescriptor::new(mock("b")),
            ProviderDescriptor::new(mock("a")),
        ])
        .expect("registry");
        assert_eq!(registry.names(), vec!["b".to_string(), "a".to_string()]);
        assert_eq!(registry.position("a"), Some(1));
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn disabled_fallback_returns_none() {
        struct WithFallback;

        #[async_trait]
        impl Provider for WithFallback {
            fn name(&self) -> &str {
                "with-fallback"
            }
            fn capabilities(&self) -> &[Capability] {
                &[]
            }
            async fn search(&self, _query: &Query) -> Result<Vec<RawRecord>, ProviderError> {
                Ok(vec![])
            }
            fn fallback(&self, _query: &Query) -> Option<Vec<RawRecord>> {
                Some(vec![])
            }
        }

        let descriptor = ProviderDescriptor::new(Arc::new(WithFallback));
        assert!(descriptor.fallback(&Query::new("x")).is_some());
        let strict = descriptor.with_fallback(false);
        assert!(strict.fallback(&Query::new("x")).is_none());
    }
}
