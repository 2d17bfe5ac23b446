//! Tavily search API provider.
//!
//! Sends a JSON `POST /search` and reads `results[].{title, url, content}`.
//! Tavily returns web pages, not product rows, so prices and delivery
//! estimates are mined from the title and content text.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::catalog::{self, CatalogEntry};
use crate::error::{NormalizationLoss, ProviderError, SearchError};
use crate::http;
use crate::provider::Provider;
use crate::types::{Capability, ProductDraft, Query, RawRecord};

use super::{catalog_fallback, mine_delivery, mine_price};

/// Quick-commerce domains searched by default.
const DEFAULT_DOMAINS: &[&str] = &[
    "bigbasket.com",
    "blinkit.com",
    "zeptonow.com",
    "amazon.in",
    "jiomart.com",
];

/// Tavily provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TavilyConfig {
    /// API key. Without one every call fails and the fallback is served.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// API root, without trailing slash.
    pub base_url: String,
    /// `basic` or `advanced`.
    pub search_depth: String,
    /// Results requested per query.
    pub max_results: usize,
    /// Domains the search is restricted to. Empty searches the whole web.
    pub include_domains: Vec<String>,
    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for TavilyConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.tavily.com".into(),
            search_depth: "basic".into(),
            max_results: 5,
            include_domains: DEFAULT_DOMAINS.iter().map(|d| (*d).to_string()).collect(),
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize, Serialize)]
struct TavilyResult {
    title: String,
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: f64,
}

/// Product search through the Tavily API.
#[derive(Debug, Clone)]
pub struct TavilyProvider {
    config: TavilyConfig,
    client: reqwest::Client,
    fallback: Arc<Vec<CatalogEntry>>,
}

impl TavilyProvider {
    /// Provider name.
    pub const NAME: &'static str = "tavily";

    /// Create a provider falling back to the built-in catalog.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if the HTTP client cannot be built.
    pub fn new(config: TavilyConfig) -> Result<Self, SearchError> {
        Self::with_fallback_catalog(config, Arc::new(catalog::builtin()))
    }

    /// Create a provider with a custom fallback catalog.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if the HTTP client cannot be built.
    pub fn with_fallback_catalog(
        config: TavilyConfig,
        fallback: Arc<Vec<CatalogEntry>>,
    ) -> Result<Self, SearchError> {
        let client = http::build_client(Duration::from_secs(config.request_timeout_secs), None)?;
        Ok(Self {
            config,
            client,
            fallback,
        })
    }

    fn search_text(query: &Query) -> String {
        match query.quantity() {
            Some(quantity) => format!("{} {quantity} price", query.text()),
            None => format!("{} price", query.text()),
        }
    }
}

#[async_trait]
impl Provider for TavilyProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn capabilities(&self) -> &[Capability] {
        &[Capability::RemoteApi]
    }

    async fn search(&self, query: &Query) -> Result<Vec<RawRecord>, ProviderError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ProviderError::Unavailable("tavily api key not configured".into()))?;

        tracing::trace!(query = query.text(), "Tavily search");

        let max_results = query
            .max_results()
            .map_or(self.config.max_results, |m| m.min(self.config.max_results));
        let body = json!({
            "api_key": api_key,
            "query": Self::search_text(query),
            "search_depth": self.config.search_depth,
            "max_results": max_results,
            "include_domains": self.config.include_domains,
        });

        let timeout = Duration::from_secs(self.config.request_timeout_secs);
        let response = self
            .client
            .post(format!("{}/search", self.config.base_url.trim_end_matches('/')))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| http::request_error("tavily", timeout, &e))?
            .error_for_status()
            .map_err(|e| ProviderError::Http(format!("tavily HTTP error: {e}")))?;

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("tavily response: {e}")))?;

        let records: Vec<RawRecord> = parsed
            .results
            .into_iter()
            .map(|result| {
                let reference = result.url.clone();
                RawRecord::new(reference, serde_json::to_value(result).unwrap_or_default())
            })
            .collect();

        tracing::debug!(count = records.len(), "Tavily results parsed");
        Ok(records)
    }

    fn fallback(&self, query: &Query) -> Option<Vec<RawRecord>> {
        Some(catalog_fallback(&self.fallback, query, self.config.max_results))
    }

    fn extract(&self, record: &RawRecord) -> Result<ProductDraft, NormalizationLoss> {
        // Fallback records use the catalog layout.
        if record.text("platform").is_some() {
            return crate::provider::default_extract(record);
        }

        let title = record
            .text("title")
            .ok_or_else(|| NormalizationLoss::new(&record.reference, "missing title"))?;
        let content = record.text("content").unwrap_or_default();
        let price = mine_price(&title)
            .or_else(|| mine_price(&content))
            .ok_or_else(|| NormalizationLoss::new(&record.reference, "no price in result text"))?;
        let url = record.text("url");
        let platform = url
            .clone()
            .ok_or_else(|| NormalizationLoss::new(&record.reference, "missing platform"))?;

        Ok(ProductDraft {
            title,
            price,
            platform,
            quantity: None,
            delivery: mine_delivery(&content),
            url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> TavilyConfig {
        TavilyConfig {
            api_key: Some("tvly-test".into()),
            base_url: server.uri(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn parses_search_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("authorization", "Bearer tvly-test"))
            .and(body_partial_json(json!({ "query": "milk 500ml price" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    {
                        "title": "Amul Taaza Toned Milk 500 ml - ₹27",
                        "url": "https://www.bigbasket.com/pd/40090894/",
                        "content": "Delivery in 2 hours. Fresh toned milk.",
                        "score": 0.91
                    },
                    {
                        "title": "Milk delivery near you",
                        "url": "https://blinkit.com/cn/milk",
                        "content": "Order milk online",
                        "score": 0.4
                    }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = TavilyProvider::new(config(&server)).expect("provider");
        let records = provider
            .search(&Query::new("milk").with_quantity("500ml"))
            .await
            .expect("search");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].reference, "https://www.bigbasket.com/pd/40090894/");

        let draft = provider.extract(&records[0]).expect("draft");
        assert_eq!(draft.price, "₹27");
        assert_eq!(draft.delivery.as_deref(), Some("2 hours"));
        assert_eq!(draft.platform, "https://www.bigbasket.com/pd/40090894/");

        let loss = provider.extract(&records[1]).unwrap_err();
        assert!(loss.reason.contains("no price"));
    }

    #[tokio::test]
    async fn missing_key_is_unavailable() {
        let provider = TavilyProvider::new(TavilyConfig::default()).expect("provider");
        let err = provider.search(&Query::new("milk")).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
    }

    #[tokio::test]
    async fn server_error_maps_to_http() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let provider = TavilyProvider::new(config(&server)).expect("provider");
        let err = provider.search(&Query::new("milk")).await.unwrap_err();
        assert!(matches!(err, ProviderError::Http(_)));
    }

    #[tokio::test]
    async fn malformed_body_maps_to_parse() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
            .mount(&server)
            .await;
        let provider = TavilyProvider::new(config(&server)).expect("provider");
        let err = provider.search(&Query::new("milk")).await.unwrap_err();
        assert!(matches!(err, ProviderError::Parse(_)));
    }

    #[test]
    fn fallback_uses_reference_catalog() {
        let provider = TavilyProvider::new(TavilyConfig::default()).expect("provider");
        let records = provider.fallback(&Query::new("paneer")).expect("fallback");
        assert!(!records.is_empty());
        let draft = provider.extract(&records[0]).expect("draft");
        assert!(draft.title.contains("Paneer"));
    }
}
