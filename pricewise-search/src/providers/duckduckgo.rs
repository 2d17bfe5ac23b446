//! DuckDuckGo HTML provider.
//!
//! Uses the HTML-only endpoint at `https://html.duckduckgo.com/html/`,
//! which needs no JavaScript and tolerates automated requests. Listings
//! are search hits, so prices are mined from titles and snippets.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use crate::catalog::{self, CatalogEntry};
use crate::error::{NormalizationLoss, ProviderError, SearchError};
use crate::http;
use crate::provider::Provider;
use crate::types::{Capability, ProductDraft, Query, RawRecord};

use super::{catalog_fallback, mine_delivery, mine_price};

/// DuckDuckGo provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuckDuckGoConfig {
    /// HTML endpoint.
    pub endpoint: String,
    /// Region code sent as `kl`.
    pub region: String,
    /// Results kept per query.
    pub max_results: usize,
    /// Enable strict safe search (`kp=1`).
    pub safe_search: bool,
    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,
    /// Fixed User-Agent; random browser UA when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for DuckDuckGoConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://html.duckduckgo.com/html/".into(),
            region: "in-en".into(),
            max_results: 10,
            safe_search: false,
            request_timeout_secs: 10,
            user_agent: None,
        }
    }
}

/// Product search by scraping DuckDuckGo results.
#[derive(Debug, Clone)]
pub struct DuckDuckGoProvider {
    config: DuckDuckGoConfig,
    client: reqwest::Client,
    fallback: Arc<Vec<CatalogEntry>>,
}

impl DuckDuckGoProvider {
    /// Provider name.
    pub const NAME: &'static str = "duckduckgo";

    /// Create a provider falling back to the built-in catalog.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if the HTTP client cannot be built.
    pub fn new(config: DuckDuckGoConfig) -> Result<Self, SearchError> {
        Self::with_fallback_catalog(config, Arc::new(catalog::builtin()))
    }

    /// Create a provider with a custom fallback catalog.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if the HTTP client cannot be built.
    pub fn with_fallback_catalog(
        config: DuckDuckGoConfig,
        fallback: Arc<Vec<CatalogEntry>>,
    ) -> Result<Self, SearchError> {
        let client = http::build_client(
            Duration::from_secs(config.request_timeout_secs),
            config.user_agent.as_deref(),
        )?;
        Ok(Self {
            config,
            client,
            fallback,
        })
    }

    /// Extract the target URL from DuckDuckGo's redirect wrapper.
    ///
    /// DDG wraps URLs like `//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com&rut=...`.
    fn extract_url(href: &str) -> Option<String> {
        let full_href = if href.starts_with("//") {
            format!("https:{href}")
        } else {
            href.to_string()
        };

        let parsed = Url::parse(&full_href).ok()?;
        if parsed.host_str() == Some("duckduckgo.com") && parsed.path().starts_with("/l/") {
            parsed
                .query_pairs()
                .find(|(key, _)| key == "uddg")
                .map(|(_, value)| value.into_owned())
        } else {
            Some(full_href)
        }
    }
}

#[async_trait]
impl Provider for DuckDuckGoProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn capabilities(&self) -> &[Capability] {
        &[Capability::WebScrape]
    }

    async fn search(&self, query: &Query) -> Result<Vec<RawRecord>, ProviderError> {
        tracing::trace!(query = query.text(), "DuckDuckGo search");

        let text = format!("{} price online", query.text());
        let mut params = vec![("q", text.as_str()), ("kl", self.config.region.as_str())];
        if self.config.safe_search {
            params.push(("kp", "1"));
        }

        let timeout = Duration::from_secs(self.config.request_timeout_secs);
        let response = self
            .client
            .post(&self.config.endpoint)
            .form(&params)
            .header("Accept-Language", "en-IN,en;q=0.9")
            .send()
            .await
            .map_err(|e| http::request_error("duckduckgo", timeout, &e))?
            .error_for_status()
            .map_err(|e| ProviderError::Http(format!("duckduckgo HTTP error: {e}")))?;

        let html = response
            .text()
            .await
            .map_err(|e| ProviderError::Http(format!("duckduckgo response read failed: {e}")))?;

        tracing::trace!(bytes = html.len(), "DuckDuckGo response received");

        let limit = query
            .max_results()
            .map_or(self.config.max_results, |m| m.min(self.config.max_results));
        parse_results_html(&html, limit)
    }

    fn fallback(&self, query: &Query) -> Option<Vec<RawRecord>> {
        Some(catalog_fallback(&self.fallback, query, self.config.max_results))
    }

    fn extract(&self, record: &RawRecord) -> Result<ProductDraft, NormalizationLoss> {
        if record.text("platform").is_some() {
            return crate::provider::default_extract(record);
        }

        let title = record
            .text("title")
            .ok_or_else(|| NormalizationLoss::new(&record.reference, "missing title"))?;
        let snippet = record.text("snippet").unwrap_or_default();
        let price = mine_price(&title)
            .or_else(|| mine_price(&snippet))
            .ok_or_else(|| NormalizationLoss::new(&record.reference, "no price in result text"))?;

        Ok(ProductDraft {
            title,
            price,
            platform: record.reference.clone(),
            quantity: None,
            delivery: mine_delivery(&snippet),
            url: Some(record.reference.clone()),
        })
    }
}

/// Parse a DuckDuckGo HTML page into raw records.
///
/// Ads (`.result--ad`) are skipped. Each record's reference is the
/// unwrapped target URL and its body holds `title` and `snippet`.
pub(crate) fn parse_results_html(
    html: &str,
    max_results: usize,
) -> Result<Vec<RawRecord>, ProviderError> {
    let document = Html::parse_document(html);

    let result_sel = Selector::parse(
        ".result.results_links.results_links_deep:not(.result--ad), .web-result:not(.result--ad)",
    )
    .map_err(|e| ProviderError::Parse(format!("invalid result selector: {e:?}")))?;
    let title_sel = Selector::parse(".result__a")
        .map_err(|e| ProviderError::Parse(format!("invalid title selector: {e:?}")))?;
    let snippet_sel = Selector::parse(".result__snippet")
        .map_err(|e| ProviderError::Parse(format!("invalid snippet selector: {e:?}")))?;

    let mut records = Vec::new();

    for element in document.select(&result_sel) {
        let Some(title_el) = element.select(&title_sel).next() else {
            continue;
        };

        let title = title_el.text().collect::<String>().trim().to_string();
        if title.is_empty() {
            continue;
        }

        let Some(url) = title_el
            .value()
            .attr("href")
            .and_then(DuckDuckGoProvider::extract_url)
        else {
            continue;
        };

        let snippet = element
            .select(&snippet_sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        records.push(RawRecord::new(
            url,
            json!({ "title": title, "snippet": snippet }),
        ));

        if records.len() >= max_results {
            break;
        }
    }

    tracing::debug!(count = records.len(), "DuckDuckGo results parsed");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MOCK_DDG_HTML: &str = r#"<!DOCTYPE html>
<html>
<body>
<div class="result results_links results_links_deep web-result">
    <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fblinkit.com%2Fprn%2Famul-taaza%2F123&amp;rut=abc123">
        Amul Taaza Toned Milk 500 ml | Blinkit
    </a>
    <div class="result__snippet">
        Buy Amul Taaza Toned Milk online at ₹28. Delivery in 10 minutes.
    </div>
</div>
<div class="result results_links results_links_deep web-result result--ad">
    <a class="result__a" href="https://ads.example.com/milk">
        Cheap Milk (Ad)
    </a>
    <div class="result__snippet">Sponsored ₹1</div>
</div>
<div class="result results_links results_links_deep web-result">
    <a class="result__a" href="https://www.bigbasket.com/pd/40090894/amul-taaza/">
        Amul Taaza Homogenised Toned Milk, 500 ml Pouch - Rs 27
    </a>
    <div class="result__snippet">
        Shop online at bigbasket.
    </div>
</div>
<div class="result results_links results_links_deep web-result">
    <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fen.wikipedia.org%2Fwiki%2FMilk&amp;rut=def456">
        Milk - Wikipedia
    </a>
    <div class="result__snippet">
        Milk is a white liquid food.
    </div>
</div>
</body>
</html>"#;

    #[test]
    fn extract_url_from_ddg_redirect() {
        let href = "//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fpage&rut=abc";
        assert_eq!(
            DuckDuckGoProvider::extract_url(href),
            Some("https://example.com/page".to_string())
        );
    }

    #[test]
    fn extract_url_direct_and_invalid() {
        assert_eq!(
            DuckDuckGoProvider::extract_url("https://example.com/direct"),
            Some("https://example.com/direct".to_string())
        );
        assert!(DuckDuckGoProvider::extract_url("not-a-url").is_none());
    }

    #[test]
    fn parse_mock_html_skips_ads() {
        let records = parse_results_html(MOCK_DDG_HTML, 10).expect("should parse");
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].reference, "https://blinkit.com/prn/amul-taaza/123");
        assert!(records.iter().all(|r| !r.reference.contains("ads.example.com")));
        assert!(records[2].reference.contains("wikipedia.org"));
    }

    #[test]
    fn parse_respects_max_results() {
        assert_eq!(parse_results_html(MOCK_DDG_HTML, 2).expect("parse").len(), 2);
        assert!(parse_results_html("<html><body></body></html>", 10)
            .expect("parse")
            .is_empty());
    }

    #[test]
    fn extract_mines_price_and_platform() {
        let provider = DuckDuckGoProvider::new(DuckDuckGoConfig::default()).expect("provider");
        let records = parse_results_html(MOCK_DDG_HTML, 10).expect("parse");

        let first = provider.extract(&records[0]).expect("draft");
        assert_eq!(first.price, "₹28");
        assert_eq!(first.delivery.as_deref(), Some("10 minutes"));
        assert_eq!(first.platform, "https://blinkit.com/prn/amul-taaza/123");

        let second = provider.extract(&records[1]).expect("draft");
        assert_eq!(second.price, "Rs27");

        assert!(provider.extract(&records[2]).is_err());
    }

    #[tokio::test]
    async fn search_posts_form_to_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/html/"))
            .and(body_string_contains("q=milk+price+online"))
            .respond_with(ResponseTemplate::new(200).set_body_string(MOCK_DDG_HTML))
            .expect(1)
            .mount(&server)
            .await;

        let provider = DuckDuckGoProvider::new(DuckDuckGoConfig {
            endpoint: format!("{}/html/", server.uri()),
            user_agent: Some("PricewiseTest/1.0".into()),
            ..Default::default()
        })
        .expect("provider");
        let records = provider.search(&Query::new("milk")).await.expect("search");
        assert_eq!(records.len(), 3);
    }

    #[tokio::test]
    async fn blocked_request_is_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        let provider = DuckDuckGoProvider::new(DuckDuckGoConfig {
            endpoint: format!("{}/html/", server.uri()),
            ..Default::default()
        })
        .expect("provider");
        let err = provider.search(&Query::new("milk")).await.unwrap_err();
        assert!(matches!(err, ProviderError::Http(_)));
    }

    #[test]
    fn is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DuckDuckGoProvider>();
    }

    #[tokio::test]
    #[ignore] // Live network test, run with `cargo test -- --ignored`
    async fn live_duckduckgo_search() {
        let provider = DuckDuckGoProvider::new(DuckDuckGoConfig::default()).expect("provider");
        let records = provider.search(&Query::new("amul milk")).await.expect("live search");
        assert!(!records.is_empty());
    }
}
