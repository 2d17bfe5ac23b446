//! Core types: queries, raw provider records, canonical products,
//! provider outcomes and the final comparison result.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, SearchError};

/// A normalized shopping query.
///
/// Built once by a [`crate::query::QueryNormalizer`] and never modified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query {
    text: String,
    category: Option<String>,
    quantity: Option<String>,
    max_results: Option<usize>,
}

impl Query {
    /// Create a query from already-normalized search text.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            category: None,
            quantity: None,
            max_results: None,
        }
    }

    /// Attach a category hint (e.g. `"dairy"`).
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Attach a quantity hint (e.g. `"500ml"`).
    #[must_use]
    pub fn with_quantity(mut self, quantity: impl Into<String>) -> Self {
        self.quantity = Some(quantity.into());
        self
    }

    /// Cap the number of ranked products returned.
    #[must_use]
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    /// Normalized search text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Category hint, if any.
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    /// Quantity hint, if any.
    pub fn quantity(&self) -> Option<&str> {
        self.quantity.as_deref()
    }

    /// Requested result cap, if any.
    pub fn max_results(&self) -> Option<usize> {
        self.max_results
    }
}

/// Capability tags a provider advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Backed by a remote JSON search API.
    RemoteApi,
    /// Scrapes a public web search page.
    WebScrape,
    /// Local vector-similarity index.
    SemanticIndex,
    /// Static, in-process dataset.
    StaticCatalog,
}

/// An unprocessed record as returned by a provider.
///
/// The body shape is provider-specific; [`crate::provider::Provider::extract`]
/// knows how to read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Stable reference to the record (URL, index id, catalog key).
    pub reference: String,
    /// Provider-specific payload.
    pub body: serde_json::Value,
}

impl RawRecord {
    /// Create a raw record.
    pub fn new(reference: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            reference: reference.into(),
            body,
        }
    }

    /// Read a string field from the body, trimming whitespace.
    ///
    /// Numbers are rendered as strings so that `"price": 45` and
    /// `"price": "45"` read the same way.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.body.get(key)? {
            serde_json::Value::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// First present field among `keys`.
    pub fn first_text(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.text(key))
    }
}

/// Provider-specific view of a record, before shared canonicalization.
///
/// All fields are free text; the aggregator parses price, quantity,
/// delivery time and platform uniformly across providers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductDraft {
    /// Product title as listed.
    pub title: String,
    /// Price text, e.g. `"₹1,299"`, `"$3.99"`, `"45"`.
    pub price: String,
    /// Store or platform name, or a URL whose host names the platform.
    pub platform: String,
    /// Quantity text, e.g. `"500 ml"`, `"1kg"`. Parsed from the title when absent.
    pub quantity: Option<String>,
    /// Delivery estimate text, e.g. `"30 mins"`, `"2 days"`.
    pub delivery: Option<String>,
    /// Product page URL.
    pub url: Option<String>,
}

/// Normalized quantity unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    /// Mass in grams.
    Gram,
    /// Volume in millilitres.
    Millilitre,
    /// Discrete count (pieces, eggs, packs).
    Piece,
}

impl Unit {
    /// Short suffix used in canonical quantity strings.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Gram => "g",
            Self::Millilitre => "ml",
            Self::Piece => "pc",
        }
    }
}

/// A quantity in base units (grams, millilitres or pieces).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    /// Amount in base units.
    pub amount: f64,
    /// Base unit.
    pub unit: Unit,
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Two decimals at most; trailing zeros trimmed so 500.0 prints "500".
        let rounded = (self.amount * 100.0).round() / 100.0;
        write!(f, "{rounded}{}", self.unit.suffix())
    }
}

/// Where a canonical product came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Name of the provider that surfaced the record.
    pub provider: String,
    /// Raw record reference.
    pub reference: String,
}

/// A normalized, cross-provider comparable product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalProduct {
    /// Cleaned product title.
    pub title: String,
    /// Canonical platform identifier (e.g. `"bigbasket"`).
    pub platform: String,
    /// Price converted to the base currency.
    pub price: f64,
    /// ISO code of the base currency.
    pub currency: String,
    /// Normalized quantity, when one could be determined.
    pub quantity: Option<Quantity>,
    /// Estimated delivery time. `None` means unknown and sorts last.
    pub delivery: Option<Duration>,
    /// Product page URL, if known.
    pub url: Option<String>,
    /// Originating provider and record.
    pub provenance: Provenance,
    /// Deterministic identity used to collapse equivalent items.
    pub dedup_key: String,
}

impl CanonicalProduct {
    /// Delivery time used for ordering: unknown sorts after every known value.
    pub fn delivery_rank(&self) -> Duration {
        self.delivery.unwrap_or(Duration::MAX)
    }
}

/// Outcome kind recorded in the health tracker's sliding window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    /// The provider returned records.
    Success,
    /// The provider returned an error.
    Failure,
    /// The provider exceeded its timeout.
    Timeout,
}

impl CallOutcome {
    /// Returns `true` for failures and timeouts.
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Success)
    }
}

/// Why a provider was served from its fallback.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FallbackReason {
    /// The circuit was open; the provider was not called.
    CircuitOpen {
        /// Time left until a half-open probe is allowed.
        retry_in: Duration,
    },
    /// Every attempt failed; carries the last error.
    Exhausted(ProviderError),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CircuitOpen { retry_in } => {
                write!(f, "circuit open (retry in {}ms)", retry_in.as_millis())
            }
            Self::Exhausted(err) => write!(f, "attempts exhausted: {err}"),
        }
    }
}

/// Tagged result of one provider invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Live data from the provider.
    Success {
        /// Records returned.
        records: Vec<RawRecord>,
    },
    /// Degraded data from the provider's fallback generator.
    Fallback {
        /// Fallback records.
        records: Vec<RawRecord>,
        /// What triggered the fallback.
        reason: FallbackReason,
    },
    /// No data: the provider failed and has no fallback.
    Failure {
        /// Last error.
        error: ProviderError,
    },
}

/// Result of invoking one provider for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderOutcome {
    /// Provider name.
    pub provider: String,
    /// Position of the provider in registration order.
    pub registration: usize,
    /// What happened.
    pub kind: OutcomeKind,
    /// Wall-clock time spent, including retries and backoff.
    pub latency: Duration,
    /// Number of provider calls made (0 when short-circuited).
    pub attempts: u32,
}

impl ProviderOutcome {
    /// Records carried by this outcome (empty for failures).
    pub fn records(&self) -> &[RawRecord] {
        match &self.kind {
            OutcomeKind::Success { records } | OutcomeKind::Fallback { records, .. } => records,
            OutcomeKind::Failure { .. } => &[],
        }
    }

    /// Returns `true` if the provider produced live data.
    pub fn is_success(&self) -> bool {
        matches!(self.kind, OutcomeKind::Success { .. })
    }

    /// Returns `true` if the outcome came from the fallback path.
    pub fn is_fallback(&self) -> bool {
        matches!(self.kind, OutcomeKind::Fallback { .. })
    }
}

/// Cheapest and most expensive ranked prices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceRange {
    /// Lowest price.
    pub min: f64,
    /// Highest price.
    pub max: f64,
}

impl PriceRange {
    /// How much the best pick saves against the most expensive listing.
    pub fn potential_savings(&self) -> f64 {
        self.max - self.min
    }
}

/// The ranked, deduplicated answer to one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    /// The normalized query text.
    pub query: String,
    /// Products ranked by price, then delivery time, then platform.
    pub ranked: Vec<CanonicalProduct>,
    /// The first ranked product.
    pub best_pick: Option<CanonicalProduct>,
    /// Providers that contributed zero usable records for this query.
    pub degraded_providers: Vec<String>,
    /// Providers whose records came from their fallback path.
    pub fallback_providers: Vec<String>,
    /// `true` when no provider produced live data.
    pub degraded: bool,
    /// Number of raw records dropped during normalization.
    pub normalization_losses: usize,
    /// Number of records collapsed into an equivalent cheaper listing.
    pub duplicates_collapsed: usize,
    /// Price span across the ranked products.
    pub price_range: Option<PriceRange>,
    /// Problems absorbed while answering.
    pub warnings: Vec<SearchError>,
}

impl ComparisonResult {
    /// An empty result with no best pick.
    pub fn empty(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ranked: Vec::new(),
            best_pick: None,
            degraded_providers: Vec::new(),
            fallback_providers: Vec::new(),
            degraded: true,
            normalization_losses: 0,
            duplicates_collapsed: 0,
            price_range: None,
            warnings: Vec::new(),
        }
    }
}
