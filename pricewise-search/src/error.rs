//! Error types for the pricewise-search crate.
//!
//! Provider failures are absorbed by the safe-call wrapper and surface as
//! data (fallback outcomes and result warnings). The only errors returned
//! to callers as `Err` are configuration faults detected at construction.

use std::time::Duration;

use serde::Serialize;

/// Failure of a single provider call.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ProviderError {
    /// The call did not finish within the provider's configured timeout.
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// An HTTP request to the provider failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The provider answered but its payload could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// The provider signalled that it cannot serve requests (missing key, empty index, ...).
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// The caller abandoned the request before the provider finished.
    #[error("call cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Returns `true` for [`ProviderError::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// A raw record that could not be mapped to a canonical product.
///
/// Dropped from the result and counted; never fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[error("record {reference}: {reason}")]
pub struct NormalizationLoss {
    /// Reference of the raw record that was dropped.
    pub reference: String,
    /// Why the record could not be normalized.
    pub reason: String,
}

impl NormalizationLoss {
    /// Build a loss for `reference` with a human-readable reason.
    pub fn new(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            reason: reason.into(),
        }
    }
}

/// Crate-level error taxonomy.
///
/// `Config` is the only variant returned as an `Err`; the others are
/// attached to a [`crate::ComparisonResult`] as warnings so callers can
/// see what was absorbed.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SearchError {
    /// Invalid setup (no providers, duplicate names, bad policy values).
    #[error("config error: {0}")]
    Config(String),

    /// A provider timed out on every attempt.
    #[error("provider {provider} timed out after {}ms", .after.as_millis())]
    ProviderTimeout {
        /// Provider name.
        provider: String,
        /// Timeout that was exceeded.
        after: Duration,
    },

    /// A provider signalled failure on every attempt.
    #[error("provider {provider} failed: {source}")]
    Provider {
        /// Provider name.
        provider: String,
        /// Last error returned by the provider.
        source: ProviderError,
    },

    /// A raw record was dropped during normalization.
    #[error("provider {provider} normalization loss: {source}")]
    NormalizationLoss {
        /// Provider name.
        provider: String,
        /// The dropped record.
        source: NormalizationLoss,
    },

    /// No provider produced live data; the result was built from fallbacks.
    #[error("all providers degraded: {}", .0.join(", "))]
    AllProvidersDegraded(Vec<String>),

    /// A provider subset named a provider that is not registered.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

impl SearchError {
    /// Classify a terminal provider error as the matching taxonomy variant.
    pub fn from_provider(provider: &str, error: ProviderError) -> Self {
        match error {
            ProviderError::Timeout(after) => Self::ProviderTimeout {
                provider: provider.to_string(),
                after,
            },
            source => Self::Provider {
                provider: provider.to_string(),
                source,
            },
        }
    }
}

/// Convenience type alias for pricewise-search results.
pub type Result<T> = std::result::Result<T, SearchError>;
