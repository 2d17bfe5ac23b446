//! Aggregator / price comparator.
//!
//! Turns the outcomes of one fan-out into a [`ComparisonResult`]:
//! normalizes every record, collapses cross-provider duplicates, ranks the
//! survivors and reports which providers contributed nothing.
//!
//! Aggregation is a pure function of its inputs. The same outcome set,
//! in any order, produces the same ranked list.

pub mod dedup;
pub mod normalize;
pub mod ranking;

use std::collections::BTreeSet;

use crate::config::CurrencyTable;
use crate::error::{ProviderError, SearchError};
use crate::provider::RecordExtractor;
use crate::types::{
    ComparisonResult, FallbackReason, OutcomeKind, PriceRange, ProviderOutcome, Query,
};

use self::dedup::{deduplicate, Candidate};
use self::normalize::canonicalize;
use self::ranking::rank;

/// Stateless price comparator configured with a currency table.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    currencies: CurrencyTable,
}

impl Aggregator {
    /// Create an aggregator converting prices with `currencies`.
    pub fn new(currencies: CurrencyTable) -> Self {
        Self { currencies }
    }

    /// The currency table in use.
    pub fn currencies(&self) -> &CurrencyTable {
        &self.currencies
    }

    /// Build the comparison for `query` from `outcomes`.
    pub fn aggregate(
        &self,
        query: &Query,
        outcomes: &[ProviderOutcome],
        extractor: &dyn RecordExtractor,
    ) -> ComparisonResult {
        self.aggregate_limited(query, outcomes, extractor, query.max_results())
    }

    /// As [`Aggregator::aggregate`], truncating the ranked list to
    /// `max_results`. The best pick and price range are computed before
    /// truncation.
    ///
    /// # Pipeline
    ///
    /// 1. Extract and canonicalize every record of every Success/Fallback outcome
    /// 2. Drop records that fail normalization, counting each as a loss
    /// 3. Collapse duplicates by dedup key
    /// 4. Rank by price, delivery time, platform and key
    /// 5. Summarize degraded and fallback providers plus absorbed warnings
    pub fn aggregate_limited(
        &self,
        query: &Query,
        outcomes: &[ProviderOutcome],
        extractor: &dyn RecordExtractor,
        max_results: Option<usize>,
    ) -> ComparisonResult {
        let mut result = ComparisonResult::empty(query.text());
        if outcomes.is_empty() {
            return result;
        }

        let mut ordered: Vec<&ProviderOutcome> = outcomes.iter().collect();
        ordered.sort_by(|a, b| {
            a.registration
                .cmp(&b.registration)
                .then_with(|| a.provider.cmp(&b.provider))
        });

        let mut candidates = Vec::new();
        let mut contributors = BTreeSet::new();

        for outcome in &ordered {
            let provider = outcome.provider.as_str();
            match &outcome.kind {
                OutcomeKind::Success { .. } => {}
                OutcomeKind::Fallback { reason, .. } => {
                    result.fallback_providers.push(provider.to_string());
                    result.warnings.push(match reason {
                        FallbackReason::Exhausted(err) => {
                            SearchError::from_provider(provider, err.clone())
                        }
                        FallbackReason::CircuitOpen { .. } => SearchError::Provider {
                            provider: provider.to_string(),
                            source: ProviderError::Unavailable(reason.to_string()),
                        },
                    });
                }
                OutcomeKind::Failure { error } => {
                    result
                        .warnings
                        .push(SearchError::from_provider(provider, error.clone()));
                }
            }

            for (position, record) in outcome.records().iter().enumerate() {
                let canonical = extractor
                    .extract(provider, record)
                    .and_then(|draft| canonicalize(provider, record, &draft, &self.currencies));
                match canonical {
                    Ok(product) => {
                        contributors.insert(provider);
                        candidates.push(Candidate {
                            product,
                            registration: outcome.registration,
                            position,
                        });
                    }
                    Err(loss) => {
                        tracing::debug!(
                            provider,
                            error = %loss,
                            "record dropped during normalization"
                        );
                        result.normalization_losses += 1;
                        result.warnings.push(SearchError::NormalizationLoss {
                            provider: provider.to_string(),
                            source: loss,
                        });
                    }
                }
            }
        }

        result.degraded_providers = ordered
            .iter()
            .map(|o| o.provider.as_str())
            .filter(|name| !contributors.contains(name))
            .map(str::to_string)
            .collect();

        let any_live = ordered.iter().any(|o| o.is_success());
        result.degraded = !any_live;
        if !any_live && !result.fallback_providers.is_empty() {
            result
                .warnings
                .push(SearchError::AllProvidersDegraded(result.fallback_providers.clone()));
        }

        let (mut ranked, collapsed) = deduplicate(candidates);
        rank(&mut ranked);

        result.duplicates_collapsed = collapsed;
        result.best_pick = ranked.first().cloned();
        result.price_range = match (ranked.first(), ranked.last()) {
            (Some(first), Some(last)) => Some(PriceRange {
                min: first.price,
                max: last.price,
            }),
            _ => None,
        };
        if let Some(limit) = max_results {
            ranked.truncate(limit);
        }
        result.ranked = ranked;

        tracing::debug!(
            ranked = result.ranked.len(),
            collapsed,
            losses = result.normalization_losses,
            degraded = result.degraded,
            "aggregation complete"
        );
        result
    }
}
