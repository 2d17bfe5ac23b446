//! Service manager: provider registry, concurrent fan-out and diagnostics.
//!
//! Owns the [`ProviderRegistry`] and the [`HealthTracker`]. Every provider
//! call goes through [`crate::safe_call::invoke`], so the manager itself
//! never sees a provider error.

use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::HealthPolicy;
use crate::error::SearchError;
use crate::health::{HealthSnapshot, HealthStatus, HealthTracker};
use crate::provider::{ProviderDescriptor, ProviderRegistry};
use crate::safe_call;
use crate::types::{OutcomeKind, ProviderOutcome, Query};

/// Query used by [`ServiceManager::test_all`].
pub const DIAGNOSTIC_QUERY: &str = "milk";

/// Everything a single fan-out produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FanOut {
    /// One outcome per selected provider, in registration order.
    pub outcomes: Vec<ProviderOutcome>,
    /// Health of every registered provider after the fan-out.
    pub health: HealthSnapshot,
    /// Subset names that matched no registered provider.
    pub warnings: Vec<SearchError>,
}

/// Coarse classification of a diagnostic call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticStatus {
    /// Live data.
    Success,
    /// Served from the fallback path.
    Fallback,
    /// No data.
    Failure,
}

/// Per-provider result of [`ServiceManager::test_all`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticReport {
    /// Provider name.
    pub provider: String,
    /// What the call resolved to.
    pub outcome: DiagnosticStatus,
    /// Records returned (live or fallback).
    pub records: usize,
    /// Fallback reason or failure error, if any.
    pub reason: Option<String>,
    /// Wall-clock latency including retries.
    pub latency: Duration,
    /// Provider calls made.
    pub attempts: u32,
    /// Provider status after the call.
    pub status: HealthStatus,
}

/// Registry plus health tracker; the concurrency core of the service.
#[derive(Debug)]
pub struct ServiceManager {
    registry: ProviderRegistry,
    tracker: HealthTracker,
}

impl ServiceManager {
    /// Build a manager over `descriptors`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] for an empty provider list, duplicate
    /// provider names, a zero timeout or an invalid policy.
    pub fn new(
        descriptors: Vec<ProviderDescriptor>,
        policy: HealthPolicy,
    ) -> Result<Self, SearchError> {
        policy.validate()?;
        let registry = ProviderRegistry::new(descriptors)?;
        let tracker = HealthTracker::new(policy, registry.names());
        tracing::info!(providers = ?registry.names(), "service manager ready");
        Ok(Self { registry, tracker })
    }

    /// Registered providers, also usable as the aggregator's record extractor.
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// The shared health tracker.
    pub fn tracker(&self) -> &HealthTracker {
        &self.tracker
    }

    /// Fan `query` out to the selected providers concurrently.
    ///
    /// `subset` limits the call to the named providers; `None` or an empty
    /// slice selects every provider. Unknown names are skipped and reported
    /// in [`FanOut::warnings`]. Waits for every selected provider; each is
    /// bounded by its own timeout.
    pub async fn search(
        &self,
        query: &Query,
        subset: Option<&[String]>,
        cancel: &CancellationToken,
    ) -> FanOut {
        let (selected, warnings) = self.select(subset);
        tracing::trace!(query = query.text(), providers = selected.len(), "fanning out");

        let futures: Vec<_> = selected
            .into_iter()
            .map(|index| {
                let descriptor = &self.registry.descriptors()[index];
                safe_call::invoke(descriptor, index, &self.tracker, query, cancel)
            })
            .collect();
        let outcomes = futures::future::join_all(futures).await;

        for outcome in &outcomes {
            tracing::debug!(
                provider = %outcome.provider,
                count = outcome.records().len(),
                attempts = outcome.attempts,
                latency_ms = outcome.latency.as_millis() as u64,
                "provider outcome"
            );
        }

        FanOut {
            outcomes,
            health: self.tracker.snapshot(),
            warnings,
        }
    }

    /// Current health of every provider. Never calls a provider.
    pub fn status(&self) -> HealthSnapshot {
        self.tracker.snapshot()
    }

    /// Run [`DIAGNOSTIC_QUERY`] through every provider via the normal
    /// safe-call path and summarize each outcome.
    pub async fn test_all(&self) -> Vec<DiagnosticReport> {
        let query = Query::new(DIAGNOSTIC_QUERY);
        let fan_out = self.search(&query, None, &CancellationToken::new()).await;

        fan_out
            .outcomes
            .into_iter()
            .map(|outcome| {
                let records = outcome.records().len();
                let (status, reason) = match &outcome.kind {
                    OutcomeKind::Success { .. } => (DiagnosticStatus::Success, None),
                    OutcomeKind::Fallback { reason, .. } => {
                        (DiagnosticStatus::Fallback, Some(reason.to_string()))
                    }
                    OutcomeKind::Failure { error } => {
                        (DiagnosticStatus::Failure, Some(error.to_string()))
                    }
                };
                DiagnosticReport {
                    status: self.tracker.current_status(&outcome.provider).status,
                    provider: outcome.provider,
                    outcome: status,
                    records,
                    reason,
                    latency: outcome.latency,
                    attempts: outcome.attempts,
                }
            })
            .collect()
    }

    /// Registration indices for `subset`, plus a warning per unknown name.
    fn select(&self, subset: Option<&[String]>) -> (Vec<usize>, Vec<SearchError>) {
        let names = match subset {
            Some(names) if !names.is_empty() => names,
            _ => return ((0..self.registry.len()).collect(), Vec::new()),
        };

        let mut warnings = Vec::new();
        let mut selected: Vec<usize> = Vec::new();
        for name in names {
            match self.registry.position(name) {
                Some(index) => {
                    if !selected.contains(&index) {
                        selected.push(index);
                    }
                }
                None => {
                    tracing::warn!(provider = %name, "ignoring unknown provider in subset");
                    warnings.push(SearchError::UnknownProvider(name.clone()));
                }
            }
        }
        selected.sort_unstable();
        (selected, warnings)
    }
}
