//! Per-provider health tracking and circuit breaking.
//!
//! Keeps a sliding window of recent call outcomes for every registered
//! provider and derives an UP / DEGRADED / DOWN status from it. A DOWN
//! provider is short-circuited until its open timer elapses; after that a
//! single half-open probe decides whether it comes back UP or re-opens.
//!
//! # State Machine
//!
//! ```text
//! ┌──────┐ failure rate > threshold ┌──────────┐ N consecutive ┌──────┐
//! │  Up  ├─────────────────────────►│ Degraded ├──────────────►│ Down │
//! └──▲───┘◄─────────────────────────┴──────────┘   failures    └──┬───┘
//!    │        failure rate back under threshold                    │
//!    │                                                             │ open timer
//!    │   probe succeeds   ┌────────────────────┐                   │ elapsed
//!    └────────────────────┤ Down (probe ready) │◄──────────────────┘
//!                         └─────────┬──────────┘
//!                                   │ probe fails → Down, timer restarts
//! ```
//!
//! The tracker's provider map is fixed at construction; each entry has its
//! own lock, so concurrent queries only contend on the same provider.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::HealthPolicy;
use crate::types::CallOutcome;

/// Coarse provider status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    /// Healthy.
    Up,
    /// Failing often, still called.
    Degraded,
    /// Circuit open; calls are short-circuited to the fallback.
    Down,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => f.write_str("UP"),
            Self::Degraded => f.write_str("DEGRADED"),
            Self::Down => f.write_str("DOWN"),
        }
    }
}

/// Health tracking data for a single provider.
#[derive(Debug, Clone)]
pub struct HealthState {
    /// Current status.
    pub status: HealthStatus,
    /// Most recent outcomes, oldest first.
    pub window: VecDeque<CallOutcome>,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// While DOWN: when a half-open probe becomes allowed.
    pub open_until: Option<Instant>,
    /// When the current half-open probe was handed out, if one is in flight.
    pub probe_started_at: Option<Instant>,
    /// Total outcomes recorded since startup.
    pub total_calls: u64,
    /// When the last failure occurred (if any).
    pub last_failure_at: Option<Instant>,
    /// When the last success occurred (if any).
    pub last_success_at: Option<Instant>,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            status: HealthStatus::Up,
            window: VecDeque::new(),
            consecutive_failures: 0,
            open_until: None,
            probe_started_at: None,
            total_calls: 0,
            last_failure_at: None,
            last_success_at: None,
        }
    }
}

impl HealthState {
    /// Fraction of failures in the current window (0.0 for an empty window).
    pub fn failure_rate(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        let failures = self.window.iter().filter(|o| o.is_failure()).count();
        failures as f64 / self.window.len() as f64
    }

    /// Failures currently in the window.
    pub fn window_failures(&self) -> usize {
        self.window.iter().filter(|o| o.is_failure()).count()
    }
}

/// Read-only view returned by [`HealthTracker::current_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusView {
    /// Current status.
    pub status: HealthStatus,
    /// `true` if DOWN and the open timer has elapsed, so one probe may run.
    pub probe_ready: bool,
}

/// Gate decision handed to the safe-call wrapper before the first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Call normally with the full retry budget.
    Allowed,
    /// Half-open probe: exactly one attempt.
    Probe,
    /// Circuit open: do not call the provider.
    Rejected {
        /// Time until a probe becomes allowed.
        retry_in: Duration,
    },
}

/// Serializable point-in-time health report for one provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderHealth {
    /// Provider name.
    pub provider: String,
    /// Current status.
    pub status: HealthStatus,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// Failures in the sliding window.
    pub window_failures: usize,
    /// Outcomes in the sliding window.
    pub window_len: usize,
    /// Failure fraction of the window.
    pub failure_rate: f64,
    /// Time until a probe is allowed, while DOWN.
    pub open_for: Option<Duration>,
    /// Total outcomes recorded since startup.
    pub total_calls: u64,
}

/// Point-in-time health of every provider, in registration order.
pub type HealthSnapshot = Vec<ProviderHealth>;

/// Per-provider health tracker.
#[derive(Debug)]
pub struct HealthTracker {
    policy: HealthPolicy,
    order: Vec<String>,
    providers: HashMap<String, Mutex<HealthState>>,
}

impl HealthTracker {
    /// Create a tracker for the given providers, all starting UP.
    pub fn new<I, S>(policy: HealthPolicy, providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let order: Vec<String> = providers.into_iter().map(Into::into).collect();
        let providers = order
            .iter()
            .map(|name| (name.clone(), Mutex::new(HealthState::default())))
            .collect();
        Self {
            policy,
            order,
            providers,
        }
    }

    /// The policy this tracker applies.
    pub fn policy(&self) -> &HealthPolicy {
        &self.policy
    }

    /// Record the outcome of a call and recompute the provider's status.
    ///
    /// Unknown providers are ignored.
    pub fn record(&self, provider: &str, outcome: CallOutcome) {
        let Some(mut state) = self.lock(provider) else {
            tracing::warn!(provider, "health record for unregistered provider");
            return;
        };
        let now = Instant::now();
        let previous = state.status;

        state.window.push_back(outcome);
        while state.window.len() > self.policy.window_size {
            state.window.pop_front();
        }
        state.total_calls += 1;

        if outcome.is_failure() {
            state.consecutive_failures = state.consecutive_failures.saturating_add(1);
            state.last_failure_at = Some(now);
            let probe_failed = state.probe_started_at.take().is_some();
            if probe_failed
                || state.consecutive_failures >= self.policy.consecutive_failure_limit
            {
                state.status = HealthStatus::Down;
                state.open_until = Some(now + self.policy.open_duration());
            } else {
                state.status = self.rate_status(&state);
            }
        } else {
            state.consecutive_failures = 0;
            state.last_success_at = Some(now);
            let probe_succeeded = state.probe_started_at.take().is_some();
            if probe_succeeded {
                // Recovered through a probe: start from a clean window.
                state.window.clear();
                state.window.push_back(CallOutcome::Success);
                state.open_until = None;
                state.status = HealthStatus::Up;
            } else if previous != HealthStatus::Down {
                state.status = self.rate_status(&state);
            }
        }

        if state.status != previous {
            tracing::warn!(
                provider,
                from = %previous,
                to = %state.status,
                consecutive_failures = state.consecutive_failures,
                "provider health changed"
            );
        }
    }

    /// Current status and whether a half-open probe may run.
    pub fn current_status(&self, provider: &str) -> StatusView {
        let Some(state) = self.lock(provider) else {
            return StatusView {
                status: HealthStatus::Up,
                probe_ready: false,
            };
        };
        let probe_ready = state.status == HealthStatus::Down
            && state.open_until.is_none_or(|t| Instant::now() >= t);
        StatusView {
            status: state.status,
            probe_ready,
        }
    }

    /// Decide whether a call may go ahead, claiming the half-open probe
    /// if one is due.
    ///
    /// Only one caller receives [`Admission::Probe`] per open window. A
    /// probe claim older than the open duration is considered abandoned
    /// and may be handed out again.
    pub fn admit(&self, provider: &str) -> Admission {
        let Some(mut state) = self.lock(provider) else {
            return Admission::Allowed;
        };
        if state.status != HealthStatus::Down {
            return Admission::Allowed;
        }

        let now = Instant::now();
        let open_until = state.open_until.unwrap_or(now);
        if now < open_until {
            return Admission::Rejected {
                retry_in: open_until - now,
            };
        }

        let open_duration = self.policy.open_duration();
        match state.probe_started_at {
            Some(started) if now.duration_since(started) < open_duration => {
                Admission::Rejected {
                    retry_in: open_duration - now.duration_since(started),
                }
            }
            _ => {
                state.probe_started_at = Some(now);
                tracing::debug!(provider, "half-open probe admitted");
                Admission::Probe
            }
        }
    }

    /// Give back a probe claim that was never used (e.g. the call was cancelled).
    pub fn release_probe(&self, provider: &str) {
        if let Some(mut state) = self.lock(provider) {
            state.probe_started_at = None;
        }
    }

    /// Copy of one provider's raw state.
    pub fn state(&self, provider: &str) -> Option<HealthState> {
        self.lock(provider).map(|state| state.clone())
    }

    /// Health report for every provider in registration order.
    pub fn snapshot(&self) -> HealthSnapshot {
        let now = Instant::now();
        self.order
            .iter()
            .filter_map(|name| {
                let state = self.lock(name)?;
                let open_for = match (state.status, state.open_until) {
                    (HealthStatus::Down, Some(until)) => Some(until.saturating_duration_since(now)),
                    _ => None,
                };
                Some(ProviderHealth {
                    provider: name.clone(),
                    status: state.status,
                    consecutive_failures: state.consecutive_failures,
                    window_failures: state.window_failures(),
                    window_len: state.window.len(),
                    failure_rate: state.failure_rate(),
                    open_for,
                    total_calls: state.total_calls,
                })
            })
            .collect()
    }

    /// Reset every provider to UP with an empty window.
    pub fn reset(&self) {
        for name in &self.order {
            if let Some(mut state) = self.lock(name) {
                *state = HealthState::default();
            }
        }
    }

    fn rate_status(&self, state: &HealthState) -> HealthStatus {
        if state.failure_rate() > self.policy.failure_rate_threshold {
            HealthStatus::Degraded
        } else {
            HealthStatus::Up
        }
    }

    fn lock(&self, provider: &str) -> Option<MutexGuard<'_, HealthState>> {
        let entry = self.providers.get(provider)?;
        // A poisoned lock only means another thread panicked mid-update;
        // the state itself is still a valid value.
        Some(entry.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }
}
