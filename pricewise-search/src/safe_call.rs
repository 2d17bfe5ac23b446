//! Safe-call wrapper: one provider invocation under timeout, retry and
//! circuit-breaker control.
//!
//! Every invocation resolves to a [`ProviderOutcome`] value. Provider
//! errors, timeouts, open circuits and caller cancellation all become
//! data; nothing propagates to the service manager as an error.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::health::{Admission, HealthTracker};
use crate::provider::ProviderDescriptor;
use crate::types::{CallOutcome, FallbackReason, OutcomeKind, ProviderOutcome, Query, RawRecord};

/// Invoke one provider for one query.
///
/// # Algorithm
///
/// 1. Ask the tracker for admission. An open circuit returns the fallback
///    immediately without calling the provider or recording anything.
/// 2. Call the provider under its timeout. Success is recorded and returned.
/// 3. Failures are retried with backoff until the retry budget is spent.
///    A half-open probe gets a single attempt. The terminal failure is
///    recorded once, then the fallback (or a `Failure` when the descriptor
///    has none) is returned.
///
/// Cancelling `cancel` abandons the current attempt or backoff sleep. A
/// cancelled call records nothing and returns its held probe claim.
pub async fn invoke(
    descriptor: &ProviderDescriptor,
    registration: usize,
    tracker: &HealthTracker,
    query: &Query,
    cancel: &CancellationToken,
) -> ProviderOutcome {
    let name = descriptor.name();
    let started = Instant::now();

    let admission = tracker.admit(name);
    if let Admission::Rejected { retry_in } = admission {
        tracing::debug!(
            provider = name,
            retry_in_ms = retry_in.as_millis() as u64,
            "circuit open, serving fallback"
        );
        let kind = degrade(
            descriptor,
            query,
            FallbackReason::CircuitOpen { retry_in },
            ProviderError::Unavailable("circuit open".into()),
        );
        return finish(name, registration, kind, started, 0);
    }

    let is_probe = admission == Admission::Probe;
    let max_attempts = if is_probe {
        1
    } else {
        descriptor.retry().max_attempts.max(1)
    };

    let mut attempts = 0;
    let mut last_error = ProviderError::Unavailable("no attempt made".into());

    while attempts < max_attempts {
        attempts += 1;
        match attempt(descriptor, query, cancel).await {
            Ok(records) => {
                tracker.record(name, CallOutcome::Success);
                tracing::debug!(
                    provider = name,
                    count = records.len(),
                    attempts,
                    probe = is_probe,
                    "provider returned records"
                );
                return finish(
                    name,
                    registration,
                    OutcomeKind::Success { records },
                    started,
                    attempts,
                );
            }
            Err(ProviderError::Cancelled) => {
                return cancelled(
                    descriptor,
                    registration,
                    tracker,
                    query,
                    is_probe,
                    started,
                    attempts,
                );
            }
            Err(err) => {
                tracing::warn!(
                    provider = name,
                    attempt = attempts,
                    max_attempts,
                    error = %err,
                    "provider attempt failed"
                );
                last_error = err;
            }
        }

        if attempts < max_attempts {
            let delay = descriptor.retry().delay_for_attempt(attempts);
            if !backoff(delay, cancel).await {
                return cancelled(
                    descriptor,
                    registration,
                    tracker,
                    query,
                    is_probe,
                    started,
                    attempts,
                );
            }
        }
    }

    let outcome = if last_error.is_timeout() {
        CallOutcome::Timeout
    } else {
        CallOutcome::Failure
    };
    tracker.record(name, outcome);

    let kind = degrade(
        descriptor,
        query,
        FallbackReason::Exhausted(last_error.clone()),
        last_error,
    );
    if let OutcomeKind::Fallback { ref records, ref reason } = kind {
        tracing::warn!(
            provider = name,
            attempts,
            count = records.len(),
            reason = %reason,
            "provider exhausted, serving fallback"
        );
    }
    finish(name, registration, kind, started, attempts)
}

/// One attempt under the descriptor's timeout, abandoned on cancellation.
async fn attempt(
    descriptor: &ProviderDescriptor,
    query: &Query,
    cancel: &CancellationToken,
) -> Result<Vec<RawRecord>, ProviderError> {
    let timeout = descriptor.timeout();
    tokio::select! {
        () = cancel.cancelled() => Err(ProviderError::Cancelled),
        result = tokio::time::timeout(timeout, descriptor.provider().search(query)) => {
            result.unwrap_or(Err(ProviderError::Timeout(timeout)))
        }
    }
}

/// Sleep for `delay`; returns `false` if cancelled first.
async fn backoff(delay: Duration, cancel: &CancellationToken) -> bool {
    if delay.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}

fn cancelled(
    descriptor: &ProviderDescriptor,
    registration: usize,
    tracker: &HealthTracker,
    query: &Query,
    is_probe: bool,
    started: Instant,
    attempts: u32,
) -> ProviderOutcome {
    let name = descriptor.name();
    if is_probe {
        tracker.release_probe(name);
    }
    tracing::debug!(provider = name, attempts, "provider call cancelled");
    let kind = degrade(
        descriptor,
        query,
        FallbackReason::Exhausted(ProviderError::Cancelled),
        ProviderError::Cancelled,
    );
    finish(name, registration, kind, started, attempts)
}

/// Fallback records if the descriptor has a generator, otherwise a failure.
fn degrade(
    descriptor: &ProviderDescriptor,
    query: &Query,
    reason: FallbackReason,
    error: ProviderError,
) -> OutcomeKind {
    match descriptor.fallback(query) {
        Some(records) => OutcomeKind::Fallback { records, reason },
        None => OutcomeKind::Failure { error },
    }
}

fn finish(
    name: &str,
    registration: usize,
    kind: OutcomeKind,
    started: Instant,
    attempts: u32,
) -> ProviderOutcome {
    ProviderOutcome {
        provider: name.to_string(),
        registration,
        kind,
        latency: started.elapsed(),
        attempts,
    }
}
