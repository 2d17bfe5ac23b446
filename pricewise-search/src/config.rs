//! Policy configuration with sensible defaults.
//!
//! [`HealthPolicy`] drives the health tracker, [`RetryPolicy`] drives the
//! safe-call wrapper's retry loop and [`CurrencyTable`] drives price
//! normalization. All three deserialize with defaults for missing fields
//! and expose `validate()`.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SearchError;

/// Health tracker thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthPolicy {
    /// Number of recent call outcomes kept per provider.
    pub window_size: usize,
    /// Failure fraction of the window above which a provider is DEGRADED.
    pub failure_rate_threshold: f64,
    /// Consecutive failures that open the circuit (DOWN).
    pub consecutive_failure_limit: u32,
    /// How long an open circuit short-circuits calls, in milliseconds.
    pub open_duration_ms: u64,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            window_size: 10,
            failure_rate_threshold: 0.5,
            consecutive_failure_limit: 3,
            open_duration_ms: 30_000,
        }
    }
}

impl HealthPolicy {
    /// Open-circuit duration as a [`Duration`].
    pub fn open_duration(&self) -> Duration {
        Duration::from_millis(self.open_duration_ms)
    }

    /// Validates this policy.
    ///
    /// Checks:
    /// - `window_size` must be greater than 0
    /// - `failure_rate_threshold` must be within `0.0..=1.0`
    /// - `consecutive_failure_limit` must be greater than 0
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.window_size == 0 {
            return Err(SearchError::Config(
                "window_size must be greater than 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.failure_rate_threshold) {
            return Err(SearchError::Config(
                "failure_rate_threshold must be between 0.0 and 1.0".into(),
            ));
        }
        if self.consecutive_failure_limit == 0 {
            return Err(SearchError::Config(
                "consecutive_failure_limit must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Retry budget with exponential backoff and jitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per invocation, including the first (1 = no retries).
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound on any single delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Growth factor between consecutive delays.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay_ms: 200,
            max_delay_ms: 2_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Set the total number of attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the base delay in milliseconds.
    #[must_use]
    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    ///
    /// `min(base * multiplier^(attempt - 1), max_delay)` plus up to 10% jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 || self.base_delay_ms == 0 {
            return Duration::ZERO;
        }
        let exp = self
            .backoff_multiplier
            .powi(attempt.saturating_sub(1).min(i32::MAX as u32) as i32);
        let delay = (self.base_delay_ms as f64 * exp).min(self.max_delay_ms as f64);
        let jitter = delay * (rand::random::<f64>() * 0.1);
        Duration::from_millis((delay + jitter) as u64)
    }

    /// Validates this policy.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.max_attempts == 0 {
            return Err(SearchError::Config(
                "max_attempts must be greater than 0".into(),
            ));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(SearchError::Config(
                "backoff_multiplier must be >= 1.0".into(),
            ));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(SearchError::Config(
                "base_delay_ms must be <= max_delay_ms".into(),
            ));
        }
        Ok(())
    }
}

/// Exchange rates into a single base currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencyTable {
    /// ISO code all prices are converted into.
    pub base: String,
    /// Value of one unit of each currency in the base currency.
    pub rates: BTreeMap<String, f64>,
}

impl Default for CurrencyTable {
    fn default() -> Self {
        let rates = [("INR", 1.0), ("USD", 83.0), ("EUR", 90.0), ("GBP", 105.0)]
            .into_iter()
            .map(|(code, rate)| (code.to_string(), rate))
            .collect();
        Self {
            base: "INR".into(),
            rates,
        }
    }
}

impl CurrencyTable {
    /// Convert `amount` in `currency` into the base currency.
    ///
    /// Returns `None` if no rate is known for `currency`.
    pub fn to_base(&self, amount: f64, currency: &str) -> Option<f64> {
        if currency.eq_ignore_ascii_case(&self.base) {
            return Some(amount);
        }
        self.rates
            .iter()
            .find(|(code, _)| code.eq_ignore_ascii_case(currency))
            .map(|(_, rate)| amount * rate)
    }

    /// Validates this table.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.base.trim().is_empty() {
            return Err(SearchError::Config("base currency must be set".into()));
        }
        if let Some((code, _)) = self
            .rates
            .iter()
            .find(|(_, rate)| !rate.is_finite() || **rate <= 0.0)
        {
            return Err(SearchError::Config(format!(
                "exchange rate for {code} must be a positive number"
            )));
        }
        Ok(())
    }
}
