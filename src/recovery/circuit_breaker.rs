//! Per-resource circuit breakers.
//!
//! Each resource key has its own state machine:
//! - **Closed**: calls pass through; consecutive failures are counted
//! - **Open**: calls fail immediately with `CIRCUIT_OPEN` until the reset
//!   timeout elapses
//! - **Half-open**: exactly one trial call is admitted; its success closes
//!   the breaker, its failure reopens it
//!
//! All transitions happen under one lock, so only one caller can ever hold
//! the half-open trial slot.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::Display;
use tokio::time::Instant;

use crate::config::serde_millis;
use crate::context::LogContext;
use crate::error::{ErrorCode, ErrorModel};

/// Breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Configuration shared by every breaker in a registry.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    #[builder(default = 5)]
    pub failure_threshold: u32,
    /// How long the circuit stays open before a trial call is allowed.
    #[builder(default = Duration::from_secs(30))]
    #[serde(rename = "reset_timeout_ms", with = "serde_millis")]
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

/// Snapshot of one resource's breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerState {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub last_failure_at: Option<Instant>,
    pub opened_until: Option<Instant>,
    pub trial_in_flight: bool,
}

impl CircuitBreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
            opened_until: None,
            trial_in_flight: false,
        }
    }
}

/// Decides whether a failure counts against the breaker.
pub type FailurePredicate = fn(&ErrorModel) -> bool;

fn every_failure(_: &ErrorModel) -> bool {
    true
}

/// Registry of breakers keyed by resource. Clones share state.
#[derive(Clone)]
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    counts_as_failure: FailurePredicate,
    states: Arc<Mutex<HashMap<String, CircuitBreakerState>>>,
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl std::fmt::Debug for CircuitBreakerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerRegistry")
            .field("config", &self.config)
            .field("resources", &self.lock().len())
            .finish()
    }
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            counts_as_failure: every_failure,
            states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Only failures matching `predicate` are counted; others pass through
    /// and leave the breaker untouched.
    pub fn with_failure_predicate(mut self, predicate: FailurePredicate) -> Self {
        self.counts_as_failure = predicate;
        self
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state for `key`, or `None` if it was never called.
    pub fn snapshot(&self, key: &str) -> Option<CircuitBreakerState> {
        self.lock().get(key).cloned()
    }

    /// Forget every breaker.
    pub fn reset(&self) {
        self.lock().clear();
    }

    pub fn reset_key(&self, key: &str) {
        self.lock().remove(key);
    }

    /// Run `operation` through the breaker for `key`.
    pub async fn call<T, F, Fut>(&self, key: &str, operation: F) -> Result<T, ErrorModel>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ErrorModel>>,
    {
        let permit = self.acquire(key)?;
        let result = operation().await;
        match &result {
            Ok(_) => permit.succeed(),
            Err(error) if (self.counts_as_failure)(error) => permit.fail(),
            Err(_) => permit.release(),
        }
        result
    }

    /// Reserve a call slot. Fails with `CIRCUIT_OPEN` while the circuit is
    /// open or a half-open trial is already in flight.
    pub fn acquire(&self, key: &str) -> Result<Permit<'_>, ErrorModel> {
        let now = Instant::now();
        let mut states = self.lock();
        let entry = states
            .entry(key.to_string())
            .or_insert_with(CircuitBreakerState::new);

        let trial = match entry.state {
            CircuitState::Closed => false,
            CircuitState::Open => match entry.opened_until {
                Some(until) if now < until => {
                    return Err(self.open_error(key, Some(until - now)));
                }
                _ => {
                    entry.state = CircuitState::HalfOpen;
                    entry.trial_in_flight = true;
                    tracing::info!(resource = key, "Circuit half-open, admitting trial call");
                    true
                }
            },
            CircuitState::HalfOpen => {
                if entry.trial_in_flight {
                    return Err(self.open_error(key, None));
                }
                entry.trial_in_flight = true;
                true
            }
        };

        Ok(Permit {
            registry: self,
            key: key.to_string(),
            trial,
            settled: false,
        })
    }

    fn settle(&self, key: &str, trial: bool, outcome: Outcome) {
        let now = Instant::now();
        let mut states = self.lock();
        let Some(entry) = states.get_mut(key) else {
            return;
        };

        match (outcome, trial) {
            (Outcome::Success, true) => {
                entry.state = CircuitState::Closed;
                entry.consecutive_failures = 0;
                entry.opened_until = None;
                entry.trial_in_flight = false;
                tracing::info!(resource = key, "Circuit closed after successful trial");
            }
            (Outcome::Success, false) => {
                if entry.state == CircuitState::Closed {
                    entry.consecutive_failures = 0;
                }
            }
            (Outcome::Failure, true) => {
                entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);
                entry.last_failure_at = Some(now);
                entry.state = CircuitState::Open;
                entry.opened_until = Some(now + self.config.reset_timeout);
                entry.trial_in_flight = false;
                tracing::warn!(resource = key, "Trial call failed, circuit reopened");
            }
            (Outcome::Failure, false) => {
                entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);
                entry.last_failure_at = Some(now);
                if entry.state == CircuitState::Closed
                    && entry.consecutive_failures >= self.config.failure_threshold.max(1)
                {
                    entry.state = CircuitState::Open;
                    entry.opened_until = Some(now + self.config.reset_timeout);
                    tracing::warn!(
                        resource = key,
                        consecutive_failures = entry.consecutive_failures,
                        "Circuit opened"
                    );
                }
            }
            (Outcome::Abandoned, true) => {
                entry.trial_in_flight = false;
            }
            (Outcome::Abandoned, false) => {}
        }
    }

    fn open_error(&self, key: &str, remaining: Option<Duration>) -> ErrorModel {
        let mut context = LogContext::from_operation("circuit_breaker", "acquire")
            .with_resource_id(key);
        if let Some(remaining) = remaining {
            context = context.with_metadata("retry_in_ms", remaining.as_millis() as u64);
        }
        ErrorModel::new(ErrorCode::CircuitOpen, format!("circuit for '{key}' is open"))
            .with_context(context)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CircuitBreakerState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Success,
    Failure,
    Abandoned,
}

/// An admitted call. Dropping it unsettled frees a held trial slot.
#[must_use = "a permit must be settled with succeed(), fail() or release()"]
pub struct Permit<'a> {
    registry: &'a CircuitBreakerRegistry,
    key: String,
    trial: bool,
    settled: bool,
}

impl Permit<'_> {
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn succeed(mut self) {
        self.finish(Outcome::Success);
    }

    pub fn fail(mut self) {
        self.finish(Outcome::Failure);
    }

    /// Give the slot back without counting a success or failure.
    pub fn release(mut self) {
        self.finish(Outcome::Abandoned);
    }

    fn finish(&mut self, outcome: Outcome) {
        if !self.settled {
            self.settled = true;
            self.registry.settle(&self.key, self.trial, outcome);
        }
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.finish(Outcome::Abandoned);
    }
}
