//! Composition of the recovery strategies around one resource.

use std::future::Future;
use std::time::Duration;

use super::bulkhead::BulkheadRegistry;
use super::circuit_breaker::CircuitBreakerRegistry;
use super::retry::RetryPolicy;
use super::timeout::with_timeout;
use crate::config::FaultlineConfig;
use crate::error::ErrorModel;

/// Shared resilience state: breakers and bulkheads per resource key, plus
/// the default retry policy. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct Resilience {
    breakers: CircuitBreakerRegistry,
    bulkheads: BulkheadRegistry,
    retry: RetryPolicy,
}

impl Resilience {
    pub fn new(
        breakers: CircuitBreakerRegistry,
        bulkheads: BulkheadRegistry,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            breakers,
            bulkheads,
            retry,
        }
    }

    pub fn from_config(config: &FaultlineConfig) -> Self {
        Self::new(
            CircuitBreakerRegistry::new(config.circuit_breaker.clone()),
            BulkheadRegistry::new(config.bulkhead.clone()),
            config.retry.clone(),
        )
    }

    pub fn breakers(&self) -> &CircuitBreakerRegistry {
        &self.breakers
    }

    pub fn bulkheads(&self) -> &BulkheadRegistry {
        &self.bulkheads
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Clear all breaker and bulkhead state.
    pub fn reset(&self) {
        self.breakers.reset();
        self.bulkheads.reset();
    }

    /// Start a pipeline for `resource` with every stage disabled.
    pub fn pipeline(&self, resource: impl Into<String>) -> Pipeline<'_> {
        Pipeline {
            resilience: self,
            resource: resource.into(),
            retry: None,
            timeout: None,
            circuit_breaker: false,
            bulkhead: false,
        }
    }

    /// Pipeline with every stage enabled, using the default retry policy.
    pub fn protected(&self, resource: impl Into<String>, timeout: Duration) -> Pipeline<'_> {
        self.pipeline(resource)
            .with_default_retry()
            .timeout(timeout)
            .circuit_breaker()
            .bulkhead()
    }
}

/// Strategies applied to one call, outermost first: bulkhead, circuit
/// breaker, retry, per-attempt timeout.
#[derive(Debug, Clone)]
pub struct Pipeline<'r> {
    resilience: &'r Resilience,
    resource: String,
    retry: Option<RetryPolicy>,
    timeout: Option<Duration>,
    circuit_breaker: bool,
    bulkhead: bool,
}

impl Pipeline<'_> {
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn with_default_retry(mut self) -> Self {
        self.retry = Some(self.resilience.retry.clone());
        self
    }

    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    pub fn circuit_breaker(mut self) -> Self {
        self.circuit_breaker = true;
        self
    }

    pub fn bulkhead(mut self) -> Self {
        self.bulkhead = true;
        self
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Run `operation` through the enabled stages.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T, ErrorModel>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ErrorModel>>,
    {
        let limit = self.timeout;
        let attempt = || {
            let future = operation();
            async move {
                match limit {
                    Some(limit) => with_timeout(limit, future).await,
                    None => future.await,
                }
            }
        };

        let retried = async {
            match &self.retry {
                Some(policy) => policy.execute(attempt).await,
                None => {
                    let mut attempt = attempt;
                    attempt().await
                }
            }
        };

        let guarded = async {
            if self.circuit_breaker {
                self.resilience
                    .breakers
                    .call(&self.resource, || retried)
                    .await
            } else {
                retried.await
            }
        };

        if self.bulkhead {
            self.resilience
                .bulkheads
                .call(&self.resource, || guarded)
                .await
        } else {
            guarded.await
        }
    }
}
