//! Concurrency bulkheads.
//!
//! A bulkhead bounds how many calls to one resource run at once. Calls over
//! the limit wait in FIFO order and run the real operation once admitted;
//! they are never rejected and never handed a placeholder result.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bon::Builder;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::context::LogContext;
use crate::error::{ErrorCode, ErrorModel};

#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkheadConfig {
    /// Calls allowed to run concurrently per resource.
    #[builder(default = 4)]
    pub max_concurrency: usize,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self { max_concurrency: 4 }
    }
}

/// Concurrency limiter for one resource. Clones share the same limit.
#[derive(Debug, Clone)]
pub struct Bulkhead {
    name: Arc<str>,
    max_concurrency: usize,
    // tokio's semaphore hands out permits in request order.
    permits: Arc<Semaphore>,
    queued: Arc<AtomicUsize>,
}

impl Bulkhead {
    pub fn new(name: impl Into<String>, max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            name: Arc::from(name.into()),
            max_concurrency,
            permits: Arc::new(Semaphore::new(max_concurrency)),
            queued: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Calls currently executing.
    pub fn in_flight(&self) -> usize {
        self.max_concurrency - self.permits.available_permits()
    }

    /// Calls waiting for a slot.
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    /// Wait for a slot, then run `operation` to completion.
    pub async fn call<T, F, Fut>(&self, operation: F) -> Result<T, ErrorModel>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ErrorModel>>,
    {
        let _permit = {
            let _waiting = QueuedGuard::enter(&self.queued);
            if self.permits.available_permits() == 0 {
                tracing::debug!(
                    resource = %self.name,
                    in_flight = self.in_flight(),
                    queued = self.queued(),
                    "Bulkhead full, queueing call"
                );
            }
            self.permits.acquire().await.map_err(|_| {
                ErrorModel::new(
                    ErrorCode::Unknown,
                    format!("bulkhead '{}' was closed", self.name),
                )
                .with_context(
                    LogContext::from_operation("bulkhead", "acquire").with_resource_id(&*self.name),
                )
            })?
        };
        operation().await
    }
}

struct QueuedGuard<'a>(&'a AtomicUsize);

impl<'a> QueuedGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for QueuedGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Bulkheads keyed by resource, created on first use.
#[derive(Debug, Clone, Default)]
pub struct BulkheadRegistry {
    config: BulkheadConfig,
    bulkheads: Arc<Mutex<HashMap<String, Bulkhead>>>,
}

impl BulkheadRegistry {
    pub fn new(config: BulkheadConfig) -> Self {
        Self {
            config,
            bulkheads: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &BulkheadConfig {
        &self.config
    }

    /// The bulkhead for `key`.
    pub fn get(&self, key: &str) -> Bulkhead {
        self.lock()
            .entry(key.to_string())
            .or_insert_with(|| Bulkhead::new(key, self.config.max_concurrency))
            .clone()
    }

    pub async fn call<T, F, Fut>(&self, key: &str, operation: F) -> Result<T, ErrorModel>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ErrorModel>>,
    {
        self.get(key).call(operation).await
    }

    /// Drop every bulkhead. Calls already holding a clone keep their limit.
    pub fn reset(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Bulkhead>> {
        self.bulkheads.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
