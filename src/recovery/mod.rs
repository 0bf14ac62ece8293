//! Recovery strategies around fallible async operations.
//!
//! Every strategy takes an operation returning `Result<T, ErrorModel>` and
//! returns the same shape, so strategies compose by nesting. Delays and
//! deadlines suspend the calling task rather than blocking a thread.

pub mod batch;
pub mod bulkhead;
pub mod circuit_breaker;
pub mod fallback;
pub mod pipeline;
pub mod retry;
pub mod timeout;

pub use batch::{run_all, settle_all, BatchReport};
pub use bulkhead::{Bulkhead, BulkheadConfig, BulkheadRegistry};
pub use circuit_breaker::{
    CircuitBreakerConfig, CircuitBreakerRegistry, CircuitBreakerState, CircuitState,
};
pub use fallback::{with_fallback, with_fallback_else};
pub use pipeline::{Pipeline, Resilience};
pub use retry::{with_retry, RetryPolicy};
pub use timeout::with_timeout;
