//! Convenience re-exports for common use.

pub use crate::classify::{classify, ErrorCategory, Severity};
pub use crate::config::FaultlineConfig;
pub use crate::context::{ActionTrail, ContextCapture, LogContext};
pub use crate::dispatch::{
    ContextInput, DispatchOutcome, Dispatcher, LogSink, Notification, NotificationSurface,
};
pub use crate::error::{ErrorCode, ErrorKind, ErrorModel, FieldErrors, Result};
pub use crate::mapper::{map, RawFailure};
pub use crate::recovery::{
    with_fallback, with_retry, with_timeout, Pipeline, Resilience, RetryPolicy,
};
