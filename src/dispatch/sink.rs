//! Durable log sinks.

use crate::context::LogContext;
use crate::error::ErrorModel;

/// Receives structured log records from the dispatcher.
pub trait LogSink: Send + Sync {
    fn error(&self, error: &ErrorModel, context: &LogContext);
    fn warn(&self, message: &str, context: &LogContext);
    fn info(&self, message: &str, context: &LogContext);
}

/// Writes records as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn error(&self, error: &ErrorModel, context: &LogContext) {
        let metadata = serde_json::to_string(&context.metadata).unwrap_or_default();
        let cause = error.cause().map(|cause| cause.to_string());
        tracing::error!(
            code = %error.code(),
            kind = %error.kind(),
            retryable = error.is_retryable(),
            component = %context.component,
            operation = %context.operation,
            user_id = context.user_id.as_deref(),
            resource_id = context.resource_id.as_deref(),
            duration_ms = context.duration_ms,
            timestamp = %error.timestamp().to_rfc3339(),
            cause = cause.as_deref(),
            metadata = %metadata,
            "{}",
            error.message()
        );
    }

    fn warn(&self, message: &str, context: &LogContext) {
        tracing::warn!(context = %context.label(), "{message}");
    }

    fn info(&self, message: &str, context: &LogContext) {
        tracing::info!(context = %context.label(), "{message}");
    }
}
