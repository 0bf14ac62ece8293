//! The uniform typed error model.

pub mod code;

pub use code::{ErrorCode, ErrorKind};

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::LogContext;

/// Opaque originating failure, kept only for stack-trace preservation.
pub type Cause = Arc<dyn StdError + Send + Sync + 'static>;

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ErrorModel>;

/// Immutable value describing a failure.
///
/// Constructed once by the mapper (or directly by a caller) and then only
/// read. The `with_*` methods consume the value and are meant for the
/// construction phase.
#[derive(Clone, Error)]
#[error("{code}: {message}")]
pub struct ErrorModel {
    code: ErrorCode,
    message: String,
    user_message: String,
    retryable: bool,
    context: Option<LogContext>,
    #[source]
    cause: Option<Cause>,
    timestamp: DateTime<Utc>,
    detail: ErrorDetail,
}

/// Kind-specific payload.
#[derive(Debug, Clone, Default)]
pub enum ErrorDetail {
    #[default]
    None,
    Validation(FieldErrors),
    Aggregate(AggregateFailure),
}

impl ErrorModel {
    /// Create an error using the code's default user message and retryability.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            user_message: code.default_user_message().to_string(),
            retryable: code.default_retryable(),
            context: None,
            cause: None,
            timestamp: Utc::now(),
            detail: ErrorDetail::None,
        }
    }

    /// A validation failure carrying per-field messages.
    pub fn validation(field_errors: FieldErrors) -> Self {
        let message = format!("validation failed for {} field(s)", field_errors.len());
        Self::new(ErrorCode::ValidationFailed, message).with_field_errors(field_errors)
    }

    /// A batch failure. Retryable only if every failed entry is retryable.
    pub fn aggregate(aggregate: AggregateFailure) -> Self {
        let message = format!(
            "{} of {} operations failed",
            aggregate.failed,
            aggregate.failed + aggregate.succeeded
        );
        let retryable = !aggregate.failures.is_empty()
            && aggregate.failures.iter().all(|entry| entry.error.retryable);
        Self::new(ErrorCode::BatchPartialFailure, message)
            .with_retryable(retryable)
            .with_detail(ErrorDetail::Aggregate(aggregate))
    }

    /// Replace the user message. Blank messages keep the current one.
    pub fn with_user_message(mut self, user_message: impl Into<String>) -> Self {
        let user_message = user_message.into();
        if !user_message.trim().is_empty() {
            self.user_message = user_message;
        }
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn with_context(mut self, context: LogContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_cause(mut self, cause: impl StdError + Send + Sync + 'static) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub fn with_shared_cause(mut self, cause: Cause) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn with_field_errors(self, field_errors: FieldErrors) -> Self {
        self.with_detail(ErrorDetail::Validation(field_errors))
    }

    fn with_detail(mut self, detail: ErrorDetail) -> Self {
        self.detail = detail;
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }

    /// Developer-facing description.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// End-user-facing description. Always non-empty.
    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    pub fn context(&self) -> Option<&LogContext> {
        self.context.as_ref()
    }

    pub fn cause(&self) -> Option<&Cause> {
        self.cause.as_ref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn detail(&self) -> &ErrorDetail {
        &self.detail
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match &self.detail {
            ErrorDetail::Validation(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn aggregate_failure(&self) -> Option<&AggregateFailure> {
        match &self.detail {
            ErrorDetail::Aggregate(aggregate) => Some(aggregate),
            _ => None,
        }
    }
}

impl fmt::Debug for ErrorModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorModel")
            .field("code", &self.code)
            .field("message", &self.message)
            .field("user_message", &self.user_message)
            .field("retryable", &self.retryable)
            .field("context", &self.context)
            .field("cause", &self.cause.as_ref().map(|c| c.to_string()))
            .field("timestamp", &self.timestamp)
            .field("detail", &self.detail)
            .finish()
    }
}

/// Ordered mapping of field path to message.
///
/// Insertion order is preserved; the first message recorded for a field wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldErrors {
    entries: Vec<(String, String)>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message for `field`. Returns `false` if the field already had one.
    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) -> bool {
        let field = field.into();
        if self.entries.iter().any(|(existing, _)| *existing == field) {
            return false;
        }
        self.entries.push((field, message.into()));
        true
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, message)| message.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(field, message)| (field.as_str(), message.as_str()))
    }

    pub fn fields(&self) -> Vec<&str> {
        self.entries.iter().map(|(field, _)| field.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldErrors {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut errors = Self::new();
        for (field, message) in iter {
            errors.insert(field, message);
        }
        errors
    }
}

/// Outcome of a batch in which at least one operation failed.
#[derive(Debug, Clone, Default)]
pub struct AggregateFailure {
    pub failures: Vec<AggregateEntry>,
    pub succeeded: usize,
    pub failed: usize,
}

/// One failed operation inside a batch.
#[derive(Debug, Clone)]
pub struct AggregateEntry {
    pub operation_label: String,
    pub error: ErrorModel,
}

impl AggregateFailure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub fn push(&mut self, operation_label: impl Into<String>, error: ErrorModel) {
        self.failures.push(AggregateEntry {
            operation_label: operation_label.into(),
            error,
        });
        self.failed += 1;
    }
}
