//! Conversion of raw and foreign failures into [`ErrorModel`].
//!
//! [`map`] is total: every input yields a valid model, falling back to
//! `UNKNOWN` (not retryable) when no rule matches. Per-origin rules live in
//! lookup tables keyed by the raw discriminator.

pub mod auth;
pub mod network;
pub mod storage;
pub mod validation;

pub use network::{NetworkFailure, NetworkFailureKind};
pub use validation::{Rule, Rules, ValidationIssue};

use std::any::Any;
use std::error::Error as StdError;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use crate::context::LogContext;
use crate::error::{Cause, ErrorCode, ErrorModel};

/// A lookup-table entry: the code, user message and retryability a raw
/// discriminator maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingRule {
    pub code: ErrorCode,
    pub user_message: &'static str,
    pub retryable: bool,
}

impl MappingRule {
    /// A rule using the code's defaults.
    pub const fn of(code: ErrorCode) -> Self {
        Self {
            code,
            user_message: code.default_user_message(),
            retryable: code.default_retryable(),
        }
    }

    pub const fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub(crate) fn build(self, message: impl Into<String>) -> ErrorModel {
        ErrorModel::new(self.code, message)
            .with_user_message(self.user_message)
            .with_retryable(self.retryable)
    }
}

/// Any failure the mapper accepts.
#[derive(Debug, Clone)]
pub enum RawFailure {
    /// No error value at all.
    Absent,
    /// Already typed; passed through.
    Model(ErrorModel),
    /// Authentication provider error code, e.g. `auth/wrong-password`.
    Auth {
        code: String,
        message: Option<String>,
    },
    /// Storage provider error code, e.g. `permission-denied`.
    Storage {
        code: String,
        message: Option<String>,
    },
    Network(NetworkFailure),
    /// Per-field issues reported by a validator.
    Validation(Vec<ValidationIssue>),
    /// An arbitrary error value, inspected by downcasting.
    Foreign(Cause),
    Message(String),
    Panic(String),
}

impl RawFailure {
    pub fn auth(code: impl Into<String>) -> Self {
        Self::Auth {
            code: code.into(),
            message: None,
        }
    }

    pub fn storage(code: impl Into<String>) -> Self {
        Self::Storage {
            code: code.into(),
            message: None,
        }
    }

    pub fn foreign(error: impl StdError + Send + Sync + 'static) -> Self {
        Self::Foreign(Arc::new(error))
    }

    /// Convert a `catch_unwind` payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panic(message)
    }
}

impl From<ErrorModel> for RawFailure {
    fn from(error: ErrorModel) -> Self {
        Self::Model(error)
    }
}

impl From<NetworkFailure> for RawFailure {
    fn from(failure: NetworkFailure) -> Self {
        Self::Network(failure)
    }
}

impl From<Vec<ValidationIssue>> for RawFailure {
    fn from(issues: Vec<ValidationIssue>) -> Self {
        Self::Validation(issues)
    }
}

impl From<std::io::Error> for RawFailure {
    fn from(error: std::io::Error) -> Self {
        Self::foreign(error)
    }
}

impl From<serde_json::Error> for RawFailure {
    fn from(error: serde_json::Error) -> Self {
        Self::foreign(error)
    }
}

impl From<reqwest::Error> for RawFailure {
    fn from(error: reqwest::Error) -> Self {
        Self::foreign(error)
    }
}

impl From<tokio::time::error::Elapsed> for RawFailure {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        Self::foreign(error)
    }
}

impl From<String> for RawFailure {
    fn from(message: String) -> Self {
        Self::Message(message)
    }
}

impl From<&str> for RawFailure {
    fn from(message: &str) -> Self {
        Self::Message(message.to_string())
    }
}

impl<T: Into<RawFailure>> From<Option<T>> for RawFailure {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Absent, Into::into)
    }
}

/// Map any failure into an [`ErrorModel`] carrying `context`.
///
/// An already-typed model keeps its own context, with missing fields filled
/// from `context`.
pub fn map(raw: impl Into<RawFailure>, context: &LogContext) -> ErrorModel {
    let model = match raw.into() {
        RawFailure::Model(model) => return passthrough(model, context),
        RawFailure::Absent => {
            ErrorModel::new(ErrorCode::Unknown, "failure reported without an error value")
        }
        RawFailure::Auth { code, message } => auth::map_code(&code, message),
        RawFailure::Storage { code, message } => storage::map_code(&code, message),
        RawFailure::Network(failure) => network::map_failure(&failure),
        RawFailure::Validation(issues) => validation::map_issues(issues),
        RawFailure::Foreign(cause) => match find_model(&cause) {
            Some(model) => return passthrough(model, context),
            None => map_foreign(cause),
        },
        RawFailure::Message(message) => ErrorModel::new(ErrorCode::Unknown, message),
        RawFailure::Panic(message) => {
            ErrorModel::new(ErrorCode::Unknown, format!("operation panicked: {message}"))
        }
    };
    model.with_context(context.clone())
}

fn passthrough(model: ErrorModel, context: &LogContext) -> ErrorModel {
    let merged = match model.context() {
        Some(existing) => existing.merged_with(context),
        None => context.clone(),
    };
    model.with_context(merged)
}

/// Next link of an error chain. `io::Error` does not report its custom
/// payload through `source()`, so it is unwrapped explicitly.
fn next_in_chain<'a>(error: &'a (dyn StdError + 'static)) -> Option<&'a (dyn StdError + 'static)> {
    if let Some(inner) = error
        .downcast_ref::<std::io::Error>()
        .and_then(std::io::Error::get_ref)
    {
        return Some(inner as &(dyn StdError + 'static));
    }
    error.source()
}

/// A typed model anywhere in the chain wins over foreign evidence.
fn find_model(cause: &Cause) -> Option<ErrorModel> {
    let root: &(dyn StdError + 'static) = &**cause;
    let mut current = Some(root);
    while let Some(error) = current {
        if let Some(model) = error.downcast_ref::<ErrorModel>() {
            return Some(model.clone());
        }
        current = next_in_chain(error);
    }
    None
}

fn map_foreign(cause: Cause) -> ErrorModel {
    let root: &(dyn StdError + 'static) = &*cause;
    let mut current = Some(root);
    while let Some(error) = current {
        if let Some(mapped) = map_known_error(error) {
            return mapped.with_shared_cause(cause.clone());
        }
        current = next_in_chain(error);
    }
    ErrorModel::new(ErrorCode::Unknown, cause.to_string()).with_shared_cause(cause)
}

fn map_known_error(error: &(dyn StdError + 'static)) -> Option<ErrorModel> {
    if let Some(io) = error.downcast_ref::<std::io::Error>() {
        return Some(map_io(io));
    }
    if let Some(http) = error.downcast_ref::<reqwest::Error>() {
        return Some(network::map_failure(&NetworkFailure::from_reqwest(http)));
    }
    if let Some(json) = error.downcast_ref::<serde_json::Error>() {
        return Some(
            MappingRule::of(ErrorCode::NetworkBadResponse).build(format!("malformed payload: {json}")),
        );
    }
    if error.is::<tokio::time::error::Elapsed>() {
        return Some(MappingRule::of(ErrorCode::NetworkTimeout).build(error.to_string()));
    }
    None
}

fn map_io(error: &std::io::Error) -> ErrorModel {
    use std::io::ErrorKind as Io;

    let rule = match error.kind() {
        Io::TimedOut | Io::WouldBlock => MappingRule::of(ErrorCode::NetworkTimeout),
        Io::ConnectionRefused
        | Io::ConnectionReset
        | Io::ConnectionAborted
        | Io::NotConnected
        | Io::BrokenPipe
        | Io::AddrNotAvailable => MappingRule::of(ErrorCode::NetworkUnavailable),
        Io::Interrupted => MappingRule::of(ErrorCode::StorageAborted),
        Io::NotFound => MappingRule::of(ErrorCode::StorageNotFound),
        Io::PermissionDenied => MappingRule::of(ErrorCode::StoragePermissionDenied),
        Io::AlreadyExists => MappingRule::of(ErrorCode::StorageAlreadyExists),
        Io::InvalidInput | Io::InvalidData => MappingRule::of(ErrorCode::StorageInvalidArgument),
        Io::UnexpectedEof => MappingRule::of(ErrorCode::StorageDataLoss),
        _ => MappingRule::of(ErrorCode::Unknown),
    };
    rule.build(error.to_string())
}

/// Await `operation` and map its error, whatever its type, into an [`ErrorModel`].
pub async fn normalize<T, E, Fut>(context: &LogContext, operation: Fut) -> crate::Result<T>
where
    Fut: Future<Output = Result<T, E>>,
    E: Into<RawFailure>,
{
    operation.await.map_err(|error| map(error, context))
}

/// Await `operation`, converting a panic into an `UNKNOWN` error.
pub async fn catch_panics<T, Fut>(context: &LogContext, operation: Fut) -> crate::Result<T>
where
    Fut: Future<Output = crate::Result<T>>,
{
    match AssertUnwindSafe(operation).catch_unwind().await {
        Ok(result) => result.map_err(|error| map(error, context)),
        Err(payload) => Err(map(RawFailure::from_panic(payload), context)),
    }
}
