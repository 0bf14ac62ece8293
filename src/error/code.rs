//! Closed error-code taxonomy.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Failure family an [`ErrorCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    Storage,
    Validation,
    Network,
    Subscription,
    Resilience,
    Batch,
    Unknown,
}

/// Machine-readable error code.
///
/// Every code has exactly one default `retryable` flag and one default
/// user-facing message. The mapper may override `retryable` when the raw
/// failure carries more specific evidence.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    AuthInvalidCredentials,
    AuthUserNotFound,
    AuthUserDisabled,
    AuthEmailInUse,
    AuthInvalidEmail,
    AuthWeakPassword,
    AuthTooManyRequests,
    AuthRequiresRecentLogin,
    AuthSessionExpired,
    AuthPermissionDenied,

    StorageNotFound,
    StorageAlreadyExists,
    StoragePermissionDenied,
    StorageUnavailable,
    StorageDeadlineExceeded,
    StorageQuotaExceeded,
    StorageAborted,
    StorageInvalidArgument,
    StorageFailedPrecondition,
    StorageDataLoss,

    ValidationFailed,

    NetworkTimeout,
    NetworkUnavailable,
    NetworkRateLimited,
    NetworkServerError,
    NetworkBadRequest,
    NetworkBadResponse,

    SubscriptionInvalid,

    CircuitOpen,

    BatchPartialFailure,

    Unknown,
}

impl ErrorCode {
    /// The failure family of this code.
    pub const fn kind(self) -> ErrorKind {
        use ErrorCode::*;
        match self {
            AuthInvalidCredentials | AuthUserNotFound | AuthUserDisabled | AuthEmailInUse
            | AuthInvalidEmail | AuthWeakPassword | AuthTooManyRequests
            | AuthRequiresRecentLogin | AuthSessionExpired | AuthPermissionDenied => {
                ErrorKind::Authentication
            }
            StorageNotFound | StorageAlreadyExists | StoragePermissionDenied
            | StorageUnavailable | StorageDeadlineExceeded | StorageQuotaExceeded
            | StorageAborted | StorageInvalidArgument | StorageFailedPrecondition
            | StorageDataLoss => ErrorKind::Storage,
            ValidationFailed => ErrorKind::Validation,
            NetworkTimeout | NetworkUnavailable | NetworkRateLimited | NetworkServerError
            | NetworkBadRequest | NetworkBadResponse => ErrorKind::Network,
            SubscriptionInvalid => ErrorKind::Subscription,
            CircuitOpen => ErrorKind::Resilience,
            BatchPartialFailure => ErrorKind::Batch,
            Unknown => ErrorKind::Unknown,
        }
    }

    /// Whether a mechanical retry is safe and potentially useful by default.
    pub const fn default_retryable(self) -> bool {
        use ErrorCode::*;
        matches!(
            self,
            StorageUnavailable
                | StorageDeadlineExceeded
                | StorageAborted
                | NetworkTimeout
                | NetworkUnavailable
                | NetworkRateLimited
                | NetworkServerError
        )
    }

    /// Default end-user message. Never contains identifiers.
    pub const fn default_user_message(self) -> &'static str {
        use ErrorCode::*;
        match self {
            AuthInvalidCredentials => "The email or password you entered is incorrect.",
            AuthUserNotFound => "We couldn't find an account with those details.",
            AuthUserDisabled => "This account has been disabled. Please contact support.",
            AuthEmailInUse => "An account with this email already exists.",
            AuthInvalidEmail => "Please enter a valid email address.",
            AuthWeakPassword => "Please choose a stronger password.",
            AuthTooManyRequests => "Too many attempts. Please wait a moment and try again.",
            AuthRequiresRecentLogin => "Please sign in again to continue.",
            AuthSessionExpired => "Your session has expired. Please sign in again.",
            AuthPermissionDenied => "You don't have permission to do that.",
            StorageNotFound => "The requested item could not be found.",
            StorageAlreadyExists => "This item already exists.",
            StoragePermissionDenied => "You don't have access to this data.",
            StorageUnavailable => "The service is temporarily unavailable. Please try again.",
            StorageDeadlineExceeded => "The request took too long. Please try again.",
            StorageQuotaExceeded => "Storage limit reached. Please free up space and try again.",
            StorageAborted => "Your change could not be saved. Please try again.",
            StorageInvalidArgument => "Some of the information provided is invalid.",
            StorageFailedPrecondition => "This action can't be completed right now.",
            StorageDataLoss => "Something went wrong while reading your data.",
            ValidationFailed => "Please check the highlighted fields.",
            NetworkTimeout => "The connection timed out. Please try again.",
            NetworkUnavailable => "You appear to be offline. Check your connection and try again.",
            NetworkRateLimited => "We're receiving too many requests. Please try again shortly.",
            NetworkServerError => "The server ran into a problem. Please try again.",
            NetworkBadRequest => "The request could not be completed.",
            NetworkBadResponse => "We received an unexpected response from the server.",
            SubscriptionInvalid => "Your plan is no longer active. Please review your subscription.",
            CircuitOpen => "This feature is temporarily unavailable. Please try again later.",
            BatchPartialFailure => "Some changes could not be completed.",
            Unknown => "Something went wrong. Please try again.",
        }
    }
}
