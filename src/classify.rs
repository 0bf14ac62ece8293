//! Severity classification of error models.

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::error::{ErrorCode, ErrorModel};

/// How serious a failure is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    Critical,
    Recoverable,
    NonCritical,
}

/// Derived presentation and recovery category. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCategory {
    pub severity: Severity,
    pub can_recover: bool,
    pub should_show_full_screen: bool,
    pub requires_user_action: bool,
}

impl ErrorCategory {
    pub const CRITICAL: Self = Self {
        severity: Severity::Critical,
        can_recover: false,
        should_show_full_screen: true,
        requires_user_action: true,
    };

    pub const RECOVERABLE: Self = Self {
        severity: Severity::Recoverable,
        can_recover: true,
        should_show_full_screen: false,
        requires_user_action: false,
    };

    pub const NON_CRITICAL: Self = Self {
        severity: Severity::NonCritical,
        can_recover: false,
        should_show_full_screen: false,
        requires_user_action: false,
    };
}

/// Codes that always demand a full-screen, action-required presentation.
pub const CRITICAL_CODES: &[ErrorCode] = &[
    ErrorCode::AuthSessionExpired,
    ErrorCode::AuthPermissionDenied,
    ErrorCode::StoragePermissionDenied,
    ErrorCode::SubscriptionInvalid,
];

pub fn is_critical(code: ErrorCode) -> bool {
    CRITICAL_CODES.contains(&code)
}

/// Classify an error.
///
/// The critical set is checked before retryability, so a code that is both
/// critical and retryable is always reported as critical.
pub fn classify(error: &ErrorModel) -> ErrorCategory {
    if is_critical(error.code()) {
        ErrorCategory::CRITICAL
    } else if error.is_retryable() {
        ErrorCategory::RECOVERABLE
    } else {
        ErrorCategory::NON_CRITICAL
    }
}

impl ErrorModel {
    pub fn category(&self) -> ErrorCategory {
        classify(self)
    }
}
