//! Network-layer failures and HTTP status evidence.

use serde::{Deserialize, Serialize};

use super::MappingRule;
use crate::error::{ErrorCode, ErrorModel};

/// Transport-level cause of a network failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkFailureKind {
    Timeout,
    Connect,
    Offline,
    Decode,
    Request,
    /// The transport succeeded; only the status code is known.
    Status,
    Other,
}

/// A network failure in transport-neutral form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkFailure {
    pub kind: NetworkFailureKind,
    pub status: Option<u16>,
    pub message: String,
}

impl NetworkFailure {
    pub fn new(kind: NetworkFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: NetworkFailureKind::Status,
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            NetworkFailureKind::Timeout
        } else if error.is_connect() {
            NetworkFailureKind::Connect
        } else if error.is_decode() {
            NetworkFailureKind::Decode
        } else if error.is_builder() {
            NetworkFailureKind::Request
        } else if error.status().is_some() {
            NetworkFailureKind::Status
        } else {
            NetworkFailureKind::Other
        };
        Self {
            kind,
            status: error.status().map(|status| status.as_u16()),
            message: error.to_string(),
        }
    }
}

/// Rule for an HTTP status code.
pub fn status_rule(status: u16) -> MappingRule {
    match status {
        401 => MappingRule::of(ErrorCode::AuthSessionExpired),
        403 => MappingRule::of(ErrorCode::AuthPermissionDenied),
        404 => MappingRule::of(ErrorCode::StorageNotFound),
        408 | 504 => MappingRule::of(ErrorCode::NetworkTimeout),
        409 => MappingRule::of(ErrorCode::StorageAlreadyExists),
        429 => MappingRule::of(ErrorCode::NetworkRateLimited),
        // The server will never support this request; repeating it is pointless.
        501 | 505 => MappingRule::of(ErrorCode::NetworkServerError).retryable(false),
        500..=599 => MappingRule::of(ErrorCode::NetworkServerError),
        400..=499 => MappingRule::of(ErrorCode::NetworkBadRequest),
        _ => MappingRule::of(ErrorCode::NetworkBadResponse),
    }
}

pub fn kind_rule(kind: NetworkFailureKind) -> MappingRule {
    match kind {
        NetworkFailureKind::Timeout => MappingRule::of(ErrorCode::NetworkTimeout),
        NetworkFailureKind::Connect
        | NetworkFailureKind::Offline
        | NetworkFailureKind::Other => MappingRule::of(ErrorCode::NetworkUnavailable),
        NetworkFailureKind::Decode => MappingRule::of(ErrorCode::NetworkBadResponse),
        NetworkFailureKind::Request => MappingRule::of(ErrorCode::NetworkBadRequest),
        NetworkFailureKind::Status => MappingRule::of(ErrorCode::NetworkBadResponse),
    }
}

pub(crate) fn map_failure(failure: &NetworkFailure) -> ErrorModel {
    let rule = match (failure.kind, failure.status) {
        (NetworkFailureKind::Timeout | NetworkFailureKind::Connect, _) => kind_rule(failure.kind),
        (_, Some(status)) => status_rule(status),
        (kind, None) => kind_rule(kind),
    };
    let message = match failure.status {
        Some(status) => format!("HTTP {status}: {}", failure.message),
        None => failure.message.clone(),
    };
    rule.build(message)
}
