//! Storage provider error codes (gRPC-style status names).

use super::MappingRule;
use crate::error::{ErrorCode, ErrorModel};

const STORAGE_RULES: &[(&str, MappingRule)] = &[
    ("not-found", MappingRule::of(ErrorCode::StorageNotFound)),
    ("already-exists", MappingRule::of(ErrorCode::StorageAlreadyExists)),
    ("permission-denied", MappingRule::of(ErrorCode::StoragePermissionDenied)),
    ("unauthenticated", MappingRule::of(ErrorCode::AuthSessionExpired)),
    ("unavailable", MappingRule::of(ErrorCode::StorageUnavailable)),
    ("deadline-exceeded", MappingRule::of(ErrorCode::StorageDeadlineExceeded)),
    ("resource-exhausted", MappingRule::of(ErrorCode::StorageQuotaExceeded)),
    ("aborted", MappingRule::of(ErrorCode::StorageAborted)),
    // Cancelled by the client: retrying would undo the user's intent.
    ("cancelled", MappingRule::of(ErrorCode::StorageAborted).retryable(false)),
    ("invalid-argument", MappingRule::of(ErrorCode::StorageInvalidArgument)),
    ("out-of-range", MappingRule::of(ErrorCode::StorageInvalidArgument)),
    ("failed-precondition", MappingRule::of(ErrorCode::StorageFailedPrecondition)),
    ("data-loss", MappingRule::of(ErrorCode::StorageDataLoss)),
];

pub fn normalize_code(code: &str) -> String {
    let code = code.trim().to_ascii_lowercase().replace('_', "-");
    ["firestore/", "storage/"]
        .iter()
        .find_map(|prefix| code.strip_prefix(prefix))
        .map(str::to_string)
        .unwrap_or(code)
}

pub fn lookup(code: &str) -> Option<MappingRule> {
    let code = normalize_code(code);
    STORAGE_RULES
        .iter()
        .find(|(key, _)| *key == code)
        .map(|(_, rule)| *rule)
}

pub(crate) fn map_code(code: &str, message: Option<String>) -> ErrorModel {
    let rule = lookup(code).unwrap_or(MappingRule::of(ErrorCode::Unknown));
    let message = message.unwrap_or_else(|| format!("storage failed with code '{}'", code.trim()));
    rule.build(message)
}
