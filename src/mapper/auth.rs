//! Authentication provider error codes.

use super::MappingRule;
use crate::error::{ErrorCode, ErrorModel};

const AUTH_RULES: &[(&str, MappingRule)] = &[
    ("invalid-credential", MappingRule::of(ErrorCode::AuthInvalidCredentials)),
    ("invalid-login-credentials", MappingRule::of(ErrorCode::AuthInvalidCredentials)),
    ("wrong-password", MappingRule::of(ErrorCode::AuthInvalidCredentials)),
    ("user-not-found", MappingRule::of(ErrorCode::AuthUserNotFound)),
    ("user-disabled", MappingRule::of(ErrorCode::AuthUserDisabled)),
    ("email-already-in-use", MappingRule::of(ErrorCode::AuthEmailInUse)),
    ("invalid-email", MappingRule::of(ErrorCode::AuthInvalidEmail)),
    ("weak-password", MappingRule::of(ErrorCode::AuthWeakPassword)),
    ("too-many-requests", MappingRule::of(ErrorCode::AuthTooManyRequests)),
    ("requires-recent-login", MappingRule::of(ErrorCode::AuthRequiresRecentLogin)),
    ("user-token-expired", MappingRule::of(ErrorCode::AuthSessionExpired)),
    ("id-token-expired", MappingRule::of(ErrorCode::AuthSessionExpired)),
    ("invalid-user-token", MappingRule::of(ErrorCode::AuthSessionExpired)),
    ("session-expired", MappingRule::of(ErrorCode::AuthSessionExpired)),
    ("permission-denied", MappingRule::of(ErrorCode::AuthPermissionDenied)),
    ("operation-not-allowed", MappingRule::of(ErrorCode::AuthPermissionDenied)),
    ("unauthorized-domain", MappingRule::of(ErrorCode::AuthPermissionDenied)),
    ("network-request-failed", MappingRule::of(ErrorCode::NetworkUnavailable)),
    ("timeout", MappingRule::of(ErrorCode::NetworkTimeout)),
];

/// Canonical form of a provider code: lowercase, `-` separated, no
/// `auth/` prefix.
pub fn normalize_code(code: &str) -> String {
    let code = code.trim().to_ascii_lowercase().replace('_', "-");
    code.strip_prefix("auth/").map(str::to_string).unwrap_or(code)
}

pub fn lookup(code: &str) -> Option<MappingRule> {
    let code = normalize_code(code);
    AUTH_RULES
        .iter()
        .find(|(key, _)| *key == code)
        .map(|(_, rule)| *rule)
}

pub(crate) fn map_code(code: &str, message: Option<String>) -> ErrorModel {
    let rule = lookup(code).unwrap_or(MappingRule::of(ErrorCode::Unknown));
    let message =
        message.unwrap_or_else(|| format!("authentication failed with code '{}'", code.trim()));
    rule.build(message)
}
