//! Diagnostic context attached to failures.
//!
//! [`LogContext`] is built by accumulation: every `with_*` call returns a new
//! value, so a context shared across call boundaries is never mutated in
//! place.

pub mod capture;

pub use capture::{ActionTrail, ContextCapture, EnvRuntimeFacts, RuntimeFacts};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Structured metadata attached to a failure for logging and triage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogContext {
    pub component: String,
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_context: Option<String>,
}

impl LogContext {
    pub fn from_component(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            ..Default::default()
        }
    }

    pub fn from_operation(component: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            operation: operation.into(),
            ..Default::default()
        }
    }

    /// Wrap a free-form context string.
    ///
    /// A string shaped like `component.operation` (or `component:operation`)
    /// is split into the two fields; anything else becomes the component.
    /// The original text is always preserved in `raw_context`.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let trimmed = raw.trim();
        let (component, operation) = match trimmed.split_once(['.', ':']) {
            Some((component, operation))
                if !component.is_empty()
                    && !operation.is_empty()
                    && !component.contains(char::is_whitespace)
                    && !operation.contains(char::is_whitespace) =>
            {
                (component.to_string(), operation.to_string())
            }
            _ => (trimmed.to_string(), String::new()),
        };
        Self {
            component,
            operation,
            raw_context: Some(raw),
            ..Default::default()
        }
    }

    pub fn with_operation(&self, operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            ..self.clone()
        }
    }

    pub fn with_user_id(&self, user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..self.clone()
        }
    }

    pub fn with_session_id(&self, session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..self.clone()
        }
    }

    pub fn with_resource_id(&self, resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: Some(resource_id.into()),
            ..self.clone()
        }
    }

    pub fn with_duration_ms(&self, duration_ms: u64) -> Self {
        Self {
            duration_ms: Some(duration_ms),
            ..self.clone()
        }
    }

    pub fn with_metadata(&self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        let mut next = self.clone();
        next.metadata.insert(key.into(), value.into());
        next
    }

    /// Fill in fields missing here from `other`. Values already set win.
    pub fn merged_with(&self, other: &LogContext) -> Self {
        let mut next = self.clone();
        if next.component.is_empty() {
            next.component = other.component.clone();
        }
        if next.operation.is_empty() {
            next.operation = other.operation.clone();
        }
        next.user_id = next.user_id.or_else(|| other.user_id.clone());
        next.session_id = next.session_id.or_else(|| other.session_id.clone());
        next.resource_id = next.resource_id.or_else(|| other.resource_id.clone());
        next.duration_ms = next.duration_ms.or(other.duration_ms);
        next.raw_context = next.raw_context.or_else(|| other.raw_context.clone());
        for (key, value) in &other.metadata {
            next.metadata
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        next
    }

    /// Dotted `component.operation` label used in log lines.
    pub fn label(&self) -> String {
        match (self.component.is_empty(), self.operation.is_empty()) {
            (false, false) => format!("{}.{}", self.component, self.operation),
            (false, true) => self.component.clone(),
            (true, false) => self.operation.clone(),
            (true, true) => "unknown".to_string(),
        }
    }
}

impl From<&str> for LogContext {
    fn from(raw: &str) -> Self {
        Self::from_raw(raw)
    }
}

impl From<String> for LogContext {
    fn from(raw: String) -> Self {
        Self::from_raw(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builders_leave_the_original_untouched() {
        let base = LogContext::from_operation("lists", "save");
        let with_user = base.with_user_id("u-1").with_metadata("items", 3);

        assert_eq!(base.user_id, None);
        assert!(base.metadata.is_empty());
        assert_eq!(with_user.user_id.as_deref(), Some("u-1"));
        assert_eq!(with_user.metadata["items"], serde_json::json!(3));
    }

    #[test]
    fn raw_strings_split_into_component_and_operation() {
        let ctx = LogContext::from_raw("profile.update");
        assert_eq!(ctx.component, "profile");
        assert_eq!(ctx.operation, "update");
        assert_eq!(ctx.raw_context.as_deref(), Some("profile.update"));

        let free_form = LogContext::from_raw("saving the list failed");
        assert_eq!(free_form.component, "saving the list failed");
        assert_eq!(free_form.operation, "");
    }

    #[test]
    fn merge_keeps_existing_values() {
        let primary = LogContext::from_component("auth").with_metadata("a", 1);
        let secondary = LogContext::from_operation("other", "sign_in")
            .with_user_id("u-9")
            .with_metadata("a", 2)
            .with_metadata("b", 3);

        let merged = primary.merged_with(&secondary);
        assert_eq!(merged.component, "auth");
        assert_eq!(merged.operation, "sign_in");
        assert_eq!(merged.user_id.as_deref(), Some("u-9"));
        assert_eq!(merged.metadata["a"], serde_json::json!(1));
        assert_eq!(merged.metadata["b"], serde_json::json!(3));
    }
}
