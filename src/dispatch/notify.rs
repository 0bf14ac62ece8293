//! Notification requests sent to the UI surface.

use std::fmt;
use std::sync::Arc;

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use crate::classify::Severity;

/// Callback offered to the user as a manual retry.
pub type RetryAction = Arc<dyn Fn() + Send + Sync>;

/// Identifier returned by the surface; used to dismiss a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub Uuid);

impl NotificationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NotificationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// How the surface should present a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Presentation {
    /// Transient and dismissible.
    Toast,
    /// Blocking; the user must act.
    FullScreen,
}

/// Actionable control attached to a notification.
#[derive(Clone)]
pub struct NotificationAction {
    pub label: String,
    pub on_invoke: RetryAction,
}

impl NotificationAction {
    pub fn invoke(&self) {
        (self.on_invoke)();
    }
}

impl fmt::Debug for NotificationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationAction")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// A display request.
#[derive(Debug, Clone, Builder)]
pub struct Notification {
    #[builder(into)]
    pub title: String,
    #[builder(into)]
    pub message: String,
    pub severity: Severity,
    #[builder(default = Presentation::Toast)]
    pub presentation: Presentation,
    /// Display time. Zero means until dismissed.
    #[builder(default)]
    pub duration_ms: u64,
    #[builder(default)]
    pub requires_action: bool,
    pub action: Option<NotificationAction>,
}

/// The UI notification surface.
pub trait NotificationSurface: Send + Sync {
    fn show(&self, notification: Notification) -> NotificationId;
    fn dismiss(&self, id: NotificationId);
}

/// Surface for hosts without UI: notifications are written to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessSurface;

impl NotificationSurface for HeadlessSurface {
    fn show(&self, notification: Notification) -> NotificationId {
        let id = NotificationId::new();
        tracing::info!(
            %id,
            severity = %notification.severity,
            presentation = %notification.presentation,
            title = %notification.title,
            "{}",
            notification.message
        );
        id
    }

    fn dismiss(&self, id: NotificationId) {
        tracing::debug!(%id, "Notification dismissed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_to_a_sticky_toast_without_action() {
        let notification = Notification::builder()
            .title("Saved offline")
            .message("Your list will sync when you reconnect.")
            .severity(Severity::NonCritical)
            .build();

        assert_eq!(notification.presentation, Presentation::Toast);
        assert_eq!(notification.duration_ms, 0);
        assert!(!notification.requires_action);
        assert!(notification.action.is_none());
    }
}
