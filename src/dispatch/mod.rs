//! Central error dispatcher.
//!
//! The single place a failure that was not recovered locally is surfaced:
//! it is logged once, classified, and turned into a de-duplicated
//! notification request. Retry policy is never decided here; the dispatcher
//! only offers the user a manual retry control.

pub mod dedup;
pub mod notify;
pub mod sink;

pub use dedup::{dedup_key, NotificationDeduplicator};
pub use notify::{
    HeadlessSurface, Notification, NotificationAction, NotificationId, NotificationSurface,
    Presentation, RetryAction,
};
pub use sink::{LogSink, TracingSink};

use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::classify::{classify, Severity};
use crate::config::serde_millis;
use crate::context::{ContextCapture, LogContext};
use crate::error::ErrorModel;

thread_local! {
    static DISPATCHING: Cell<bool> = const { Cell::new(false) };
}

/// Dispatcher settings.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Identical notifications inside this window are suppressed.
    #[builder(default = Duration::from_secs(5))]
    #[serde(rename = "dedup_window_ms", with = "serde_millis")]
    pub dedup_window: Duration,
    /// Upper bound on remembered notification keys.
    #[builder(default = 256)]
    pub dedup_capacity: usize,
    /// Display time for recoverable errors.
    #[builder(default = Duration::from_secs(5))]
    #[serde(rename = "recoverable_duration_ms", with = "serde_millis")]
    pub recoverable_duration: Duration,
    /// Display time for non-critical errors.
    #[builder(default = Duration::from_secs(3))]
    #[serde(rename = "non_critical_duration_ms", with = "serde_millis")]
    pub non_critical_duration: Duration,
    #[builder(default = "Retry".to_string())]
    pub retry_label: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            dedup_window: Duration::from_secs(5),
            dedup_capacity: 256,
            recoverable_duration: Duration::from_secs(5),
            non_critical_duration: Duration::from_secs(3),
            retry_label: "Retry".to_string(),
        }
    }
}

/// Context handed to [`Dispatcher::handle`]: structured, or a raw string.
#[derive(Debug, Clone)]
pub enum ContextInput {
    Structured(LogContext),
    Raw(String),
}

impl ContextInput {
    pub fn into_context(self) -> LogContext {
        match self {
            Self::Structured(context) => context,
            Self::Raw(raw) => LogContext::from_raw(raw),
        }
    }
}

impl From<LogContext> for ContextInput {
    fn from(context: LogContext) -> Self {
        Self::Structured(context)
    }
}

impl From<&str> for ContextInput {
    fn from(raw: &str) -> Self {
        Self::Raw(raw.to_string())
    }
}

impl From<String> for ContextInput {
    fn from(raw: String) -> Self {
        Self::Raw(raw)
    }
}

/// What happened to a dispatched error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Logged and shown.
    Notified(NotificationId),
    /// Logged; the notification duplicated one shown inside the window.
    Suppressed,
    /// Logged; the notification surface failed.
    SurfaceFailed,
    /// Raised while another dispatch was running on this thread; only
    /// traced.
    Reentrant,
}

/// Central dispatcher. Clones share the sink, surface and dedup state.
#[derive(Clone)]
pub struct Dispatcher {
    sink: Arc<dyn LogSink>,
    surface: Arc<dyn NotificationSurface>,
    dedup: NotificationDeduplicator,
    capture: Option<ContextCapture>,
    config: DispatchConfig,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("dedup_entries", &self.dedup.len())
            .field("capture", &self.capture.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink), Arc::new(HeadlessSurface))
    }
}

impl Dispatcher {
    pub fn new(sink: Arc<dyn LogSink>, surface: Arc<dyn NotificationSurface>) -> Self {
        Self::with_config(sink, surface, DispatchConfig::default())
    }

    pub fn with_config(
        sink: Arc<dyn LogSink>,
        surface: Arc<dyn NotificationSurface>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            sink,
            surface,
            dedup: NotificationDeduplicator::new(config.dedup_capacity, config.dedup_window),
            capture: None,
            config,
        }
    }

    /// Enrich every dispatched context with the action trail and runtime facts.
    pub fn with_capture(mut self, capture: ContextCapture) -> Self {
        self.capture = Some(capture);
        self
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn capture(&self) -> Option<&ContextCapture> {
        self.capture.as_ref()
    }

    /// Forget which notifications were shown.
    pub fn reset(&self) {
        self.dedup.clear();
    }

    /// Dispatch with no extra context and no retry control.
    pub fn report(&self, error: &ErrorModel) -> DispatchOutcome {
        self.handle(error, None, None)
    }

    /// Log `error` once and request a de-duplicated notification.
    ///
    /// `retry_action` becomes a notification control only when the error is
    /// retryable.
    pub fn handle(
        &self,
        error: &ErrorModel,
        context: Option<ContextInput>,
        retry_action: Option<RetryAction>,
    ) -> DispatchOutcome {
        let Some(_guard) = DispatchGuard::enter() else {
            tracing::error!(
                code = %error.code(),
                "Error raised while dispatching another error: {}",
                error.message()
            );
            return DispatchOutcome::Reentrant;
        };

        let context = self.resolve_context(error, context);

        let logged = catch_unwind(AssertUnwindSafe(|| self.sink.error(error, &context)));
        if logged.is_err() {
            tracing::error!(code = %error.code(), "Log sink panicked while recording error");
        }

        let key = dedup_key(error);
        if !self.dedup.should_show(&key) {
            tracing::debug!(code = %error.code(), "Suppressing duplicate notification");
            let _ = catch_unwind(AssertUnwindSafe(|| {
                self.sink
                    .info("Duplicate notification suppressed", &context)
            }));
            return DispatchOutcome::Suppressed;
        }

        let notification = self.build_notification(error, retry_action);
        match catch_unwind(AssertUnwindSafe(|| self.surface.show(notification))) {
            Ok(id) => DispatchOutcome::Notified(id),
            Err(_) => {
                let _ = catch_unwind(AssertUnwindSafe(|| {
                    self.sink
                        .warn("Notification surface failed to show error", &context)
                }));
                DispatchOutcome::SurfaceFailed
            }
        }
    }

    /// Dismiss a notification previously shown through this dispatcher.
    pub fn dismiss(&self, id: NotificationId) {
        self.surface.dismiss(id);
    }

    fn resolve_context(&self, error: &ErrorModel, context: Option<ContextInput>) -> LogContext {
        let given = context.map(ContextInput::into_context);
        let base = match (given, error.context()) {
            (Some(given), Some(own)) => given.merged_with(own),
            (Some(given), None) => given,
            (None, Some(own)) => own.clone(),
            (None, None) => LogContext::default(),
        };
        match &self.capture {
            Some(capture) => capture.capture(&base),
            None => base,
        }
    }

    fn build_notification(
        &self,
        error: &ErrorModel,
        retry_action: Option<RetryAction>,
    ) -> Notification {
        let category = classify(error);
        let (title, presentation, duration) = match category.severity {
            Severity::Critical => ("Action required", Presentation::FullScreen, Duration::ZERO),
            Severity::Recoverable => (
                "Temporary problem",
                Presentation::Toast,
                self.config.recoverable_duration,
            ),
            Severity::NonCritical => (
                "Something went wrong",
                Presentation::Toast,
                self.config.non_critical_duration,
            ),
        };

        let action = retry_action
            .filter(|_| error.is_retryable())
            .map(|on_invoke| NotificationAction {
                label: self.config.retry_label.clone(),
                on_invoke,
            });

        Notification::builder()
            .title(title)
            .message(error.user_message())
            .severity(category.severity)
            .presentation(presentation)
            .duration_ms(duration.as_millis() as u64)
            .requires_action(category.requires_user_action)
            .maybe_action(action)
            .build()
    }
}

/// Per-thread re-entrancy latch, released on drop.
struct DispatchGuard;

impl DispatchGuard {
    fn enter() -> Option<Self> {
        DISPATCHING.with(|flag| {
            if flag.get() {
                None
            } else {
                flag.set(true);
                Some(Self)
            }
        })
    }
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        DISPATCHING.with(|flag| flag.set(false));
    }
}
