//! Tests for the central dispatcher.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use common::{
    network_timeout, not_found, recording_dispatcher, Record, RecordingSink, RecordingSurface,
};
use faultline::classify::Severity;
use faultline::context::{ActionTrail, ContextCapture, EnvRuntimeFacts, LogContext};
use faultline::dispatch::{
    DispatchConfig, DispatchOutcome, Dispatcher, LogSink, Notification, NotificationId,
    NotificationSurface, Presentation, RetryAction,
};
use faultline::error::{ErrorCode, ErrorModel};
use pretty_assertions::assert_eq;
use serde_json::json;

fn session_expired() -> ErrorModel {
    ErrorModel::new(ErrorCode::AuthSessionExpired, "refresh token rejected")
}

#[test]
fn logs_once_and_requests_a_toast() {
    let (dispatcher, sink, surface) = recording_dispatcher();

    let outcome = dispatcher.report(&network_timeout());

    assert!(matches!(outcome, DispatchOutcome::Notified(_)));
    assert_eq!(sink.errors().len(), 1);
    let shown = surface.shown();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].severity, Severity::Recoverable);
    assert_eq!(shown[0].presentation, Presentation::Toast);
    assert_eq!(shown[0].duration_ms, 5_000);
    assert_eq!(shown[0].message, network_timeout().user_message());
    assert!(!shown[0].requires_action);
}

#[test]
fn non_critical_errors_use_the_short_toast() {
    let (dispatcher, _sink, surface) = recording_dispatcher();

    dispatcher.report(&not_found());

    let shown = surface.shown();
    assert_eq!(shown[0].severity, Severity::NonCritical);
    assert_eq!(shown[0].duration_ms, 3_000);
}

#[test]
fn critical_errors_request_full_screen() {
    let (dispatcher, _sink, surface) = recording_dispatcher();

    dispatcher.report(&session_expired());

    let shown = surface.shown();
    assert_eq!(shown[0].severity, Severity::Critical);
    assert_eq!(shown[0].presentation, Presentation::FullScreen);
    assert_eq!(shown[0].duration_ms, 0);
    assert!(shown[0].requires_action);
    assert_eq!(shown[0].title, "Action required");
}

#[tokio::test(start_paused = true)]
async fn duplicates_are_suppressed_inside_the_window() {
    let (dispatcher, sink, surface) = recording_dispatcher();

    assert!(matches!(
        dispatcher.report(&network_timeout()),
        DispatchOutcome::Notified(_)
    ));
    tokio::time::advance(Duration::from_secs(4)).await;
    assert_eq!(
        dispatcher.report(&network_timeout()),
        DispatchOutcome::Suppressed
    );
    assert_eq!(surface.count(), 1);
    assert_eq!(sink.errors().len(), 2);

    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(matches!(
        dispatcher.report(&network_timeout()),
        DispatchOutcome::Notified(_)
    ));
    assert_eq!(surface.count(), 2);
}

#[test]
fn different_user_messages_are_not_duplicates() {
    let (dispatcher, _sink, surface) = recording_dispatcher();

    dispatcher.report(&network_timeout());
    dispatcher.report(&network_timeout().with_user_message("The lists server is slow."));

    assert_eq!(surface.count(), 2);
}

#[test]
fn reset_clears_the_dedup_window() {
    let (dispatcher, _sink, surface) = recording_dispatcher();

    dispatcher.report(&not_found());
    dispatcher.reset();
    dispatcher.report(&not_found());

    assert_eq!(surface.count(), 2);
}

#[test]
fn retry_action_is_attached_only_when_retryable() {
    let (dispatcher, _sink, surface) = recording_dispatcher();
    let invoked = Arc::new(AtomicUsize::new(0));
    let retry: RetryAction = {
        let invoked = invoked.clone();
        Arc::new(move || {
            invoked.fetch_add(1, Ordering::SeqCst);
        })
    };

    dispatcher.handle(&network_timeout(), None, Some(retry.clone()));
    dispatcher.handle(&not_found(), None, Some(retry));

    let shown = surface.shown();
    let action = shown[0].action.as_ref().expect("retry control");
    assert_eq!(action.label, "Retry");
    action.invoke();
    assert_eq!(invoked.load(Ordering::SeqCst), 1);
    assert!(shown[1].action.is_none());
}

#[test]
fn retryable_errors_without_action_get_no_control() {
    let (dispatcher, _sink, surface) = recording_dispatcher();

    dispatcher.handle(&network_timeout(), None, None);

    assert!(surface.shown()[0].action.is_none());
}

#[test]
fn raw_string_context_is_normalized() {
    let (dispatcher, sink, _surface) = recording_dispatcher();

    dispatcher.handle(&not_found(), Some("lists.load".into()), None);
    dispatcher.handle(&network_timeout(), Some("sync worker crashed".into()), None);

    let errors = sink.errors();
    assert_eq!(errors[0].1.component, "lists");
    assert_eq!(errors[0].1.operation, "load");
    assert_eq!(errors[0].1.raw_context.as_deref(), Some("lists.load"));
    assert_eq!(errors[1].1.component, "sync worker crashed");
    assert_eq!(errors[1].1.operation, "");
}

#[test]
fn given_context_is_merged_with_the_error_context() {
    let (dispatcher, sink, _surface) = recording_dispatcher();
    let error = not_found()
        .with_context(LogContext::from_operation("lists", "sync").with_user_id("user-7"));

    dispatcher.handle(
        &error,
        Some(LogContext::from_component("list-screen").into()),
        None,
    );

    let errors = sink.errors();
    let (_, context) = &errors[0];
    assert_eq!(context.component, "list-screen");
    assert_eq!(context.operation, "sync");
    assert_eq!(context.user_id.as_deref(), Some("user-7"));
}

#[test]
fn capture_enriches_logged_context() {
    let facts = EnvRuntimeFacts::new().with_build_version("9.9.9");
    facts.set_route("/lists/42");
    let capture = ContextCapture::new(ActionTrail::new(3)).with_facts(Arc::new(facts.clone()));
    for action in ["open app", "tap lists", "tap list 42", "tap share"] {
        capture.record_action(action);
    }

    let sink = Arc::new(RecordingSink::default());
    let surface = Arc::new(RecordingSurface::default());
    let dispatcher = Dispatcher::new(sink.clone(), surface).with_capture(capture);

    dispatcher.report(&not_found());

    let errors = sink.errors();
    let (_, context) = &errors[0];
    assert_eq!(
        context.metadata["recent_actions"],
        json!(["tap lists", "tap list 42", "tap share"])
    );
    assert_eq!(context.metadata["build_version"], json!("9.9.9"));
    assert_eq!(context.metadata["route"], json!("/lists/42"));
    assert!(context.metadata.contains_key("platform"));
}

#[test]
fn custom_config_changes_durations_and_label() {
    let sink = Arc::new(RecordingSink::default());
    let surface = Arc::new(RecordingSurface::default());
    let config = DispatchConfig::builder()
        .recoverable_duration(Duration::from_secs(8))
        .retry_label("Try again".to_string())
        .build();
    let dispatcher = Dispatcher::with_config(sink, surface.clone(), config);

    dispatcher.handle(&network_timeout(), None, Some(Arc::new(|| {})));

    let shown = surface.shown();
    assert_eq!(shown[0].duration_ms, 8_000);
    assert_eq!(shown[0].action.as_ref().unwrap().label, "Try again");
}

#[test]
fn dismiss_is_forwarded_to_the_surface() {
    let (dispatcher, _sink, surface) = recording_dispatcher();

    let DispatchOutcome::Notified(id) = dispatcher.report(&session_expired()) else {
        panic!("expected a notification");
    };
    dispatcher.dismiss(id);

    assert_eq!(surface.dismissed(), vec![id]);
}

/// A sink that reports its own failure back through the dispatcher.
#[derive(Default)]
struct ReentrantSink {
    dispatcher: OnceLock<Dispatcher>,
    nested: Mutex<Vec<DispatchOutcome>>,
    calls: AtomicUsize,
}

impl LogSink for ReentrantSink {
    fn error(&self, _error: &ErrorModel, _context: &LogContext) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(dispatcher) = self.dispatcher.get() {
            let failure = ErrorModel::new(ErrorCode::StorageUnavailable, "log backend down");
            let outcome = dispatcher.report(&failure);
            self.nested.lock().unwrap().push(outcome);
        }
    }

    fn warn(&self, _message: &str, _context: &LogContext) {}

    fn info(&self, _message: &str, _context: &LogContext) {}
}

#[test]
fn reentrant_dispatch_does_not_recurse() {
    let sink = Arc::new(ReentrantSink::default());
    let surface = Arc::new(RecordingSurface::default());
    let dispatcher = Dispatcher::new(sink.clone(), surface.clone());
    assert!(sink.dispatcher.set(dispatcher.clone()).is_ok());

    let outcome = dispatcher.report(&not_found());

    assert!(matches!(outcome, DispatchOutcome::Notified(_)));
    assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    assert_eq!(*sink.nested.lock().unwrap(), vec![DispatchOutcome::Reentrant]);
    assert_eq!(surface.count(), 1);

    // The latch is released once the outer dispatch returns.
    dispatcher.reset();
    assert!(matches!(
        dispatcher.report(&not_found()),
        DispatchOutcome::Notified(_)
    ));
}

struct PanickingSink;

impl LogSink for PanickingSink {
    fn error(&self, _error: &ErrorModel, _context: &LogContext) {
        panic!("sink exploded");
    }

    fn warn(&self, _message: &str, _context: &LogContext) {}

    fn info(&self, _message: &str, _context: &LogContext) {}
}

#[test]
fn panicking_sink_does_not_escape() {
    let surface = Arc::new(RecordingSurface::default());
    let dispatcher = Dispatcher::new(Arc::new(PanickingSink), surface.clone());

    assert!(matches!(
        dispatcher.report(&not_found()),
        DispatchOutcome::Notified(_)
    ));
    assert!(matches!(
        dispatcher.report(&network_timeout()),
        DispatchOutcome::Notified(_)
    ));
    assert_eq!(surface.count(), 2);
}

struct BrokenSurface;

impl NotificationSurface for BrokenSurface {
    fn show(&self, _notification: Notification) -> NotificationId {
        panic!("no window");
    }

    fn dismiss(&self, _id: NotificationId) {}
}

#[test]
fn surface_failures_are_logged_as_warnings() {
    let sink = Arc::new(RecordingSink::default());
    let dispatcher = Dispatcher::new(sink.clone(), Arc::new(BrokenSurface));

    assert_eq!(
        dispatcher.report(&not_found()),
        DispatchOutcome::SurfaceFailed
    );

    let records = sink.records();
    assert!(matches!(records[0], Record::Error { .. }));
    assert!(matches!(&records[1], Record::Warn(message) if message.contains("surface")));
}

#[test]
fn default_dispatcher_traces_without_a_ui() {
    let dispatcher = Dispatcher::default();

    let outcome = dispatcher.handle(&session_expired(), Some("auth.refresh".into()), None);

    let DispatchOutcome::Notified(id) = outcome else {
        panic!("expected a notification");
    };
    dispatcher.dismiss(id);
}

#[test]
fn concurrent_identical_failures_notify_once() {
    const WORKERS: usize = 8;
    let (dispatcher, sink, surface) = recording_dispatcher();
    let start = Arc::new(std::sync::Barrier::new(WORKERS));

    let workers: Vec<_> = (0..WORKERS)
        .map(|_| {
            let dispatcher = dispatcher.clone();
            let start = start.clone();
            std::thread::spawn(move || {
                start.wait();
                dispatcher.report(&network_timeout())
            })
        })
        .collect();
    let outcomes: Vec<_> = workers
        .into_iter()
        .map(|worker| worker.join().unwrap())
        .collect();

    let notified = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, DispatchOutcome::Notified(_)))
        .count();
    assert_eq!(notified, 1);
    assert_eq!(surface.count(), 1);
    assert_eq!(sink.errors().len(), WORKERS);
}
