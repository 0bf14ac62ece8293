//! Shared test helpers: recording sink and notification surface.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use faultline::context::LogContext;
use faultline::dispatch::{
    Dispatcher, LogSink, Notification, NotificationId, NotificationSurface,
};
use faultline::error::{ErrorCode, ErrorModel};

/// A log record captured by [`RecordingSink`].
#[derive(Debug, Clone)]
pub enum Record {
    Error {
        code: ErrorCode,
        message: String,
        context: LogContext,
    },
    Warn(String),
    Info(String),
}

/// A sink that keeps every record in memory.
#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<Record>>,
}

impl RecordingSink {
    pub fn records(&self) -> Vec<Record> {
        self.records.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<(ErrorCode, LogContext)> {
        self.records()
            .into_iter()
            .filter_map(|record| match record {
                Record::Error { code, context, .. } => Some((code, context)),
                _ => None,
            })
            .collect()
    }
}

impl LogSink for RecordingSink {
    fn error(&self, error: &ErrorModel, context: &LogContext) {
        self.records.lock().unwrap().push(Record::Error {
            code: error.code(),
            message: error.message().to_string(),
            context: context.clone(),
        });
    }

    fn warn(&self, message: &str, _context: &LogContext) {
        self.records
            .lock()
            .unwrap()
            .push(Record::Warn(message.to_string()));
    }

    fn info(&self, message: &str, _context: &LogContext) {
        self.records
            .lock()
            .unwrap()
            .push(Record::Info(message.to_string()));
    }
}

/// A surface that keeps every notification request in memory.
#[derive(Default)]
pub struct RecordingSurface {
    shown: Mutex<Vec<(NotificationId, Notification)>>,
    dismissed: Mutex<Vec<NotificationId>>,
}

impl RecordingSurface {
    pub fn shown(&self) -> Vec<Notification> {
        self.shown
            .lock()
            .unwrap()
            .iter()
            .map(|(_, notification)| notification.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.shown.lock().unwrap().len()
    }

    pub fn dismissed(&self) -> Vec<NotificationId> {
        self.dismissed.lock().unwrap().clone()
    }
}

impl NotificationSurface for RecordingSurface {
    fn show(&self, notification: Notification) -> NotificationId {
        let id = NotificationId::new();
        self.shown.lock().unwrap().push((id, notification));
        id
    }

    fn dismiss(&self, id: NotificationId) {
        self.dismissed.lock().unwrap().push(id);
    }
}

/// A dispatcher wired to fresh recording fakes.
pub fn recording_dispatcher() -> (Dispatcher, Arc<RecordingSink>, Arc<RecordingSurface>) {
    let sink = Arc::new(RecordingSink::default());
    let surface = Arc::new(RecordingSurface::default());
    let dispatcher = Dispatcher::new(sink.clone(), surface.clone());
    (dispatcher, sink, surface)
}

pub fn network_timeout() -> ErrorModel {
    ErrorModel::new(ErrorCode::NetworkTimeout, "request timed out")
}

pub fn not_found() -> ErrorModel {
    ErrorModel::new(ErrorCode::StorageNotFound, "document missing")
}
