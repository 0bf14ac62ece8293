//! Failure-time capture of recent actions and runtime facts.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::LogContext;

/// Default number of recent actions kept by an [`ActionTrail`].
pub const DEFAULT_TRAIL_CAPACITY: usize = 10;

/// A user-visible action recorded in the trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedAction {
    pub action: String,
    pub at: DateTime<Utc>,
}

/// Bounded ring buffer of recent user-visible actions.
///
/// Appends overwrite the oldest entry once full. Reads copy the buffer and
/// never remove entries.
#[derive(Clone)]
pub struct ActionTrail {
    inner: Arc<Mutex<VecDeque<RecordedAction>>>,
    capacity: usize,
}

impl Default for ActionTrail {
    fn default() -> Self {
        Self::new(DEFAULT_TRAIL_CAPACITY)
    }
}

impl ActionTrail {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn record(&self, action: impl Into<String>) {
        let entry = RecordedAction {
            action: action.into(),
            at: Utc::now(),
        };
        let mut buffer = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if buffer.len() == self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(entry);
    }

    /// Oldest-first copy of the current trail.
    pub fn snapshot(&self) -> Vec<RecordedAction> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Supplies static runtime facts on demand. Any fact may be unavailable.
pub trait RuntimeFacts: Send + Sync {
    fn platform(&self) -> Option<String>;
    fn build_version(&self) -> Option<String>;
    fn current_route(&self) -> Option<String>;
}

/// Runtime facts read from the process: OS identifier, package version, and
/// a route slot the host application updates on navigation.
#[derive(Clone)]
pub struct EnvRuntimeFacts {
    build_version: Option<String>,
    route: Arc<RwLock<Option<String>>>,
}

impl Default for EnvRuntimeFacts {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvRuntimeFacts {
    pub fn new() -> Self {
        Self {
            build_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            route: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_build_version(mut self, version: impl Into<String>) -> Self {
        self.build_version = Some(version.into());
        self
    }

    pub fn set_route(&self, route: impl Into<String>) {
        *self.route.write().unwrap_or_else(PoisonError::into_inner) = Some(route.into());
    }
}

impl RuntimeFacts for EnvRuntimeFacts {
    fn platform(&self) -> Option<String> {
        Some(format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH))
    }

    fn build_version(&self) -> Option<String> {
        self.build_version.clone()
    }

    fn current_route(&self) -> Option<String> {
        self.route
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Assembles the trail and runtime facts into a [`LogContext`].
#[derive(Clone)]
pub struct ContextCapture {
    trail: ActionTrail,
    facts: Option<Arc<dyn RuntimeFacts>>,
}

impl Default for ContextCapture {
    fn default() -> Self {
        Self::new(ActionTrail::default())
    }
}

impl ContextCapture {
    pub fn new(trail: ActionTrail) -> Self {
        Self { trail, facts: None }
    }

    pub fn with_facts(mut self, facts: Arc<dyn RuntimeFacts>) -> Self {
        self.facts = Some(facts);
        self
    }

    pub fn trail(&self) -> &ActionTrail {
        &self.trail
    }

    pub fn record_action(&self, action: impl Into<String>) {
        self.trail.record(action);
    }

    /// Return `base` enriched with `recent_actions`, `platform`,
    /// `build_version` and `route` metadata. Existing keys are kept.
    pub fn capture(&self, base: &LogContext) -> LogContext {
        let mut context = base.clone();

        let actions: Vec<String> = self
            .trail
            .snapshot()
            .into_iter()
            .map(|entry| entry.action)
            .collect();
        if !actions.is_empty() {
            context
                .metadata
                .entry("recent_actions".to_string())
                .or_insert_with(|| serde_json::json!(actions));
        }

        if let Some(facts) = &self.facts {
            let known = [
                ("platform", facts.platform()),
                ("build_version", facts.build_version()),
                ("route", facts.current_route()),
            ];
            for (key, value) in known {
                if let Some(value) = value {
                    context
                        .metadata
                        .entry(key.to_string())
                        .or_insert(serde_json::Value::String(value));
                }
            }
        }

        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trail_keeps_only_the_newest_entries() {
        let trail = ActionTrail::new(3);
        for i in 0..5 {
            trail.record(format!("tap-{i}"));
        }
        let actions: Vec<_> = trail.snapshot().into_iter().map(|a| a.action).collect();
        assert_eq!(actions, vec!["tap-2", "tap-3", "tap-4"]);
        assert_eq!(trail.len(), 3);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let trail = ActionTrail::new(0);
        trail.record("a");
        trail.record("b");
        assert_eq!(trail.capacity(), 1);
        assert_eq!(trail.snapshot()[0].action, "b");
    }
}
