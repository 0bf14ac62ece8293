//! Notification de-duplication with TTL and bounded size.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::error::ErrorModel;

/// Remembers when each notification key was last shown.
#[derive(Debug, Clone)]
pub struct NotificationDeduplicator {
    inner: Arc<Mutex<DedupInner>>,
}

#[derive(Debug)]
struct DedupInner {
    last_shown: HashMap<String, Instant>,
    max_entries: usize,
    window: Duration,
}

/// Dedup key of an error: its code plus its user message.
pub fn dedup_key(error: &ErrorModel) -> String {
    format!("{}|{}", error.code(), error.user_message())
}

impl NotificationDeduplicator {
    pub fn new(max_entries: usize, window: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(DedupInner {
                last_shown: HashMap::new(),
                max_entries: max_entries.max(1),
                window,
            })),
        }
    }

    pub fn window(&self) -> Duration {
        self.lock().window
    }

    /// Returns `true` and records the time if `key` was not shown within
    /// the window; returns `false` otherwise. Check and record happen under
    /// one lock.
    pub fn should_show(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut inner = self.lock();
        let window = inner.window;

        inner
            .last_shown
            .retain(|_, shown_at| now.duration_since(*shown_at) < window);

        if inner.last_shown.contains_key(key) {
            return false;
        }

        // Evict the oldest entry if still at capacity
        if inner.last_shown.len() >= inner.max_entries {
            if let Some(oldest) = inner
                .last_shown
                .iter()
                .min_by_key(|(_, shown_at)| **shown_at)
                .map(|(k, _)| k.clone())
            {
                inner.last_shown.remove(&oldest);
            }
        }

        inner.last_shown.insert(key.to_string(), now);
        true
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.lock().last_shown.clear();
    }

    /// Current number of entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.lock().last_shown.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DedupInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn repeats_inside_the_window_are_suppressed() {
        let dedup = NotificationDeduplicator::new(8, Duration::from_secs(5));
        assert!(dedup.should_show("a"));
        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(!dedup.should_show("a"));
        assert!(dedup.should_show("b"));
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(dedup.should_show("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_evicts_the_oldest_key() {
        let dedup = NotificationDeduplicator::new(2, Duration::from_secs(60));
        assert!(dedup.should_show("a"));
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(dedup.should_show("b"));
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(dedup.should_show("c"));

        assert_eq!(dedup.len(), 2);
        assert!(dedup.should_show("a"));
        assert!(!dedup.should_show("c"));
    }
}
