//! Keyed sliding-window counter for failed authentication attempts.
//!
//! The limiter is created once at startup and injected through the router
//! state, so tests can build their own with a tiny window.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

/// Tracked keys above which a failure triggers a sweep of idle keys.
const SWEEP_THRESHOLD: usize = 1024;

#[derive(Debug, Clone)]
pub struct RateLimiter {
    attempts: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
    max_attempts: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_attempts: usize, window: Duration) -> Self {
        Self {
            attempts: Arc::new(Mutex::new(HashMap::new())),
            max_attempts,
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether `key` has used up its failures within the current window.
    pub fn is_blocked(&self, key: &str) -> bool {
        self.is_blocked_at(key, Instant::now())
    }

    pub fn is_blocked_at(&self, key: &str, now: Instant) -> bool {
        let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(recent) = attempts.get_mut(key) else {
            return false;
        };
        self.prune(recent, now);
        if recent.is_empty() {
            attempts.remove(key);
            return false;
        }
        recent.len() >= self.max_attempts
    }

    pub fn record_failure(&self, key: &str) {
        self.record_failure_at(key, Instant::now());
    }

    pub fn record_failure_at(&self, key: &str, now: Instant) {
        let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
        if attempts.len() >= SWEEP_THRESHOLD {
            // Keys that failed once and never came back
            attempts.retain(|_, recent| {
                self.prune(recent, now);
                !recent.is_empty()
            });
        }
        let recent = attempts.entry(key.to_string()).or_default();
        self.prune(recent, now);
        recent.push_back(now);
    }

    /// Forget the failures of one key, e.g. after a successful login.
    pub fn reset(&self, key: &str) {
        let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
        attempts.remove(key);
    }

    pub fn clear(&self) {
        let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
        attempts.clear();
    }

    fn prune(&self, recent: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&oldest) = recent.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                recent.pop_front();
            } else {
                break;
            }
        }
    }
}
