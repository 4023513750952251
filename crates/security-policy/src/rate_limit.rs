//! Sliding-window rate limiting keyed by operation name
//!
//! Each operation keeps its own ordered list of call timestamps. A check
//! prunes timestamps older than the window, rejects when the remaining count
//! has reached `max_calls`, and otherwise records the new call. Pruning,
//! counting and recording happen under one lock so concurrent callers can
//! never admit more than `max_calls` inside a window.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};

// Tracked operations before a check sweeps out expired histories.
const SWEEP_THRESHOLD: usize = 64;

/// Usage snapshot for one operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateLimitStats {
    pub operation: String,
    pub calls: usize,
    pub limit: usize,
    pub remaining: usize,
    pub time_window: f64,
}

/// Sliding-window limiter shared by every operation it is asked about.
#[derive(Debug)]
pub struct RateLimiter {
    max_calls: usize,
    window: Duration,
    calls: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    /// Create a limiter admitting `max_calls` per operation inside `window`.
    pub fn new(max_calls: usize, window: Duration) -> Result<Self> {
        if max_calls == 0 {
            return Err(Error::validation("max_calls", "max_calls must be at least 1"));
        }
        if window.is_zero() {
            return Err(Error::validation("time_window", "time window must be positive"));
        }
        Ok(Self {
            max_calls,
            window,
            calls: Mutex::new(HashMap::new()),
        })
    }

    /// Same as [`RateLimiter::new`] with the window given in seconds.
    pub fn from_secs_f64(max_calls: usize, window_secs: f64) -> Result<Self> {
        if !window_secs.is_finite() || window_secs <= 0.0 {
            return Err(Error::validation("time_window", "time window must be positive"));
        }
        Self::new(max_calls, Duration::from_secs_f64(window_secs))
    }

    /// Calls admitted per operation inside one window.
    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    /// Length of the sliding window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Admit or reject one call for `operation`.
    ///
    /// A rejected call is not recorded, so it does not extend the window.
    /// Operations whose history has expired are forgotten once enough
    /// distinct names are tracked.
    pub fn check(&self, operation: &str) -> Result<()> {
        let now = Instant::now();
        let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        if calls.len() >= SWEEP_THRESHOLD && !calls.contains_key(operation) {
            calls.retain(|_, history| {
                prune(history, now, self.window);
                !history.is_empty()
            });
        }
        let history = calls.entry(operation.to_string()).or_default();
        prune(history, now, self.window);

        if history.len() >= self.max_calls {
            let count = history.len();
            warn!(
                operation,
                calls = count,
                limit = self.max_calls,
                window_secs = self.window.as_secs_f64(),
                "rate limit exceeded"
            );
            metrics::counter!("rate_limit_rejections_total", "operation" => operation.to_string())
                .increment(1);
            return Err(Error::RateLimitExceeded {
                operation: operation.to_string(),
                calls: count,
                limit: self.max_calls,
                window: self.window,
            });
        }

        history.push_back(now);
        debug!(operation, calls = history.len(), limit = self.max_calls, "call admitted");
        Ok(())
    }

    /// Current usage for `operation` after dropping expired timestamps.
    pub fn stats(&self, operation: &str) -> RateLimitStats {
        let now = Instant::now();
        let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        let count = calls
            .get_mut(operation)
            .map(|history| {
                prune(history, now, self.window);
                history.len()
            })
            .unwrap_or(0);
        if count == 0 {
            calls.remove(operation);
        }

        RateLimitStats {
            operation: operation.to_string(),
            calls: count,
            limit: self.max_calls,
            remaining: self.max_calls.saturating_sub(count),
            time_window: self.window.as_secs_f64(),
        }
    }

    /// Run `f` only if a call for `operation` is admitted.
    pub fn guard<T>(&self, operation: &str, f: impl FnOnce() -> T) -> Result<T> {
        self.check(operation)?;
        Ok(f())
    }

    /// Await `fut` only if a call for `operation` is admitted.
    ///
    /// The check happens before the future is polled; the lock is never held
    /// across the await.
    pub async fn guard_async<F: Future>(&self, operation: &str, fut: F) -> Result<F::Output> {
        self.check(operation)?;
        Ok(fut.await)
    }
}

// Drops timestamps whose age has reached the window.
fn prune(history: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&oldest) = history.front() {
        if now.duration_since(oldest) < window {
            break;
        }
        history.pop_front();
    }
}

/// Named limiters with an optional fallback for unlisted operations.
#[derive(Debug, Default)]
pub struct RateLimiterSet {
    limiters: HashMap<String, RateLimiter>,
    default: Option<RateLimiter>,
}

impl RateLimiterSet {
    /// Empty set; every operation passes until limiters are added.
    pub fn new() -> Self {
        Self::default()
    }

    /// Limiter applied to operations without a dedicated entry.
    pub fn with_default(mut self, limiter: RateLimiter) -> Self {
        self.default = Some(limiter);
        self
    }

    /// Add or replace the dedicated limiter for `operation`.
    pub fn insert(&mut self, operation: impl Into<String>, limiter: RateLimiter) {
        self.limiters.insert(operation.into(), limiter);
    }

    /// The limiter governing `operation`, if any.
    pub fn get(&self, operation: &str) -> Option<&RateLimiter> {
        self.limiters.get(operation).or(self.default.as_ref())
    }

    /// Check `operation` against its limiter. Unlimited operations always pass.
    pub fn check(&self, operation: &str) -> Result<()> {
        match self.get(operation) {
            Some(limiter) => limiter.check(operation),
            None => Ok(()),
        }
    }

    /// Usage for `operation`, or `None` when nothing limits it.
    pub fn stats(&self, operation: &str) -> Option<RateLimitStats> {
        self.get(operation).map(|limiter| limiter.stats(operation))
    }

    /// Stats for every operation with a dedicated limiter, sorted by name.
    pub fn all_stats(&self) -> Vec<RateLimitStats> {
        let mut names: Vec<&String> = self.limiters.keys().collect();
        names.sort();
        names
            .into_iter()
            .map(|name| self.limiters[name].stats(name))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty() && self.default.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use common::{ErrorCode, Remediation};
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn admits_up_to_limit_then_rejects() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60)).unwrap();
        for _ in 0..3 {
            limiter.check("send").unwrap();
        }
        let err = limiter.check("send").unwrap_err();
        assert_eq!(err.code(), ErrorCode::RateLimitExceeded);
        assert!(err.is_retryable());
        match err {
            Error::RateLimitExceeded {
                operation,
                calls,
                limit,
                ..
            } => {
                assert_eq!(operation, "send");
                assert_eq!(calls, 3);
                assert_eq!(limit, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn window_expiry_readmits() {
        let limiter = RateLimiter::new(3, Duration::from_secs(1)).unwrap();
        for _ in 0..3 {
            limiter.check("op").unwrap();
        }
        assert!(limiter.check("op").is_err());

        std::thread::sleep(Duration::from_millis(1100));
        limiter.check("op").unwrap();
        assert_eq!(limiter.stats("op").calls, 1);
    }

    #[test]
    fn expired_operations_are_forgotten() {
        let limiter = RateLimiter::new(1, Duration::from_millis(50)).unwrap();
        for i in 0..200 {
            limiter.check(&format!("op-{i}")).unwrap();
        }
        std::thread::sleep(Duration::from_millis(80));

        limiter.check("fresh").unwrap();
        let tracked = limiter.calls.lock().unwrap().len();
        assert_eq!(tracked, 1);
        assert_eq!(limiter.stats("fresh").calls, 1);
    }

    #[test]
    fn rejected_calls_are_not_recorded() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60)).unwrap();
        limiter.check("op").unwrap();
        for _ in 0..5 {
            assert!(limiter.check("op").is_err());
        }
        assert_eq!(limiter.stats("op").calls, 1);
    }

    #[test]
    fn operations_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60)).unwrap();
        limiter.check("a").unwrap();
        limiter.check("b").unwrap();
        assert!(limiter.check("a").is_err());
        assert!(limiter.check("b").is_err());
    }

    #[test]
    fn stats_for_unknown_operation() {
        let limiter = RateLimiter::new(5, Duration::from_secs(2)).unwrap();
        let stats = limiter.stats("never-called");
        assert_eq!(stats.calls, 0);
        assert_eq!(stats.limit, 5);
        assert_eq!(stats.remaining, 5);
        assert_eq!(stats.time_window, 2.0);
    }

    #[test]
    fn stats_reflect_usage() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60)).unwrap();
        limiter.check("op").unwrap();
        limiter.check("op").unwrap();
        let stats = limiter.stats("op");
        assert_eq!(stats.calls, 2);
        assert_eq!(stats.remaining, 3);
    }

    #[test]
    fn concurrent_callers_never_exceed_limit() {
        let limiter = Arc::new(RateLimiter::new(10, Duration::from_secs(60)).unwrap());
        let admitted = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let limiter = limiter.clone();
                let admitted = admitted.clone();
                std::thread::spawn(move || {
                    if limiter.check("shared").is_ok() {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(admitted.load(Ordering::SeqCst), 10);
        assert_eq!(limiter.stats("shared").calls, 10);
    }

    #[test]
    fn rejects_invalid_construction() {
        assert!(RateLimiter::new(0, Duration::from_secs(1)).is_err());
        assert!(RateLimiter::new(1, Duration::ZERO).is_err());
        assert!(RateLimiter::from_secs_f64(1, 0.0).is_err());
        assert!(RateLimiter::from_secs_f64(1, -1.0).is_err());
        assert!(RateLimiter::from_secs_f64(1, f64::NAN).is_err());
        assert!(RateLimiter::from_secs_f64(1, 0.5).is_ok());
    }

    #[test]
    fn guard_skips_closure_when_rejected() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60)).unwrap();
        let runs = AtomicUsize::new(0);

        let first = limiter.guard("op", || runs.fetch_add(1, Ordering::SeqCst));
        assert!(first.is_ok());
        let second = limiter.guard("op", || runs.fetch_add(1, Ordering::SeqCst));
        assert!(second.is_err());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn guard_async_runs_future_when_admitted() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60)).unwrap();
        let value = limiter.guard_async("op", async { 42 }).await.unwrap();
        assert_eq!(value, 42);
        assert!(limiter.guard_async("op", async { 43 }).await.is_err());
    }

    #[test]
    fn error_details_carry_limit_context() {
        let limiter = RateLimiter::new(1, Duration::from_millis(1500)).unwrap();
        limiter.check("op").unwrap();
        let report = limiter.check("op").unwrap_err().report();
        assert_eq!(report.code, ErrorCode::RateLimitExceeded);
        assert_eq!(report.details["operation"], "op");
        assert_eq!(report.details["limit"], 1);
        assert_eq!(report.details["time_window"], 1.5);
    }

    #[test]
    fn rejection_increments_counter() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let _guard = metrics::set_default_local_recorder(&recorder);

        let limiter = RateLimiter::new(1, Duration::from_secs(60)).unwrap();
        limiter.check("query").unwrap();
        let _ = limiter.check("query");

        let output = handle.render();
        assert!(output.contains("rate_limit_rejections_total"));
        assert!(output.contains("operation=\"query\""));
    }

    #[test]
    fn set_routes_to_named_then_default() {
        let mut set = RateLimiterSet::new()
            .with_default(RateLimiter::new(2, Duration::from_secs(60)).unwrap());
        set.insert("send", RateLimiter::new(1, Duration::from_secs(60)).unwrap());

        set.check("send").unwrap();
        assert!(set.check("send").is_err());

        set.check("query").unwrap();
        set.check("query").unwrap();
        assert!(set.check("query").is_err());

        assert_eq!(set.stats("send").unwrap().limit, 1);
        assert_eq!(set.stats("query").unwrap().limit, 2);
        assert_eq!(set.all_stats().len(), 1);
    }

    #[test]
    fn set_without_default_passes_unlisted() {
        let mut set = RateLimiterSet::new();
        set.insert("send", RateLimiter::new(1, Duration::from_secs(60)).unwrap());
        for _ in 0..100 {
            set.check("query").unwrap();
        }
        assert!(set.stats("query").is_none());
    }
}
