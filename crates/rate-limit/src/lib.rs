//! Per-route rate limiting for the analysis gateway.
//!
//! The algorithm is a sliding-window log with penalty suspension (see
//! [`SlidingWindowLimiter`]): a client that exceeds its quota is locked out
//! for one full window.
//!
//! [`RateLimiter`] adds route rules on top: each configured path prefix has
//! its own window, quota and key namespace, and the longest matching prefix
//! governs a request.

pub mod key;
pub mod sliding_window;

use std::sync::Arc;
use std::time::Duration;

use sgn_common::{RateLimitConfig, RouteRateLimitConfig};

pub use key::{client_identifier, rate_limit_key, ANONYMOUS_CLIENT};
pub use sliding_window::{LimiterStats, RateLimitDecision, SlidingWindowLimiter};

/// A limit bound to a path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    pub name: String,
    pub path_prefix: String,
    pub window: Duration,
    pub max: u64,
}

impl From<&RouteRateLimitConfig> for RouteRule {
    fn from(config: &RouteRateLimitConfig) -> Self {
        Self {
            name: config.name.clone(),
            path_prefix: config.path_prefix.clone(),
            window: Duration::from_secs(config.window_secs),
            max: config.max,
        }
    }
}

/// Shared rate limiter with route rules.
///
/// Cheaply cloneable (backed by `Arc`); all clones see the same counters.
/// State lives for the lifetime of the process and is never implicitly
/// reset.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<RateLimiterInner>,
}

struct RateLimiterInner {
    limiter: SlidingWindowLimiter,
    /// Sorted by descending prefix length so the first match is the longest.
    rules: Vec<RouteRule>,
}

impl RateLimiter {
    pub fn new(mut rules: Vec<RouteRule>) -> Self {
        rules.sort_by(|a, b| b.path_prefix.len().cmp(&a.path_prefix.len()));
        tracing::info!(rules = rules.len(), "creating sliding window rate limiter");
        Self {
            inner: Arc::new(RateLimiterInner {
                limiter: SlidingWindowLimiter::new(),
                rules,
            }),
        }
    }

    /// Build from configuration. A disabled limiter has no rules and
    /// therefore admits everything routed through [`check_route`](Self::check_route).
    pub fn from_config(config: &RateLimitConfig) -> Self {
        if !config.enabled {
            tracing::info!("rate limiting disabled");
            return Self::new(Vec::new());
        }
        Self::new(config.routes.iter().map(RouteRule::from).collect())
    }

    /// Rule governing `path`, if any.
    pub fn rule_for(&self, path: &str) -> Option<&RouteRule> {
        self.inner
            .rules
            .iter()
            .find(|rule| path.starts_with(&rule.path_prefix))
    }

    /// Check `client` against the rule for `path`. `None` means no rule
    /// applies and the request is not limited.
    pub fn check_route(&self, path: &str, client: &str) -> Option<(String, RateLimitDecision)> {
        let rule = self.rule_for(path)?;
        let key = rate_limit_key(&rule.name, client);
        let decision = self.inner.limiter.check(&key, rule.window, rule.max);
        Some((key, decision))
    }

    /// Raw check with an explicit window and quota.
    pub fn check(&self, key: &str, window: Duration, max: u64) -> RateLimitDecision {
        self.inner.limiter.check(key, window, max)
    }

    /// Clear the entry for a fully qualified key (e.g. `ia:1.2.3.4`).
    pub fn reset(&self, key: &str) -> bool {
        let removed = self.inner.limiter.reset(key);
        tracing::info!(key, removed, "rate limit entry reset");
        removed
    }

    pub fn stats(&self) -> LimiterStats {
        self.inner.limiter.stats()
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.inner.rules
    }
}
