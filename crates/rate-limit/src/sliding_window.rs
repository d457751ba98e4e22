use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Internal state for a single client key.
#[derive(Debug, Default)]
struct WindowEntry {
    /// Admitted request instants, oldest first.
    timestamps: VecDeque<Instant>,
    /// While in the future, every request for the key is rejected.
    suspended_until: Option<Instant>,
}

/// Outcome of a single [`SlidingWindowLimiter::check`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub limit_exceeded: bool,
    pub remaining: u64,
    pub reset_at: Instant,
    pub limit: u64,
}

impl RateLimitDecision {
    /// Time left until `reset_at`, zero if it already passed.
    pub fn retry_after(&self, now: Instant) -> Duration {
        self.reset_at.saturating_duration_since(now)
    }

    /// Whole seconds for a `Retry-After` header: rounded up, never zero.
    pub fn retry_after_secs(&self, now: Instant) -> u64 {
        let wait = self.retry_after(now);
        let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
        secs.max(1)
    }
}

/// Snapshot of limiter occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LimiterStats {
    pub tracked_keys: usize,
    pub suspended_keys: usize,
}

/// A concurrent sliding-window log limiter with penalty suspension.
///
/// Each key keeps the instants of its admitted requests. A request that would
/// exceed `max` inside the trailing window suspends the key for one full
/// window, and every request during the suspension is rejected without
/// consuming a slot.
///
/// The check-then-update sequence for a key runs while holding that key's
/// [`DashMap`] shard lock, so concurrent callers on the same key are
/// serialised. Stale timestamps are pruned lazily on access; there is no
/// background reaper.
#[derive(Debug, Default)]
pub struct SlidingWindowLimiter {
    entries: DashMap<String, WindowEntry>,
}

impl SlidingWindowLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a request identified by `key` is allowed.
    pub fn check(&self, key: &str, window: Duration, max: u64) -> RateLimitDecision {
        self.check_at(key, window, max, Instant::now())
    }

    /// [`check`](Self::check) against an explicit clock reading.
    pub fn check_at(&self, key: &str, window: Duration, max: u64, now: Instant) -> RateLimitDecision {
        let mut entry = self.entries.entry(key.to_string()).or_default();
        let state = entry.value_mut();

        if let Some(until) = state.suspended_until {
            if until > now {
                return RateLimitDecision {
                    limit_exceeded: true,
                    remaining: 0,
                    reset_at: until,
                    limit: max,
                };
            }
            state.suspended_until = None;
        }

        // Drop everything at or before the window's left edge.
        if let Some(cutoff) = now.checked_sub(window) {
            while state.timestamps.front().is_some_and(|t| *t <= cutoff) {
                state.timestamps.pop_front();
            }
        }

        let count = state.timestamps.len() as u64;
        if count >= max {
            let until = now + window;
            state.suspended_until = Some(until);
            tracing::warn!(key, count, max, window_ms = window.as_millis() as u64, "rate limit exceeded, key suspended");
            return RateLimitDecision {
                limit_exceeded: true,
                remaining: 0,
                reset_at: until,
                limit: max,
            };
        }

        state.timestamps.push_back(now);
        // The next slot frees when the oldest admitted request leaves the window.
        let oldest = state.timestamps.front().copied().unwrap_or(now);
        RateLimitDecision {
            limit_exceeded: false,
            remaining: max - (count + 1),
            reset_at: oldest + window,
            limit: max,
        }
    }

    /// Forget everything recorded for `key`. Returns `true` if it existed.
    pub fn reset(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn stats(&self) -> LimiterStats {
        self.stats_at(Instant::now())
    }

    pub fn stats_at(&self, now: Instant) -> LimiterStats {
        let mut stats = LimiterStats::default();
        for entry in self.entries.iter() {
            stats.tracked_keys += 1;
            if entry.suspended_until.is_some_and(|until| until > now) {
                stats.suspended_keys += 1;
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn allows_up_to_limit() {
        let limiter = SlidingWindowLimiter::new();
        let now = Instant::now();

        for i in 0..10 {
            let d = limiter.check_at("test-client", MINUTE, 10, now);
            assert!(!d.limit_exceeded, "request {} should be allowed", i);
            assert_eq!(d.remaining, 9 - i);
        }

        assert!(limiter.check_at("test-client", MINUTE, 10, now).limit_exceeded);
    }

    #[test]
    fn penalty_scenario() {
        let limiter = SlidingWindowLimiter::new();
        let start = Instant::now();
        let key = "rl:1.2.3.4";

        let remaining: Vec<u64> = (0..3)
            .map(|_| limiter.check_at(key, MINUTE, 3, start).remaining)
            .collect();
        assert_eq!(remaining, vec![2, 1, 0]);

        let fourth = limiter.check_at(key, MINUTE, 3, start);
        assert!(fourth.limit_exceeded);
        assert_eq!(fourth.remaining, 0);
        assert_eq!(fourth.reset_at, start + MINUTE);

        let fifth = limiter.check_at(key, MINUTE, 3, start + Duration::from_secs(30));
        assert!(fifth.limit_exceeded);
        assert_eq!(fifth.reset_at, fourth.reset_at);
    }

    #[test]
    fn admitted_reset_tracks_oldest_request() {
        let limiter = SlidingWindowLimiter::new();
        let start = Instant::now();

        let first = limiter.check_at("k", MINUTE, 5, start);
        assert_eq!(first.reset_at, start + MINUTE);

        let second = limiter.check_at("k", MINUTE, 5, start + Duration::from_secs(20));
        assert_eq!(second.reset_at, start + MINUTE);

        // Once the first request ages out, the second one governs.
        let third = limiter.check_at("k", MINUTE, 5, start + Duration::from_secs(61));
        assert_eq!(third.reset_at, start + Duration::from_secs(80));
    }

    #[test]
    fn penalty_outlasts_natural_window() {
        let limiter = SlidingWindowLimiter::new();
        let start = Instant::now();

        // Spread admitted requests so the natural window would free a slot
        // before the suspension ends.
        limiter.check_at("k", MINUTE, 2, start);
        limiter.check_at("k", MINUTE, 2, start + Duration::from_secs(10));
        let blocked_at = start + Duration::from_secs(50);
        let blocked = limiter.check_at("k", MINUTE, 2, blocked_at);
        assert!(blocked.limit_exceeded);
        assert_eq!(blocked.reset_at, blocked_at + MINUTE);

        // At start+75s both original timestamps are out of the window, but
        // the suspension runs until start+110s.
        let later = limiter.check_at("k", MINUTE, 2, start + Duration::from_secs(75));
        assert!(later.limit_exceeded);
        assert_eq!(later.reset_at, blocked.reset_at);
    }

    #[test]
    fn suspension_expires() {
        let limiter = SlidingWindowLimiter::new();
        let start = Instant::now();

        limiter.check_at("k", MINUTE, 1, start);
        let blocked = limiter.check_at("k", MINUTE, 1, start);
        assert!(blocked.limit_exceeded);

        let after = limiter.check_at("k", MINUTE, 1, blocked.reset_at + Duration::from_millis(1));
        assert!(!after.limit_exceeded);
        assert_eq!(after.remaining, 0);
    }

    #[test]
    fn suspended_requests_do_not_consume_slots() {
        let limiter = SlidingWindowLimiter::new();
        let start = Instant::now();

        limiter.check_at("k", MINUTE, 2, start);
        limiter.check_at("k", MINUTE, 2, start);
        for s in 1..20 {
            limiter.check_at("k", MINUTE, 2, start + Duration::from_secs(s));
        }

        let entry = limiter.entries.get("k").unwrap();
        assert_eq!(entry.timestamps.len(), 2);
    }

    #[test]
    fn prunes_stale_timestamps() {
        let limiter = SlidingWindowLimiter::new();
        let start = Instant::now();

        limiter.check_at("k", MINUTE, 5, start);
        limiter.check_at("k", MINUTE, 5, start + Duration::from_secs(30));
        let d = limiter.check_at("k", MINUTE, 5, start + Duration::from_secs(61));
        assert!(!d.limit_exceeded);

        let entry = limiter.entries.get("k").unwrap();
        assert_eq!(entry.timestamps.len(), 2);
        assert!(entry.timestamps.iter().all(|t| *t > start));
    }

    #[test]
    fn independent_keys() {
        let limiter = SlidingWindowLimiter::new();
        let now = Instant::now();

        assert!(!limiter.check_at("a", MINUTE, 2, now).limit_exceeded);
        assert!(!limiter.check_at("a", MINUTE, 2, now).limit_exceeded);
        assert!(limiter.check_at("a", MINUTE, 2, now).limit_exceeded);

        // Key B is independent.
        assert!(!limiter.check_at("b", MINUTE, 2, now).limit_exceeded);
    }

    #[test]
    fn reset_clears_suspension() {
        let limiter = SlidingWindowLimiter::new();
        let now = Instant::now();

        limiter.check_at("k", MINUTE, 1, now);
        assert!(limiter.check_at("k", MINUTE, 1, now).limit_exceeded);

        assert!(limiter.reset("k"));
        assert!(!limiter.reset("k"));
        assert!(!limiter.check_at("k", MINUTE, 1, now).limit_exceeded);
    }

    #[test]
    fn stats_count_suspended_keys() {
        let limiter = SlidingWindowLimiter::new();
        let now = Instant::now();

        limiter.check_at("a", MINUTE, 1, now);
        limiter.check_at("a", MINUTE, 1, now);
        limiter.check_at("b", MINUTE, 1, now);

        assert_eq!(
            limiter.stats_at(now),
            LimiterStats {
                tracked_keys: 2,
                suspended_keys: 1
            }
        );
        assert_eq!(limiter.stats_at(now + MINUTE * 2).suspended_keys, 0);
    }

    #[test]
    fn retry_after_rounds_up() {
        let now = Instant::now();
        let decision = RateLimitDecision {
            limit_exceeded: true,
            remaining: 0,
            reset_at: now + Duration::from_millis(1500),
            limit: 1,
        };
        assert_eq!(decision.retry_after_secs(now), 2);
        assert_eq!(decision.retry_after_secs(now + Duration::from_secs(5)), 1);
    }
}
