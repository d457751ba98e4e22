use dashmap::DashMap;
use sgn_common::AnalysisRequest;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::fingerprint::request_fingerprint;

/// Default lifetime of a stored response.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdempotencyError {
    /// The key was already used with a different request payload.
    #[error("idempotency key '{key}' already used with a different payload")]
    Conflict { key: String },
}

#[derive(Debug, Clone)]
struct IdempotencyEntry<R> {
    request_fingerprint: String,
    response: R,
    created_at: Instant,
}

/// Process-local store of completed responses keyed by idempotency token.
///
/// Entries live for `ttl` after being saved. Expired entries are swept at
/// the start of every lookup rather than by a timer, so an idle process
/// holds memory until the next request arrives.
///
/// Two requests racing on the same fresh key both miss and both reach the
/// provider; the later `save` wins.
#[derive(Debug)]
pub struct IdempotencyCache<R> {
    entries: DashMap<String, IdempotencyEntry<R>>,
    ttl: Duration,
}

impl<R: Clone> IdempotencyCache<R> {
    pub fn new(ttl: Duration) -> Self {
        tracing::info!(ttl_secs = ttl.as_secs(), "creating idempotency cache");
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Return the stored response for `key` if `request` matches the payload
    /// it was saved with.
    ///
    /// Fails with [`IdempotencyError::Conflict`] when the key is live but was
    /// saved for a different payload.
    pub fn get(&self, key: &str, request: &AnalysisRequest) -> Result<Option<R>, IdempotencyError> {
        self.get_at(key, request, Instant::now())
    }

    pub fn get_at(
        &self,
        key: &str,
        request: &AnalysisRequest,
        now: Instant,
    ) -> Result<Option<R>, IdempotencyError> {
        self.purge_expired_at(now);

        let fingerprint = request_fingerprint(request);
        let Some(entry) = self.entries.get(key) else {
            return Ok(None);
        };

        if entry.request_fingerprint != fingerprint {
            tracing::warn!(key, "idempotency key reused with a different payload");
            return Err(IdempotencyError::Conflict {
                key: key.to_string(),
            });
        }

        tracing::debug!(key, "idempotency cache hit");
        Ok(Some(entry.response.clone()))
    }

    /// Store `response` under `key`, replacing any previous entry.
    pub fn save(&self, key: &str, request: &AnalysisRequest, response: R) {
        self.save_at(key, request, response, Instant::now());
    }

    pub fn save_at(&self, key: &str, request: &AnalysisRequest, response: R, now: Instant) {
        let entry = IdempotencyEntry {
            request_fingerprint: request_fingerprint(request),
            response,
            created_at: now,
        };
        if self.entries.insert(key.to_string(), entry).is_some() {
            tracing::debug!(key, "idempotency entry replaced");
        }
    }

    /// Remove every entry older than the TTL. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    fn purge_expired_at(&self, now: Instant) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.created_at) < ttl);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(removed, remaining = self.entries.len(), "expired idempotency entries purged");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl<R: Clone> Default for IdempotencyCache<R> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
