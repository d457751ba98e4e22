//! Idempotency support for analysis requests.
//!
//! A caller-supplied token maps to the response of the first successful
//! request that used it. Reusing the token with a different payload is a
//! protocol violation reported as [`IdempotencyError::Conflict`].

pub mod cache;
pub mod fingerprint;

pub use cache::{IdempotencyCache, IdempotencyError, DEFAULT_TTL};
pub use fingerprint::request_fingerprint;
