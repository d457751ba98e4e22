//! Provider failure classification.
//!
//! Everything here is a pure function of the error value so the fallback
//! policy can be tested against synthetic errors.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

use crate::error::{ProviderError, ProviderErrorKind};

static STATUS_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(4\d{2}|5\d{2})\b").expect("valid status regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    RateLimit,
    Timeout,
    Network,
    #[serde(rename = "provider_5xx")]
    Provider5xx,
    Auth,
    #[serde(rename = "provider_4xx")]
    Provider4xx,
    InvalidJson,
    SchemaValidation,
    ForcedFallback,
    Unknown,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::RateLimit => "rate_limit",
            ErrorClass::Timeout => "timeout",
            ErrorClass::Network => "network",
            ErrorClass::Provider5xx => "provider_5xx",
            ErrorClass::Auth => "auth",
            ErrorClass::Provider4xx => "provider_4xx",
            ErrorClass::InvalidJson => "invalid_json",
            ErrorClass::SchemaValidation => "schema_validation",
            ErrorClass::ForcedFallback => "forced_fallback",
            ErrorClass::Unknown => "unknown",
        }
    }

    /// Whether this class means the provider itself is unavailable or
    /// overloaded, so a different provider may succeed.
    pub fn allows_fallback(&self) -> bool {
        matches!(
            self,
            ErrorClass::RateLimit
                | ErrorClass::Timeout
                | ErrorClass::Network
                | ErrorClass::Provider5xx
                | ErrorClass::ForcedFallback
        )
    }

    /// Whether a lower-level client may retry the same provider.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorClass::RateLimit | ErrorClass::Timeout | ErrorClass::Network | ErrorClass::Provider5xx
        )
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a provider failure.
///
/// Structured kinds map directly; HTTP and uncategorised failures go through
/// [`classify_message`] with the known status.
pub fn classify(error: &ProviderError) -> ErrorClass {
    match error.kind {
        ProviderErrorKind::Timeout => ErrorClass::Timeout,
        ProviderErrorKind::Network => ErrorClass::Network,
        ProviderErrorKind::MissingCredentials => ErrorClass::Auth,
        ProviderErrorKind::InvalidJson => ErrorClass::InvalidJson,
        ProviderErrorKind::Schema => ErrorClass::SchemaValidation,
        ProviderErrorKind::Http { status } => classify_with_status(&error.message, Some(status)),
        ProviderErrorKind::Other => classify_message(&error.message),
    }
}

/// Whether the selector should retry `error` against the secondary provider.
pub fn should_fallback(error: &ProviderError) -> bool {
    classify(error).allows_fallback()
}

/// Classify from message text alone, inferring an HTTP status from the
/// first `4xx`/`5xx` number in it.
pub fn classify_message(message: &str) -> ErrorClass {
    classify_with_status(message, None)
}

fn classify_with_status(message: &str, status: Option<u16>) -> ErrorClass {
    let msg = message.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| msg.contains(n));

    if has(&["force_zai", "force fallback"]) {
        return ErrorClass::ForcedFallback;
    }

    // Provider quota errors (TPM, payload too large) surface with 413/429
    // or only in the body text.
    if status == Some(429)
        || status == Some(413)
        || has(&["413", "429", "rate limit", "rate_limit", "tpm", "tokens"])
    {
        return ErrorClass::RateLimit;
    }

    if has(&["timeout", "timed out", "aborted due to timeout", "aborterror"]) {
        return ErrorClass::Timeout;
    }

    if has(&[
        "network",
        "econnreset",
        "enotfound",
        "eai_again",
        "fetch failed",
        "connection refused",
        "connection reset",
        "dns error",
    ]) {
        return ErrorClass::Network;
    }

    let status = status.or_else(|| infer_status(&msg));
    match status {
        Some(s) if s >= 500 => return ErrorClass::Provider5xx,
        Some(401) | Some(403) => return ErrorClass::Auth,
        Some(s) if s >= 400 => return ErrorClass::Provider4xx,
        _ => {}
    }

    if msg.contains("json") && has(&["parse", "unexpected"]) {
        return ErrorClass::InvalidJson;
    }

    if has(&["schema"]) {
        return ErrorClass::SchemaValidation;
    }

    ErrorClass::Unknown
}

fn infer_status(message: &str) -> Option<u16> {
    STATUS_CODE
        .captures(message)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
