use std::time::Instant;

use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use sgn_common::SgnError;
use sgn_idempotency::IdempotencyError;
use sgn_providers::{classify, ProviderError};
use sgn_rate_limit::RateLimitDecision;
use thiserror::Error;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Client-facing view of a rate limit decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limit: u64,
    pub remaining: u64,
    /// Seconds until the window (or suspension) ends, at least 1.
    pub retry_after_secs: u64,
    /// Unix time at which the window (or suspension) ends.
    pub reset_epoch: i64,
}

impl RateLimitInfo {
    pub fn from_decision(decision: &RateLimitDecision, now: Instant) -> Self {
        let retry_after_secs = decision.retry_after_secs(now);
        Self {
            limit: decision.limit,
            remaining: decision.remaining,
            retry_after_secs,
            reset_epoch: chrono::Utc::now().timestamp() + retry_after_secs as i64,
        }
    }

    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(self.limit));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(self.remaining));
        headers.insert(X_RATELIMIT_RESET, HeaderValue::from(self.reset_epoch));
    }
}

/// Every failure the HTTP layer can report.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("rate limit exceeded, retry in {}s", .0.retry_after_secs)]
    RateLimited(RateLimitInfo),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Conflict(#[from] IdempotencyError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl From<SgnError> for ApiError {
    fn from(err: SgnError) -> Self {
        match err {
            SgnError::Validation(msg) | SgnError::Config(msg) => ApiError::Validation(msg),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Provider(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let timestamp = chrono::Utc::now().to_rfc3339();

        let body = match &self {
            ApiError::RateLimited(info) => json!({
                "success": false,
                "error": "Limite de requisições excedido",
                "message": format!("Tente novamente em {} segundos", info.retry_after_secs),
                "retryAfter": info.retry_after_secs,
                "timestamp": timestamp,
            }),
            ApiError::Validation(msg) => json!({
                "success": false,
                "error": "Dados de entrada inválidos",
                "message": msg,
                "timestamp": timestamp,
            }),
            ApiError::Conflict(err) => json!({
                "success": false,
                "error": "Conflito de idempotência",
                "message": err.to_string(),
                "timestamp": timestamp,
            }),
            // Provider payloads can carry prompts or keys; only the class leaves.
            ApiError::Provider(err) => json!({
                "success": false,
                "error": "Serviço de análise indisponível",
                "message": "Os provedores de IA não conseguiram processar a análise. Tente novamente mais tarde.",
                "errorClass": classify(err),
                "timestamp": timestamp,
            }),
        };

        let mut response = (status, Json(body)).into_response();
        if let ApiError::RateLimited(info) = &self {
            let headers = response.headers_mut();
            headers.insert(
                axum::http::header::RETRY_AFTER,
                HeaderValue::from(info.retry_after_secs),
            );
            info.apply_headers(headers);
        }
        response
    }
}
