use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sgn_rate_limit::client_identifier;
use tracing::warn;

use crate::error::{ApiError, RateLimitInfo};
use crate::state::SharedState;

/// Client identity used for rate limit keys.
pub fn client_from_headers(headers: &HeaderMap) -> String {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    client_identifier(header("x-forwarded-for"), header("x-real-ip"))
}

/// Reject requests over their route's quota before any handler runs.
/// Admitted responses carry the `X-RateLimit-*` headers.
pub async fn enforce_rate_limit(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_from_headers(request.headers());
    let path = request.uri().path().to_owned();

    let Some((key, decision)) = state.rate_limiter.check_route(&path, &client) else {
        return next.run(request).await;
    };

    let info = RateLimitInfo::from_decision(&decision, Instant::now());
    if decision.limit_exceeded {
        state.metrics.rate_limited_total.inc();
        warn!(
            key = %key,
            path = %path,
            retry_after_secs = info.retry_after_secs,
            "rate limit exceeded"
        );
        return ApiError::RateLimited(info).into_response();
    }

    let mut response = next.run(request).await;
    info.apply_headers(response.headers_mut());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn client_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("5.6.7.8"));
        assert_eq!(client_from_headers(&headers), "1.2.3.4");
    }

    #[test]
    fn client_defaults_to_anonymous() {
        assert_eq!(client_from_headers(&HeaderMap::new()), "anonymous");
    }
}
