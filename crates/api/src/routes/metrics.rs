use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::Encoder;

use crate::state::SharedState;

/// GET /api/metrics
pub async fn get_metrics(State(state): State<SharedState>) -> impl IntoResponse {
    let encoder = prometheus::TextEncoder::new();
    let families = state.metrics.registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        tracing::error!(error = %e, "failed to encode prometheus metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("failed to encode metrics: {}", e),
        );
    }

    (
        StatusCode::OK,
        [("content-type", prometheus::TEXT_FORMAT)],
        String::from_utf8(buffer).unwrap_or_default(),
    )
}
