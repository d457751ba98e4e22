use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::SharedState;

/// GET /api/rate-limit/stats
///
/// Limiter occupancy, configured route rules and idempotency cache size.
pub async fn get_stats(State(state): State<SharedState>) -> Json<Value> {
    let stats = state.rate_limiter.stats();
    let rules: Vec<Value> = state
        .rate_limiter
        .rules()
        .iter()
        .map(|rule| {
            json!({
                "name": rule.name,
                "pathPrefix": rule.path_prefix,
                "windowSecs": rule.window.as_secs(),
                "max": rule.max,
            })
        })
        .collect();

    Json(json!({
        "success": true,
        "data": {
            "trackedKeys": stats.tracked_keys,
            "suspendedKeys": stats.suspended_keys,
            "rules": rules,
            "rateLimitedTotal": state.metrics.rate_limited_total.get(),
            "idempotencyEntries": state.idempotency.len(),
        }
    }))
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub key: String,
}

/// POST /api/rate-limit/reset
///
/// Clear the counters and any suspension for a fully qualified key such as
/// `ia:1.2.3.4`.
pub async fn reset_key(
    State(state): State<SharedState>,
    Json(body): Json<ResetRequest>,
) -> impl IntoResponse {
    let key = body.key.trim();
    if key.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "error": "Dados de entrada inválidos",
                "message": "key must not be empty",
            })),
        );
    }

    let removed = state.rate_limiter.reset(key);
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "data": { "key": key, "removed": removed },
        })),
    )
}
