use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::SharedState;

/// GET /api/health
///
/// Uptime, version and the provider chain in effect.
pub async fn health_check(State(state): State<SharedState>) -> Json<Value> {
    let selector = &state.selector;

    Json(json!({
        "status": "healthy",
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
        "providers": {
            "primary": selector.primary(),
            "secondary": selector.secondary(),
            "override": selector.forced(),
            "secondary_credentials": selector.has_secondary_credentials(),
            "timeout_secs": selector.timeout().as_secs(),
        }
    }))
}
