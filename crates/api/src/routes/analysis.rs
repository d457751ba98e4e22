use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use sgn_common::AnalysisRequest;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::handler::run_analysis;
use crate::state::SharedState;

pub const IDEMPOTENCY_KEY: HeaderName = HeaderName::from_static("idempotency-key");
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// POST /api/ia/analisar-conformidade
///
/// The body is taken raw so that malformed JSON is reported as a 400 in the
/// gateway's envelope, after the rate limiter has already counted it.
pub async fn analyze_compliance(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = header_str(&headers, &X_REQUEST_ID)
        .map(str::to_owned)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let idempotency_key = header_str(&headers, &IDEMPOTENCY_KEY);

    state.metrics.requests_total.inc();
    info!(request_id = %request_id, idempotency_key = ?idempotency_key, "compliance analysis started");

    let mut response = match analyze(&state, idempotency_key, &body).await {
        Ok(response) => response,
        Err(err) => {
            warn!(request_id = %request_id, status = err.status().as_u16(), error = %err, "compliance analysis failed");
            err.into_response()
        }
    };

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}

async fn analyze(
    state: &SharedState,
    idempotency_key: Option<&str>,
    body: &[u8],
) -> Result<Response, ApiError> {
    let request: AnalysisRequest = serde_json::from_slice(body)
        .map_err(|e| ApiError::Validation(format!("corpo da requisição inválido: {}", e)))?;
    request.validate()?;

    let outcome = run_analysis(state, idempotency_key, &request).await?;
    let message = if outcome.replayed() {
        "Resultado retornado via idempotência"
    } else {
        "Análise de conformidade concluída com sucesso"
    };

    let body = json!({
        "success": true,
        "data": outcome.response,
        "message": message,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });
    Ok((StatusCode::OK, Json(body)).into_response())
}

/// Non-blank header value.
fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
