//! The analysis pipeline: idempotency lookup, provider dispatch and save.
//!
//! Rate limiting runs earlier, in [`crate::middleware`], so a rejected
//! request never reaches this module.

use std::time::Instant;

use sgn_common::{AnalysisRequest, AnalysisResponse};
use sgn_idempotency::IdempotencyError;
use sgn_providers::{classify, ProviderExecution};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// Result of a successful pass through the pipeline.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub response: AnalysisResponse,
    /// `None` when the response was replayed from the idempotency cache.
    pub execution: Option<ProviderExecution>,
}

impl AnalysisOutcome {
    pub fn replayed(&self) -> bool {
        self.execution.is_none()
    }
}

/// Run a validated request through the idempotency cache and the provider
/// chain.
///
/// A provider failure is returned as-is and never cached. A success is
/// stamped with its timestamp and processing time and saved under
/// `idempotency_key` before being returned.
pub async fn run_analysis(
    state: &AppState,
    idempotency_key: Option<&str>,
    request: &AnalysisRequest,
) -> Result<AnalysisOutcome, ApiError> {
    let started = Instant::now();

    if let Some(key) = idempotency_key {
        match state.idempotency.get(key, request) {
            Ok(Some(response)) => {
                state.metrics.idempotency_hits.inc();
                info!(idempotency_key = key, "replaying cached analysis");
                return Ok(AnalysisOutcome {
                    response,
                    execution: None,
                });
            }
            Ok(None) => {}
            Err(err @ IdempotencyError::Conflict { .. }) => {
                state.metrics.idempotency_conflicts.inc();
                warn!(idempotency_key = key, "idempotency key reused with a different payload");
                return Err(err.into());
            }
        }
    }

    let (mut response, execution) = match state.selector.execute(request).await {
        Ok(result) => result,
        Err(err) => {
            let class = classify(&err);
            state
                .metrics
                .provider_failures
                .with_label_values(&[class.as_str()])
                .inc();
            return Err(err.into());
        }
    };

    let elapsed = started.elapsed();
    state
        .metrics
        .analysis_duration
        .with_label_values(&[execution.provider_used.as_str()])
        .observe(elapsed.as_secs_f64());
    if execution.fallback_triggered {
        state.metrics.fallbacks_total.inc();
    }

    response.timestamp = chrono::Utc::now().to_rfc3339();
    response.tempo_processamento = elapsed.as_millis() as u64;
    if response.modelo_usado.is_empty() {
        response.modelo_usado = state
            .selector
            .model_for(execution.provider_used)
            .map(str::to_owned)
            .unwrap_or_else(|| execution.provider_used.to_string());
    }

    if let Some(key) = idempotency_key {
        state.idempotency.save(key, request, response.clone());
    }

    info!(
        provider = %execution.provider_used,
        fallback_triggered = execution.fallback_triggered,
        tempo_processamento = response.tempo_processamento,
        score = response.score,
        gaps = response.gaps.len(),
        "analysis completed"
    );

    Ok(AnalysisOutcome {
        response,
        execution: Some(execution),
    })
}
