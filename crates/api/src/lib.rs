pub mod error;
pub mod handler;
pub mod middleware;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::{ApiError, RateLimitInfo};
pub use handler::{run_analysis, AnalysisOutcome};
pub use state::{AppState, GatewayMetrics, SharedState};

/// Build the gateway router.
///
/// Health and metrics sit outside the rate limiter so health checks and scrapers
/// are never throttled.
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = state.config.server.request_body_limit;

    let limited = Router::new()
        .route(
            "/api/ia/analisar-conformidade",
            post(routes::analysis::analyze_compliance),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::enforce_rate_limit,
        ));

    Router::new()
        .route("/api/health", get(routes::health::health_check))
        .route("/api/metrics", get(routes::metrics::get_metrics))
        .merge(limited)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Build the operational router: rate limit stats and reset.
///
/// Served on `server.admin_listen` only, never merged into the public router.
pub fn build_admin_router(state: SharedState) -> Router {
    Router::new()
        .route("/api/rate-limit/stats", get(routes::rate_limit::get_stats))
        .route("/api/rate-limit/reset", post(routes::rate_limit::reset_key))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve the gateway on `listen_addr` until the process is stopped.
pub async fn run_server(state: SharedState, listen_addr: &str) -> anyhow::Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!("compliance gateway listening on {}", listen_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Serve the admin router on `listen_addr` until the process is stopped.
pub async fn run_admin_server(state: SharedState, listen_addr: &str) -> anyhow::Result<()> {
    let app = build_admin_router(state);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!("admin API listening on {}", listen_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Build shared state, including the provider chain, from configuration.
pub fn new_shared_state(config: sgn_common::AppConfig) -> sgn_common::SgnResult<SharedState> {
    Ok(Arc::new(AppState::from_config(config)?))
}
