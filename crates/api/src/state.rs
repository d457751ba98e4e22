use std::sync::Arc;
use std::time::{Duration, Instant};

use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};
use sgn_common::{AnalysisResponse, AppConfig, SgnResult};
use sgn_idempotency::IdempotencyCache;
use sgn_providers::ProviderSelector;
use sgn_rate_limit::RateLimiter;

/// Shared state type alias used across all route handlers.
pub type SharedState = Arc<AppState>;

/// Everything a request needs, built once at startup.
pub struct AppState {
    pub config: AppConfig,
    pub rate_limiter: RateLimiter,
    pub idempotency: IdempotencyCache<AnalysisResponse>,
    pub selector: ProviderSelector,
    pub metrics: GatewayMetrics,
    pub start_time: Instant,
}

/// Prometheus metrics collected by the gateway.
pub struct GatewayMetrics {
    pub registry: Registry,
    pub requests_total: IntCounter,
    pub rate_limited_total: IntCounter,
    pub idempotency_hits: IntCounter,
    pub idempotency_conflicts: IntCounter,
    pub fallbacks_total: IntCounter,
    pub provider_failures: IntCounterVec,
    pub analysis_duration: HistogramVec,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let requests_total = IntCounter::with_opts(Opts::new(
            "sgn_analysis_requests_total",
            "Total number of analysis requests received",
        ))
        .expect("failed to create requests_total counter");

        let rate_limited_total = IntCounter::with_opts(Opts::new(
            "sgn_rate_limited_total",
            "Total number of requests rejected by the rate limiter",
        ))
        .expect("failed to create rate_limited_total counter");

        let idempotency_hits = IntCounter::with_opts(Opts::new(
            "sgn_idempotency_hits_total",
            "Responses replayed from the idempotency cache",
        ))
        .expect("failed to create idempotency_hits counter");

        let idempotency_conflicts = IntCounter::with_opts(Opts::new(
            "sgn_idempotency_conflicts_total",
            "Idempotency keys reused with a different payload",
        ))
        .expect("failed to create idempotency_conflicts counter");

        let fallbacks_total = IntCounter::with_opts(Opts::new(
            "sgn_provider_fallbacks_total",
            "Analyses answered by the secondary provider",
        ))
        .expect("failed to create fallbacks_total counter");

        let provider_failures = IntCounterVec::new(
            Opts::new(
                "sgn_provider_failures_total",
                "Analyses that failed after provider selection, by error class",
            ),
            &["class"],
        )
        .expect("failed to create provider_failures counter");

        let analysis_duration = HistogramVec::new(
            HistogramOpts::new(
                "sgn_analysis_duration_seconds",
                "Provider analysis duration in seconds",
            )
            .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 90.0, 120.0]),
            &["provider"],
        )
        .expect("failed to create analysis_duration histogram");

        registry.register(Box::new(requests_total.clone())).expect("failed to register requests_total");
        registry.register(Box::new(rate_limited_total.clone())).expect("failed to register rate_limited_total");
        registry.register(Box::new(idempotency_hits.clone())).expect("failed to register idempotency_hits");
        registry
            .register(Box::new(idempotency_conflicts.clone()))
            .expect("failed to register idempotency_conflicts");
        registry.register(Box::new(fallbacks_total.clone())).expect("failed to register fallbacks_total");
        registry.register(Box::new(provider_failures.clone())).expect("failed to register provider_failures");
        registry.register(Box::new(analysis_duration.clone())).expect("failed to register analysis_duration");

        Self {
            registry,
            requests_total,
            rate_limited_total,
            idempotency_hits,
            idempotency_conflicts,
            fallbacks_total,
            provider_failures,
            analysis_duration,
        }
    }
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    /// Assemble state around an already-built selector.
    pub fn new(config: AppConfig, selector: ProviderSelector) -> Self {
        Self {
            rate_limiter: RateLimiter::from_config(&config.rate_limit),
            idempotency: IdempotencyCache::new(Duration::from_secs(config.idempotency.ttl_secs)),
            selector,
            metrics: GatewayMetrics::new(),
            start_time: Instant::now(),
            config,
        }
    }

    /// Build the provider chain from `config.providers` and assemble state.
    pub fn from_config(config: AppConfig) -> SgnResult<Self> {
        let selector = ProviderSelector::from_config(&config.providers)?;
        Ok(Self::new(config, selector))
    }
}
