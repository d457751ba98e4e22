use reqwest::Client;
use serde::Serialize;
use sgn_common::{AnalysisRequest, AnalysisResponse, ProviderId, ProvidersConfig, SgnError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::classify::classify;
use crate::error::ProviderError;
use crate::ollama::OllamaProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::provider::AnalysisProvider;

/// Which provider produced a response and whether fallback was involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderExecution {
    pub provider_used: ProviderId,
    pub fallback_triggered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_from: Option<ProviderId>,
}

impl ProviderExecution {
    fn direct(provider: ProviderId) -> Self {
        Self {
            provider_used: provider,
            fallback_triggered: false,
            fallback_from: None,
        }
    }

    fn fallback(provider: ProviderId, from: ProviderId) -> Self {
        Self {
            provider_used: provider,
            fallback_triggered: true,
            fallback_from: Some(from),
        }
    }
}

/// Plain values resolved once at startup.
#[derive(Debug, Clone, Copy)]
pub struct SelectorSettings {
    /// Backend to call unconditionally. `None` or the primary's id selects
    /// the primary-with-fallback path.
    pub override_provider: Option<ProviderId>,
    /// Whether the secondary provider has credentials configured.
    pub secondary_credentials: bool,
    /// Upper bound on every provider call.
    pub timeout: Duration,
}

/// Dispatches an analysis to the primary provider, falling back to the
/// secondary once when the primary failure is provider-side.
pub struct ProviderSelector {
    primary: Arc<dyn AnalysisProvider>,
    secondary: Arc<dyn AnalysisProvider>,
    /// Resolved override backend, if one other than the primary is set.
    forced: Option<Arc<dyn AnalysisProvider>>,
    extra: Vec<Arc<dyn AnalysisProvider>>,
    secondary_credentials: bool,
    timeout: Duration,
}

impl ProviderSelector {
    /// Wire a selector from backends. `extra` holds backends reachable only
    /// through the override setting.
    pub fn new(
        primary: Arc<dyn AnalysisProvider>,
        secondary: Arc<dyn AnalysisProvider>,
        extra: Vec<Arc<dyn AnalysisProvider>>,
        settings: SelectorSettings,
    ) -> Result<Self, SgnError> {
        let forced = match settings.override_provider {
            None => None,
            Some(id) if id == primary.id() => None,
            Some(id) => {
                let backend = std::iter::once(&secondary)
                    .chain(extra.iter())
                    .find(|p| p.id() == id)
                    .cloned()
                    .ok_or_else(|| {
                        SgnError::Config(format!("override provider '{}' is not registered", id))
                    })?;
                Some(backend)
            }
        };

        info!(
            primary = %primary.id(),
            secondary = %secondary.id(),
            override_provider = ?forced.as_ref().map(|p| p.id()),
            has_secondary_key = settings.secondary_credentials,
            timeout_ms = settings.timeout.as_millis() as u64,
            "provider selector configured"
        );

        Ok(Self {
            primary,
            secondary,
            forced,
            extra,
            secondary_credentials: settings.secondary_credentials,
            timeout: settings.timeout,
        })
    }

    /// Build the standard Groq → Z.AI chain, with Ollama available by
    /// override.
    pub fn from_config(config: &ProvidersConfig) -> Result<Self, SgnError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SgnError::Config(format!("failed to build HTTP client: {}", e)))?;

        let primary: Arc<dyn AnalysisProvider> =
            Arc::new(OpenAiCompatProvider::groq(client.clone(), &config.groq));
        let secondary: Arc<dyn AnalysisProvider> =
            Arc::new(OpenAiCompatProvider::zai(client.clone(), &config.zai));
        let ollama: Arc<dyn AnalysisProvider> = Arc::new(OllamaProvider::new(client, &config.ollama));

        Self::new(
            primary,
            secondary,
            vec![ollama],
            SelectorSettings {
                override_provider: config.override_provider,
                secondary_credentials: config.zai.has_credentials(),
                timeout: Duration::from_secs(config.timeout_secs),
            },
        )
    }

    /// Run `request` through the provider chain.
    pub async fn execute(
        &self,
        request: &AnalysisRequest,
    ) -> Result<(AnalysisResponse, ProviderExecution), ProviderError> {
        if let Some(forced) = &self.forced {
            info!(provider = %forced.id(), "dispatching to override provider");
            let response = self.call(forced.as_ref(), request).await.map_err(|e| {
                error!(provider = %forced.id(), error_class = %classify(&e), error = %e, "override provider failed");
                e
            })?;
            return Ok((response, ProviderExecution::direct(forced.id())));
        }

        let primary = self.primary.id();
        let err = match self.call(self.primary.as_ref(), request).await {
            Ok(response) => {
                info!(provider = %primary, fallback_triggered = false, "primary provider succeeded");
                return Ok((response, ProviderExecution::direct(primary)));
            }
            Err(err) => err,
        };

        let secondary = self.secondary.id();
        let error_class = classify(&err);
        let should_fallback = error_class.allows_fallback();

        warn!(
            provider = %primary,
            fallback_provider = %secondary,
            error_class = %error_class,
            error = %err,
            should_fallback,
            has_secondary_key = self.secondary_credentials,
            "primary provider failed"
        );

        if !should_fallback {
            return Err(err);
        }
        if !self.secondary_credentials {
            error!(
                provider = %primary,
                fallback_provider = %secondary,
                error_class = %error_class,
                "fallback requested but secondary provider has no credentials"
            );
            return Err(err);
        }

        info!(
            provider = %primary,
            fallback_provider = %secondary,
            error_class = %error_class,
            "executing fallback"
        );

        match self.call(self.secondary.as_ref(), request).await {
            Ok(response) => {
                info!(provider = %secondary, fallback_triggered = true, fallback_from = %primary, "fallback provider succeeded");
                Ok((response, ProviderExecution::fallback(secondary, primary)))
            }
            Err(fallback_err) => {
                error!(
                    provider = %secondary,
                    error_class = %classify(&fallback_err),
                    error = %fallback_err,
                    "fallback provider failed"
                );
                Err(fallback_err)
            }
        }
    }

    async fn call(
        &self,
        provider: &dyn AnalysisProvider,
        request: &AnalysisRequest,
    ) -> Result<AnalysisResponse, ProviderError> {
        match tokio::time::timeout(self.timeout, provider.analyze(request)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::timeout(provider.id(), self.timeout)),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn primary(&self) -> ProviderId {
        self.primary.id()
    }

    pub fn secondary(&self) -> ProviderId {
        self.secondary.id()
    }

    /// The backend every request is pinned to, if any.
    pub fn forced(&self) -> Option<ProviderId> {
        self.forced.as_ref().map(|p| p.id())
    }

    pub fn has_secondary_credentials(&self) -> bool {
        self.secondary_credentials
    }

    /// Configured model name of a registered backend.
    pub fn model_for(&self, id: ProviderId) -> Option<&str> {
        [&self.primary, &self.secondary]
            .into_iter()
            .chain(self.extra.iter())
            .find(|p| p.id() == id)
            .map(|p| p.model_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorKind;
    use async_trait::async_trait;
    use sgn_common::RiskLevel;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behavior {
        Succeed,
        Fail(ProviderErrorKind, &'static str),
        Hang,
    }

    struct MockProvider {
        id: ProviderId,
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl MockProvider {
        fn new(id: ProviderId, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                id,
                behavior,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AnalysisProvider for MockProvider {
        fn id(&self) -> ProviderId {
            self.id
        }

        fn model_name(&self) -> &str {
            "mock"
        }

        async fn analyze(&self, _request: &AnalysisRequest) -> Result<AnalysisResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::Succeed => Ok(AnalysisResponse {
                    score: 80.0,
                    nivel_risco: RiskLevel::Baixo,
                    gaps: vec![],
                    resumo: self.id.to_string(),
                    pontos_positivos: vec![],
                    pontos_atencao: vec![],
                    proximos_passos: vec![],
                    timestamp: String::new(),
                    modelo_usado: "mock".to_string(),
                    tempo_processamento: 0,
                }),
                Behavior::Fail(kind, msg) => Err(ProviderError::new(self.id, kind.clone(), *msg)),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    unreachable!("timeout should have fired")
                }
            }
        }
    }

    fn settings(override_provider: Option<ProviderId>, secondary_credentials: bool) -> SelectorSettings {
        SelectorSettings {
            override_provider,
            secondary_credentials,
            timeout: Duration::from_millis(200),
        }
    }

    fn selector(
        primary: &Arc<MockProvider>,
        secondary: &Arc<MockProvider>,
        settings: SelectorSettings,
    ) -> ProviderSelector {
        ProviderSelector::new(primary.clone(), secondary.clone(), vec![], settings).unwrap()
    }

    fn request() -> AnalysisRequest {
        AnalysisRequest::new("doc", "PGR")
    }

    #[test]
    fn model_for_covers_every_registered_backend() {
        let groq = MockProvider::new(ProviderId::Groq, Behavior::Succeed);
        let zai = MockProvider::new(ProviderId::Zai, Behavior::Succeed);
        let ollama = MockProvider::new(ProviderId::Ollama, Behavior::Succeed);

        let with_extra = ProviderSelector::new(
            groq.clone(),
            zai.clone(),
            vec![ollama as Arc<dyn AnalysisProvider>],
            settings(None, true),
        )
        .unwrap();
        assert_eq!(with_extra.model_for(ProviderId::Groq), Some("mock"));
        assert_eq!(with_extra.model_for(ProviderId::Zai), Some("mock"));
        assert_eq!(with_extra.model_for(ProviderId::Ollama), Some("mock"));

        let without_extra = selector(&groq, &zai, settings(None, true));
        assert_eq!(without_extra.model_for(ProviderId::Ollama), None);
    }

    #[tokio::test]
    async fn primary_success() {
        let groq = MockProvider::new(ProviderId::Groq, Behavior::Succeed);
        let zai = MockProvider::new(ProviderId::Zai, Behavior::Succeed);

        let (resp, exec) = selector(&groq, &zai, settings(None, true))
            .execute(&request())
            .await
            .unwrap();

        assert_eq!(resp.resumo, "groq");
        assert_eq!(exec, ProviderExecution::direct(ProviderId::Groq));
        assert_eq!(zai.calls(), 0);
    }

    #[tokio::test]
    async fn falls_back_on_fallback_eligible_failures() {
        let cases = [
            (ProviderErrorKind::Http { status: 429 }, "HTTP 429: rate limit"),
            (ProviderErrorKind::Timeout, "timed out"),
            (ProviderErrorKind::Network, "connection refused"),
            (ProviderErrorKind::Http { status: 503 }, "HTTP 503: overloaded"),
        ];

        for (kind, msg) in cases {
            let groq = MockProvider::new(ProviderId::Groq, Behavior::Fail(kind.clone(), msg));
            let zai = MockProvider::new(ProviderId::Zai, Behavior::Succeed);

            let (resp, exec) = selector(&groq, &zai, settings(None, true))
                .execute(&request())
                .await
                .unwrap();

            assert_eq!(resp.resumo, "zai", "{:?}", kind);
            assert_eq!(exec, ProviderExecution::fallback(ProviderId::Zai, ProviderId::Groq));
            assert_eq!(zai.calls(), 1);
        }
    }

    #[tokio::test]
    async fn non_eligible_failure_propagates_untouched() {
        for credentials in [true, false] {
            let groq = MockProvider::new(
                ProviderId::Groq,
                Behavior::Fail(ProviderErrorKind::Http { status: 400 }, "HTTP 400: malformed request"),
            );
            let zai = MockProvider::new(ProviderId::Zai, Behavior::Succeed);

            let err = selector(&groq, &zai, settings(None, credentials))
                .execute(&request())
                .await
                .unwrap_err();

            assert_eq!(err.provider, ProviderId::Groq);
            assert_eq!(err.kind, ProviderErrorKind::Http { status: 400 });
            assert_eq!(err.message, "HTTP 400: malformed request");
            assert_eq!(zai.calls(), 0);
        }
    }

    #[tokio::test]
    async fn missing_secondary_credentials_propagates_primary_error() {
        let groq = MockProvider::new(ProviderId::Groq, Behavior::Fail(ProviderErrorKind::Timeout, "timed out"));
        let zai = MockProvider::new(ProviderId::Zai, Behavior::Succeed);

        let err = selector(&groq, &zai, settings(None, false))
            .execute(&request())
            .await
            .unwrap_err();

        assert_eq!(err.provider, ProviderId::Groq);
        assert_eq!(zai.calls(), 0);
    }

    #[tokio::test]
    async fn secondary_failure_is_propagated() {
        let groq = MockProvider::new(ProviderId::Groq, Behavior::Fail(ProviderErrorKind::Network, "reset"));
        let zai = MockProvider::new(
            ProviderId::Zai,
            Behavior::Fail(ProviderErrorKind::Http { status: 502 }, "HTTP 502: bad gateway"),
        );

        let err = selector(&groq, &zai, settings(None, true))
            .execute(&request())
            .await
            .unwrap_err();

        assert_eq!(err.provider, ProviderId::Zai);
        assert_eq!(groq.calls(), 1);
        assert_eq!(zai.calls(), 1);
    }

    #[tokio::test]
    async fn hanging_primary_times_out_and_falls_back() {
        let groq = MockProvider::new(ProviderId::Groq, Behavior::Hang);
        let zai = MockProvider::new(ProviderId::Zai, Behavior::Succeed);

        let (_, exec) = selector(&groq, &zai, settings(None, true))
            .execute(&request())
            .await
            .unwrap();

        assert!(exec.fallback_triggered);
        assert_eq!(exec.fallback_from, Some(ProviderId::Groq));
    }

    #[tokio::test]
    async fn hanging_primary_without_fallback_reports_timeout() {
        let groq = MockProvider::new(ProviderId::Groq, Behavior::Hang);
        let zai = MockProvider::new(ProviderId::Zai, Behavior::Succeed);

        let err = selector(&groq, &zai, settings(None, false))
            .execute(&request())
            .await
            .unwrap_err();

        assert_eq!(err.kind, ProviderErrorKind::Timeout);
    }

    #[tokio::test]
    async fn override_calls_backend_directly() {
        let groq = MockProvider::new(ProviderId::Groq, Behavior::Succeed);
        let zai = MockProvider::new(ProviderId::Zai, Behavior::Succeed);
        let ollama = MockProvider::new(ProviderId::Ollama, Behavior::Succeed);

        let selector = ProviderSelector::new(
            groq.clone(),
            zai.clone(),
            vec![ollama.clone() as Arc<dyn AnalysisProvider>],
            settings(Some(ProviderId::Ollama), true),
        )
        .unwrap();

        let (_, exec) = selector.execute(&request()).await.unwrap();
        assert_eq!(exec, ProviderExecution::direct(ProviderId::Ollama));
        assert_eq!(groq.calls(), 0);
        assert_eq!(ollama.calls(), 1);
    }

    #[tokio::test]
    async fn override_failure_does_not_fall_back() {
        let groq = MockProvider::new(ProviderId::Groq, Behavior::Succeed);
        let zai = MockProvider::new(ProviderId::Zai, Behavior::Fail(ProviderErrorKind::Timeout, "timed out"));

        let err = selector(&groq, &zai, settings(Some(ProviderId::Zai), true))
            .execute(&request())
            .await
            .unwrap_err();

        assert_eq!(err.provider, ProviderId::Zai);
        assert_eq!(groq.calls(), 0);
    }

    #[tokio::test]
    async fn override_to_primary_keeps_fallback_path() {
        let groq = MockProvider::new(ProviderId::Groq, Behavior::Fail(ProviderErrorKind::Timeout, "timed out"));
        let zai = MockProvider::new(ProviderId::Zai, Behavior::Succeed);

        let (_, exec) = selector(&groq, &zai, settings(Some(ProviderId::Groq), true))
            .execute(&request())
            .await
            .unwrap();

        assert!(exec.fallback_triggered);
    }

    #[test]
    fn unregistered_override_is_rejected() {
        let groq = MockProvider::new(ProviderId::Groq, Behavior::Succeed);
        let zai = MockProvider::new(ProviderId::Zai, Behavior::Succeed);

        let result = ProviderSelector::new(groq, zai, vec![], settings(Some(ProviderId::Ollama), true));
        assert!(matches!(result, Err(SgnError::Config(_))));
    }

    #[test]
    fn execution_serializes_camel_case() {
        let json = serde_json::to_value(ProviderExecution::fallback(ProviderId::Zai, ProviderId::Groq)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"providerUsed": "zai", "fallbackTriggered": true, "fallbackFrom": "groq"})
        );
        let json = serde_json::to_value(ProviderExecution::direct(ProviderId::Groq)).unwrap();
        assert!(json.get("fallbackFrom").is_none());
    }
}
