//! Local Ollama backend (`POST /api/chat`).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sgn_common::{AnalysisRequest, AnalysisResponse, ProviderEndpointConfig, ProviderId};
use tracing::{debug, instrument, warn};

use crate::error::ProviderError;
use crate::parse::parse_analysis;
use crate::prompt::{build_prompt, SYSTEM_PROMPT};
use crate::provider::AnalysisProvider;

#[derive(Debug, Serialize)]
struct OllamaMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    format: &'a str,
    options: OllamaOptions,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    message: Option<OllamaResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: String,
}

/// Ollama server running a local model. Needs no credentials.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    endpoint: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(client: Client, config: &ProviderEndpointConfig) -> Self {
        let endpoint = format!("{}/api/chat", config.base_url.trim_end_matches('/'));
        debug!(endpoint = %endpoint, model = %config.model, "creating ollama provider");
        Self {
            client,
            endpoint,
            model: config.model.clone(),
        }
    }
}

#[async_trait]
impl AnalysisProvider for OllamaProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Ollama
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, request), fields(provider = "ollama", model = %self.model))]
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse, ProviderError> {
        let prompt = build_prompt(request);
        let body = OllamaChatRequest {
            model: &self.model,
            messages: vec![
                OllamaMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                OllamaMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            stream: false,
            format: "json",
            options: OllamaOptions { temperature: 0.1 },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(ProviderId::Ollama, &e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "ollama returned error status");
            return Err(ProviderError::http(ProviderId::Ollama, status.as_u16(), text));
        }

        let chat: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::from_reqwest(ProviderId::Ollama, &e))?;

        let content = chat.message.map(|m| m.content).unwrap_or_default();
        debug!(response_chars = content.len(), "received ollama response");

        let mut report = parse_analysis(ProviderId::Ollama, &content)?;
        report.modelo_usado = self.model.clone();
        Ok(report)
    }
}
