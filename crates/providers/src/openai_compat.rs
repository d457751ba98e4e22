//! Client for OpenAI-compatible chat completion APIs (Groq, Z.AI).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sgn_common::{AnalysisRequest, AnalysisResponse, ProviderEndpointConfig, ProviderId};
use tracing::{debug, error, instrument};

use crate::error::ProviderError;
use crate::parse::parse_analysis;
use crate::prompt::{build_prompt, SYSTEM_PROMPT};
use crate::provider::AnalysisProvider;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Sampling parameters sent with every completion.
#[derive(Debug, Clone, Copy)]
pub struct Sampling {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
}

impl Sampling {
    pub const GROQ: Sampling = Sampling {
        temperature: 0.3,
        max_tokens: 4000,
        top_p: 0.9,
    };

    pub const ZAI: Sampling = Sampling {
        temperature: 0.1,
        max_tokens: 4096,
        top_p: 0.8,
    };
}

/// Analysis provider backed by `POST {base_url}/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAiCompatProvider {
    client: Client,
    id: ProviderId,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    sampling: Sampling,
}

impl OpenAiCompatProvider {
    pub fn new(
        client: Client,
        id: ProviderId,
        config: &ProviderEndpointConfig,
        sampling: Sampling,
    ) -> Self {
        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
        debug!(provider = %id, endpoint = %endpoint, model = %config.model, "creating chat completions provider");
        Self {
            client,
            id,
            endpoint,
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            sampling,
        }
    }

    pub fn groq(client: Client, config: &ProviderEndpointConfig) -> Self {
        Self::new(client, ProviderId::Groq, config, Sampling::GROQ)
    }

    pub fn zai(client: Client, config: &ProviderEndpointConfig) -> Self {
        Self::new(client, ProviderId::Zai, config, Sampling::ZAI)
    }
}

#[async_trait]
impl AnalysisProvider for OpenAiCompatProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, request), fields(provider = %self.id, model = %self.model))]
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::missing_credentials(self.id))?;

        let prompt = build_prompt(request);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: self.sampling.temperature,
            max_tokens: self.sampling.max_tokens,
            top_p: self.sampling.top_p,
        };

        debug!(prompt_chars = prompt.len(), "sending chat completion request");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(self.id, &e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "chat completion returned error status");
            return Err(ProviderError::http(self.id, status.as_u16(), text));
        }

        let completion: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::from_reqwest(self.id, &e))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        let mut report = parse_analysis(self.id, &content)?;
        report.modelo_usado = self.model.clone();
        Ok(report)
    }
}
