//! Wire types for compliance analysis requests and reports.
//!
//! Field names follow the public JSON contract (`documento`, `tipoDocumento`,
//! ...), so every struct is `camelCase` on the wire.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{SgnError, SgnResult};

/// Upper bound on document length, in characters.
pub const MAX_DOCUMENT_CHARS: usize = 2_000_000;

/// Closed set of AI backends the gateway can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Groq,
    Zai,
    Ollama,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Groq => "groq",
            ProviderId::Zai => "zai",
            ProviderId::Ollama => "ollama",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = SgnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "groq" => Ok(ProviderId::Groq),
            "zai" => Ok(ProviderId::Zai),
            "ollama" => Ok(ProviderId::Ollama),
            other => Err(SgnError::Config(format!("unknown provider '{}'", other))),
        }
    }
}

/// Four-step scale shared by request priority and gap severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Baixa,
    Media,
    Alta,
    Critica,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Baixo,
    Medio,
    Alto,
    Critico,
}

/// Inbound compliance analysis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub documento: String,
    pub tipo_documento: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normas_aplicaveis: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prioridade: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empresa_id: Option<String>,
}

impl AnalysisRequest {
    pub fn new(documento: impl Into<String>, tipo_documento: impl Into<String>) -> Self {
        Self {
            documento: documento.into(),
            tipo_documento: tipo_documento.into(),
            normas_aplicaveis: None,
            prioridade: None,
            empresa_id: None,
        }
    }

    pub fn with_norms<I, S>(mut self, norms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.normas_aplicaveis = Some(norms.into_iter().map(Into::into).collect());
        self
    }

    /// Norms list, or empty when the caller sent none.
    pub fn norms(&self) -> &[String] {
        self.normas_aplicaveis.as_deref().unwrap_or(&[])
    }

    pub fn validate(&self) -> SgnResult<()> {
        if self.documento.trim().is_empty() {
            return Err(SgnError::Validation("documento is required".to_string()));
        }
        if self.documento.chars().count() > MAX_DOCUMENT_CHARS {
            return Err(SgnError::Validation(format!(
                "documento exceeds {} characters",
                MAX_DOCUMENT_CHARS
            )));
        }
        if self.tipo_documento.trim().is_empty() {
            return Err(SgnError::Validation("tipoDocumento is required".to_string()));
        }
        if self.norms().iter().any(|n| n.trim().is_empty()) {
            return Err(SgnError::Validation(
                "normasAplicaveis must not contain empty entries".to_string(),
            ));
        }
        Ok(())
    }
}

/// A single compliance gap reported by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GapItem {
    pub id: String,
    pub descricao: String,
    pub severidade: Severity,
    #[serde(default)]
    pub categoria: String,
    pub recomendacao: String,
    #[serde(default)]
    pub prazo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impacto: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custo_estimado: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responsavel_sugerido: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normas_relacionadas: Option<Vec<String>>,
}

/// Outbound analysis report.
///
/// Providers fill the analytical fields; `timestamp`, `modelo_usado` and
/// `tempo_processamento` are stamped by the request handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    pub score: f64,
    pub nivel_risco: RiskLevel,
    pub gaps: Vec<GapItem>,
    #[serde(default)]
    pub resumo: String,
    #[serde(default)]
    pub pontos_positivos: Vec<String>,
    #[serde(default)]
    pub pontos_atencao: Vec<String>,
    #[serde(default)]
    pub proximos_passos: Vec<String>,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub modelo_usado: String,
    #[serde(default)]
    pub tempo_processamento: u64,
}
