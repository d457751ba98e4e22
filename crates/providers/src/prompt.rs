use once_cell::sync::Lazy;
use regex::Regex;
use sgn_common::AnalysisRequest;

/// Maximum number of document characters forwarded to a model.
pub const MAX_DOCUMENT_LENGTH: usize = 50_000;

pub const SYSTEM_PROMPT: &str = "Você é um especialista em SST (Segurança e Saúde no Trabalho) \
e análise de conformidade com normas regulamentadoras brasileiras. Analise documentos e \
forneça insights precisos sobre conformidade. Responda estritamente em JSON válido.";

static SYSTEM_ROLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bsystem\b:").expect("valid regex"));
static ROLE_OVERRIDE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\brole\b:\s*["']?(system|assistant)["']?"#).expect("valid regex")
});
static IGNORE_INSTRUCTIONS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bignore\b.*\binstructions?\b").expect("valid regex"));
static FORGET_PREVIOUS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bforget\b.*\bprevious\b").expect("valid regex"));

/// Truncate user text and strip common prompt-injection phrasing.
pub fn sanitize_input(input: &str) -> String {
    let truncated: String = input.chars().take(MAX_DOCUMENT_LENGTH).collect();
    let text = truncated.replace("```", "");
    let text = SYSTEM_ROLE.replace_all(&text, "");
    let text = ROLE_OVERRIDE.replace_all(&text, "");
    let text = IGNORE_INSTRUCTIONS.replace_all(&text, "[removido]");
    let text = FORGET_PREVIOUS.replace_all(&text, "[removido]");
    text.trim().to_string()
}

/// Build the user prompt for a compliance analysis.
pub fn build_prompt(request: &AnalysisRequest) -> String {
    let documento = sanitize_input(&request.documento);
    let tipo = sanitize_input(&request.tipo_documento);
    let normas = if request.norms().is_empty() {
        "NRs gerais".to_string()
    } else {
        request
            .norms()
            .iter()
            .map(|n| sanitize_input(n))
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        r#"ANÁLISE DE CONFORMIDADE SST - DOCUMENTO: {tipo}

DOCUMENTO PARA ANÁLISE:
{documento}

NORMAS APLICÁVEIS: {normas}

INSTRUÇÕES:
1. Analise o documento em relação às normas de SST brasileiras
2. Identifique gaps de conformidade
3. Classifique severidade (baixa, media, alta, critica)
4. Forneça recomendações práticas
5. Calcule score de 0-100

FORMATO DE RESPOSTA (JSON):
{{
  "score": 85,
  "nivelRisco": "medio",
  "gaps": [
    {{
      "id": "gap_001",
      "descricao": "Descrição do gap",
      "severidade": "alta",
      "categoria": "EPI",
      "recomendacao": "Recomendação específica",
      "prazo": "30 dias"
    }}
  ],
  "resumo": "Resumo executivo da análise",
  "pontosPositivos": ["Ponto positivo 1"],
  "pontosAtencao": ["Ponto de atenção 1"],
  "proximosPassos": ["Próximo passo 1"]
}}

IMPORTANTE: Responda APENAS com o JSON válido, sem texto adicional."#
    )
}
