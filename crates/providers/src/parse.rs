use serde_json::Value;
use sgn_common::{AnalysisResponse, ProviderId};

use crate::error::{ProviderError, ProviderErrorKind};

const REQUIRED_FIELDS: [&str; 3] = ["score", "nivelRisco", "gaps"];

/// Extract and validate an analysis report from raw model output.
///
/// Models often wrap the JSON in prose or code fences, so the span from the
/// first `{` to the last `}` is parsed.
pub fn parse_analysis(provider: ProviderId, content: &str) -> Result<AnalysisResponse, ProviderError> {
    let invalid_json = |msg: String| ProviderError::new(provider, ProviderErrorKind::InvalidJson, msg);
    let schema = |msg: String| ProviderError::new(provider, ProviderErrorKind::Schema, msg);

    if content.trim().is_empty() {
        return Err(invalid_json("empty response from model".to_string()));
    }

    let json = match (content.find('{'), content.rfind('}')) {
        (Some(start), Some(end)) if start < end => &content[start..=end],
        _ => return Err(invalid_json("no JSON object found in model response".to_string())),
    };

    let value: Value =
        serde_json::from_str(json).map_err(|e| invalid_json(format!("JSON parse error: {}", e)))?;

    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| value.get(field).map_or(true, Value::is_null))
        .collect();
    if !missing.is_empty() {
        return Err(schema(format!(
            "schema validation failed: missing {}",
            missing.join(", ")
        )));
    }

    let mut report: AnalysisResponse = serde_json::from_value(value)
        .map_err(|e| schema(format!("schema validation failed: {}", e)))?;
    report.score = report.score.clamp(0.0, 100.0);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sgn_common::{RiskLevel, Severity};

    const VALID: &str = r#"{
        "score": 85,
        "nivelRisco": "medio",
        "gaps": [{
            "id": "gap_001",
            "descricao": "EPI sem CA",
            "severidade": "alta",
            "categoria": "EPI",
            "recomendacao": "Registrar CA",
            "prazo": "30 dias"
        }],
        "resumo": "ok",
        "pontosPositivos": ["a"],
        "pontosAtencao": [],
        "proximosPassos": ["b"]
    }"#;

    #[test]
    fn parses_bare_json() {
        let report = parse_analysis(ProviderId::Groq, VALID).unwrap();
        assert_eq!(report.score, 85.0);
        assert_eq!(report.nivel_risco, RiskLevel::Medio);
        assert_eq!(report.gaps[0].severidade, Severity::Alta);
        assert_eq!(report.proximos_passos, vec!["b".to_string()]);
    }

    #[test]
    fn parses_json_wrapped_in_prose() {
        let content = format!("Claro! Segue a análise:\n```json\n{}\n```\nAtenciosamente.", VALID);
        assert!(parse_analysis(ProviderId::Zai, &content).is_ok());
    }

    #[test]
    fn clamps_score() {
        let content = r#"{"score": 140, "nivelRisco": "baixo", "gaps": []}"#;
        assert_eq!(parse_analysis(ProviderId::Groq, content).unwrap().score, 100.0);
    }

    #[test]
    fn empty_content_is_invalid_json() {
        let err = parse_analysis(ProviderId::Groq, "  ").unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::InvalidJson);
    }

    #[test]
    fn prose_only_is_invalid_json() {
        let err = parse_analysis(ProviderId::Groq, "desculpe, não consigo").unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::InvalidJson);
    }

    #[test]
    fn broken_json_is_invalid_json() {
        let err = parse_analysis(ProviderId::Groq, r#"{"score": 10, "#).unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::InvalidJson);
        let err = parse_analysis(ProviderId::Groq, r#"{"score": 10,, }"#).unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::InvalidJson);
    }

    #[test]
    fn missing_fields_are_schema_errors() {
        let err = parse_analysis(ProviderId::Ollama, r#"{"score": 10}"#).unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Schema);
        assert!(err.message.contains("nivelRisco"));
        assert!(err.message.contains("gaps"));
    }

    #[test]
    fn wrong_enum_is_schema_error() {
        let content = r#"{"score": 10, "nivelRisco": "extremo", "gaps": []}"#;
        let err = parse_analysis(ProviderId::Groq, content).unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Schema);
    }
}
