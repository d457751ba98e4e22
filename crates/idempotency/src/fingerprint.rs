use serde::Serialize;
use sgn_common::AnalysisRequest;
use sha2::{Digest, Sha256};

/// The fields that determine an analysis outcome, in a fixed order.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CanonicalRequest<'a> {
    documento: &'a str,
    tipo_documento: &'a str,
    normas_aplicaveis: Vec<&'a str>,
}

/// SHA-256 (hex) of the semantically relevant request fields.
///
/// Only document content, document type and the applicable norms take part;
/// norms are sorted so their order does not matter. Priority, company id and
/// anything else the caller sends are ignored, so a retry that only differs
/// in those fields hashes identically.
pub fn request_fingerprint(request: &AnalysisRequest) -> String {
    let mut norms: Vec<&str> = request.norms().iter().map(String::as_str).collect();
    norms.sort_unstable();

    let canonical = CanonicalRequest {
        documento: &request.documento,
        tipo_documento: &request.tipo_documento,
        normas_aplicaveis: norms,
    };

    // Serializing borrowed strings into a Vec cannot fail.
    let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
    sha256_hex(&bytes)
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
