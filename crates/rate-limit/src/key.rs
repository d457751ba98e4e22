/// Identifier used when no client address can be determined.
pub const ANONYMOUS_CLIENT: &str = "anonymous";

/// Resolve the client identifier from proxy headers.
///
/// The first entry of `X-Forwarded-For` is trusted as the client address,
/// then `X-Real-IP`, then [`ANONYMOUS_CLIENT`].
pub fn client_identifier(forwarded_for: Option<&str>, real_ip: Option<&str>) -> String {
    forwarded_for
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| real_ip.map(str::trim).filter(|s| !s.is_empty()))
        .unwrap_or(ANONYMOUS_CLIENT)
        .to_string()
}

/// Namespaced limiter key, e.g. `rl:1.2.3.4`.
pub fn rate_limit_key(prefix: &str, client: &str) -> String {
    format!("{}:{}", prefix, client)
}
