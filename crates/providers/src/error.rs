use sgn_common::ProviderId;
use std::time::Duration;
use thiserror::Error;

/// What went wrong talking to a provider, as far as the transport knows.
///
/// This is raw material for [`classify`](crate::classify); it is not the
/// class used for fallback decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// The provider answered with a non-success HTTP status.
    Http { status: u16 },
    /// The call did not finish within the allotted time.
    Timeout,
    /// Connection refused, DNS failure, reset, ...
    Network,
    /// No credentials configured for the provider.
    MissingCredentials,
    /// The model output could not be parsed as JSON.
    InvalidJson,
    /// The JSON parsed but did not have the report shape.
    Schema,
    /// Anything else; classified by message.
    Other,
}

/// A failed call to an AI provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{provider} provider failed: {message}")]
pub struct ProviderError {
    pub provider: ProviderId,
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(provider: ProviderId, kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            provider,
            kind,
            message: message.into(),
        }
    }

    pub fn http(provider: ProviderId, status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        Self::new(
            provider,
            ProviderErrorKind::Http { status },
            format!("HTTP {}: {}", status, body),
        )
    }

    pub fn timeout(provider: ProviderId, after: Duration) -> Self {
        Self::new(
            provider,
            ProviderErrorKind::Timeout,
            format!("request timed out after {} ms", after.as_millis()),
        )
    }

    pub fn missing_credentials(provider: ProviderId) -> Self {
        Self::new(
            provider,
            ProviderErrorKind::MissingCredentials,
            "no API key configured",
        )
    }

    /// Map a transport error from `reqwest`.
    pub fn from_reqwest(provider: ProviderId, err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ProviderErrorKind::Timeout
        } else if let Some(status) = err.status() {
            ProviderErrorKind::Http {
                status: status.as_u16(),
            }
        } else if err.is_connect() || err.is_request() {
            ProviderErrorKind::Network
        } else if err.is_decode() {
            ProviderErrorKind::InvalidJson
        } else {
            ProviderErrorKind::Other
        };
        Self::new(provider, kind, err.to_string())
    }
}
