//! Text generation providers.
//!
//! The suggestion path only needs "prompt in, text out", so providers sit
//! behind the [`TextGenerator`] trait and can be swapped for a scripted fake.

pub mod gemini;
pub mod mock;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Failure of an outbound generation call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Authentication rejected: {0}")]
    Auth(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Malformed upstream response: {0}")]
    MalformedResponse(String),

    #[error("Content filtered")]
    ContentFiltered,

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

impl UpstreamError {
    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::NotConfigured(_) => "not_configured",
            UpstreamError::InvalidRequest(_) => "invalid_request",
            UpstreamError::Auth(_) => "auth",
            UpstreamError::Network(_) => "network",
            UpstreamError::RateLimited => "rate_limit",
            UpstreamError::MalformedResponse(_) => "malformed_response",
            UpstreamError::ContentFiltered => "content_filtered",
            UpstreamError::Api { .. } => "api",
            UpstreamError::Timeout(_) => "timeout",
        }
    }

    /// Whether re-issuing the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            UpstreamError::Network(_) | UpstreamError::RateLimited | UpstreamError::Timeout(_) => {
                true
            }
            UpstreamError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Capability to turn a prompt into the model's raw reply.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Issue one generation request and return the reply text verbatim.
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError>;

    /// Cheap readiness check; must not call the upstream API.
    fn health_check(&self) -> Result<(), UpstreamError>;

    /// Provider label used in metrics.
    fn provider_name(&self) -> &'static str;

    /// Model identifier used in metrics.
    fn model(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(UpstreamError::Network("reset".into()).is_transient());
        assert!(UpstreamError::RateLimited.is_transient());
        assert!(UpstreamError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(UpstreamError::Api {
            status: 503,
            message: "overloaded".into()
        }
        .is_transient());

        assert!(!UpstreamError::Auth("bad key".into()).is_transient());
        assert!(!UpstreamError::MalformedResponse("no text".into()).is_transient());
        assert!(!UpstreamError::ContentFiltered.is_transient());
        assert!(!UpstreamError::Api {
            status: 400,
            message: "bad".into()
        }
        .is_transient());
    }

    #[test]
    fn kinds_are_stable() {
        assert_eq!(UpstreamError::RateLimited.kind(), "rate_limit");
        assert_eq!(UpstreamError::Auth(String::new()).kind(), "auth");
        assert_eq!(
            UpstreamError::Timeout(Duration::from_secs(30)).kind(),
            "timeout"
        );
    }
}
