//! Prompt in, validated suggestions out.

use crate::config::{GenerationSettings, RequestPolicy};
use crate::models::SuggestionList;
use crate::services::metrics;
use crate::services::providers::{TextGenerator, UpstreamError};
use crate::services::validation::{validate, ValidationError};
use service_core::error::AppError;
use service_core::retry::{retry_with_backoff, RetryConfig};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Why a suggestion request failed. Never shown to clients.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SuggestError {
    #[error("Upstream call failed: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Model output rejected: {0}")]
    Validation(#[from] ValidationError),
}

impl SuggestError {
    /// Outcome label for request metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            SuggestError::Upstream(_) => "upstream_error",
            SuggestError::Validation(_) => "validation_error",
        }
    }
}

impl From<SuggestError> for AppError {
    fn from(err: SuggestError) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

pub struct SuggestionService {
    generator: Arc<dyn TextGenerator>,
    settings: GenerationSettings,
    policy: RequestPolicy,
    retry: RetryConfig,
}

impl SuggestionService {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        settings: GenerationSettings,
        policy: RequestPolicy,
    ) -> Self {
        let retry = RetryConfig::with_max_retries(policy.max_retries);
        Self {
            generator,
            settings,
            policy,
            retry,
        }
    }

    /// Replace the backoff schedule. The attempt bound still comes from
    /// `max_retries` of the given config.
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn generator(&self) -> &Arc<dyn TextGenerator> {
        &self.generator
    }

    /// Ask the model once.
    async fn generate_once(&self) -> Result<String, UpstreamError> {
        let provider = self.generator.provider_name();
        let start = Instant::now();

        let result = self.generator.generate(&self.settings.prompt).await;

        metrics::record_provider_latency(
            provider,
            self.generator.model(),
            start.elapsed().as_secs_f64(),
        );
        if let Err(e) = &result {
            metrics::record_provider_error(provider, e.kind());
        }

        result
    }

    /// Produce a validated, non-empty suggestion list.
    ///
    /// The request timeout bounds all attempts and backoffs together. On
    /// timeout the in-flight call is dropped; the upstream may still
    /// complete it.
    pub async fn suggest(&self) -> Result<SuggestionList, SuggestError> {
        let attempts = retry_with_backoff(
            &self.retry,
            "generate_suggestions",
            UpstreamError::is_transient,
            || self.generate_once(),
        );

        let raw = match tokio::time::timeout(self.policy.request_timeout, attempts).await {
            Ok(result) => result?,
            Err(_) => {
                metrics::record_provider_error(self.generator.provider_name(), "timeout");
                tracing::warn!(
                    timeout_secs = self.policy.request_timeout.as_secs_f64(),
                    "Suggestion request timed out"
                );
                return Err(UpstreamError::Timeout(self.policy.request_timeout).into());
            }
        };

        let suggestions = validate(&raw).map_err(|e| {
            metrics::record_validation_failure(e.reason());
            tracing::warn!(
                reason = e.reason(),
                error = %e,
                raw_len = raw.len(),
                "Rejected model output"
            );
            e
        })?;

        if suggestions.len() != self.policy.expected_count {
            metrics::record_unexpected_count();
            tracing::warn!(
                expected = self.policy.expected_count,
                actual = suggestions.len(),
                "Model returned an unexpected number of suggestions"
            );
        }

        Ok(suggestions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SuggestionRecord;
    use crate::services::providers::mock::ScriptedTextGenerator;
    use std::time::Duration;

    const ONE: &str = r#"[{"name":"Kinkaku-ji","description":"Golden pavilion","image_url":"http://example.com/a.jpg"}]"#;

    fn service(generator: Arc<ScriptedTextGenerator>, policy: RequestPolicy) -> SuggestionService {
        let retry = RetryConfig {
            initial_backoff: Duration::ZERO,
            add_jitter: false,
            ..RetryConfig::with_max_retries(policy.max_retries)
        };
        SuggestionService::new(generator, GenerationSettings::default(), policy)
            .with_retry_config(retry)
    }

    fn policy(max_retries: u32) -> RequestPolicy {
        RequestPolicy {
            max_retries,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn valid_reply_becomes_suggestions() {
        let generator = Arc::new(ScriptedTextGenerator::replying(ONE));
        let result = service(generator.clone(), policy(0)).suggest().await.unwrap();

        assert_eq!(
            result,
            vec![SuggestionRecord::new(
                "Kinkaku-ji",
                "Golden pavilion",
                "http://example.com/a.jpg"
            )]
        );
        assert_eq!(generator.calls(), 1);
        assert_eq!(
            generator.last_prompt().as_deref(),
            Some(crate::config::DEFAULT_PROMPT)
        );
    }

    #[tokio::test]
    async fn configured_prompt_is_sent() {
        let generator = Arc::new(ScriptedTextGenerator::replying(ONE));
        let settings = GenerationSettings {
            model: "m".to_string(),
            prompt: "three spots in Nara".to_string(),
        };
        SuggestionService::new(generator.clone(), settings, policy(0))
            .suggest()
            .await
            .unwrap();

        assert_eq!(generator.last_prompt().as_deref(), Some("three spots in Nara"));
    }

    #[tokio::test]
    async fn transient_error_is_retried() {
        let generator = Arc::new(ScriptedTextGenerator::scripted(
            vec![Err(UpstreamError::RateLimited)],
            Ok(ONE.to_string()),
        ));
        let result = service(generator.clone(), policy(1)).suggest().await;

        assert_eq!(result.unwrap().len(), 1);
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let generator = Arc::new(ScriptedTextGenerator::failing(UpstreamError::Network(
            "connection reset".to_string(),
        )));
        let err = service(generator.clone(), policy(2)).suggest().await.unwrap_err();

        assert_eq!(
            err,
            SuggestError::Upstream(UpstreamError::Network("connection reset".to_string()))
        );
        assert_eq!(generator.calls(), 3);
    }

    #[tokio::test]
    async fn auth_error_is_not_retried() {
        let generator = Arc::new(ScriptedTextGenerator::failing(UpstreamError::Auth(
            "bad key".to_string(),
        )));
        let err = service(generator.clone(), policy(3)).suggest().await.unwrap_err();

        assert_eq!(err.outcome(), "upstream_error");
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn validation_error_is_not_retried() {
        let generator = Arc::new(ScriptedTextGenerator::replying("not json"));
        let err = service(generator.clone(), policy(3)).suggest().await.unwrap_err();

        assert!(matches!(
            err,
            SuggestError::Validation(ValidationError::MalformedJson(_))
        ));
        assert_eq!(err.outcome(), "validation_error");
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn empty_array_is_an_error() {
        let generator = Arc::new(ScriptedTextGenerator::replying("[]"));
        let err = service(generator, policy(0)).suggest().await.unwrap_err();
        assert_eq!(err, SuggestError::Validation(ValidationError::EmptyResult));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_upstream_times_out() {
        let generator = Arc::new(
            ScriptedTextGenerator::replying(ONE).with_delay(Duration::from_secs(60)),
        );
        let policy = RequestPolicy {
            request_timeout: Duration::from_secs(5),
            max_retries: 0,
            ..Default::default()
        };
        let err = service(generator, policy).suggest().await.unwrap_err();

        assert_eq!(
            err,
            SuggestError::Upstream(UpstreamError::Timeout(Duration::from_secs(5)))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_bounds_all_attempts_together() {
        let generator = Arc::new(
            ScriptedTextGenerator::replying(ONE).with_delay(Duration::from_secs(600)),
        );
        let policy = RequestPolicy {
            request_timeout: Duration::from_secs(30),
            max_retries: 1,
            ..Default::default()
        };
        let start = tokio::time::Instant::now();
        let err = service(generator.clone(), policy).suggest().await.unwrap_err();

        assert_eq!(
            err,
            SuggestError::Upstream(UpstreamError::Timeout(Duration::from_secs(30)))
        );
        assert!(start.elapsed() <= Duration::from_secs(30));
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_fast_failure_fits_in_timeout() {
        let generator = Arc::new(ScriptedTextGenerator::scripted(
            vec![Err(UpstreamError::RateLimited)],
            Ok(ONE.to_string()),
        ));
        let policy = RequestPolicy {
            request_timeout: Duration::from_secs(30),
            max_retries: 1,
            ..Default::default()
        };
        let result = SuggestionService::new(
            generator.clone(),
            GenerationSettings::default(),
            policy,
        )
        .suggest()
        .await;

        assert_eq!(result.unwrap().len(), 1);
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn count_mismatch_passes_through() {
        let generator = Arc::new(ScriptedTextGenerator::replying(ONE));
        let result = service(generator, policy(0)).suggest().await.unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn app_error_conversion_keeps_cause_for_logs() {
        let err: AppError = SuggestError::Upstream(UpstreamError::RateLimited).into();
        assert!(err.to_string().contains("Rate limited"));
    }
}
