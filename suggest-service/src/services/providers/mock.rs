//! Deterministic generator for tests and local runs without an API key.

use super::{TextGenerator, UpstreamError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Replays scripted replies in order, then repeats a fallback forever.
pub struct ScriptedTextGenerator {
    script: Mutex<VecDeque<Result<String, UpstreamError>>>,
    fallback: Result<String, UpstreamError>,
    delay: Duration,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
}

impl ScriptedTextGenerator {
    /// Always reply with `text`.
    pub fn replying(text: impl Into<String>) -> Self {
        Self::scripted(Vec::new(), Ok(text.into()))
    }

    /// Always fail with `error`.
    pub fn failing(error: UpstreamError) -> Self {
        Self::scripted(Vec::new(), Err(error))
    }

    /// Play `script` first, then `fallback`.
    pub fn scripted(
        script: Vec<Result<String, UpstreamError>>,
        fallback: Result<String, UpstreamError>,
    ) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    /// Sleep this long before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of `generate` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedTextGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap_or_else(|e| e.into_inner()) = Some(prompt.to_string());

        let next = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        next.unwrap_or_else(|| self.fallback.clone())
    }

    fn health_check(&self) -> Result<(), UpstreamError> {
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted"
    }
}
