//! Scripted in-memory providers for testing.
//!
//! Each fake owns its own script and call log, so tests inject them through
//! the pipeline constructor instead of touching any process-wide state.

use async_trait::async_trait;
use captionkit_core::{ImageFacts, RawVariant};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::provider::{
    prompt_text, FactExtractor, FallbackInput, FallbackProvider, PrimaryProvider, PromptBlock,
};
use crate::ProviderError;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Primary provider that replays a fixed sequence of responses.
///
/// Once the script is exhausted every call fails with `RequestFailed`.
#[derive(Debug)]
pub struct ScriptedPrimary {
    name: String,
    configured: bool,
    delay: Option<Duration>,
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    calls: Mutex<Vec<Vec<PromptBlock>>>,
}

impl Default for ScriptedPrimary {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedPrimary {
    pub fn new() -> Self {
        Self {
            name: "Gemini".to_string(),
            configured: true,
            delay: None,
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A provider whose capability check reports it unavailable.
    pub fn not_configured() -> Self {
        Self {
            configured: false,
            ..Self::new()
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_response(self, response: impl Into<String>) -> Self {
        lock(&self.script).push_back(Ok(response.into()));
        self
    }

    pub fn with_error(self, error: ProviderError) -> Self {
        lock(&self.script).push_back(Err(error));
        self
    }

    /// Sleep before answering each call (for timeout and cancellation tests).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Text of every call made so far, in order.
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.calls).iter().map(|b| prompt_text(b)).collect()
    }

    pub fn calls(&self) -> Vec<Vec<PromptBlock>> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl PrimaryProvider for ScriptedPrimary {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn complete(&self, blocks: &[PromptBlock]) -> Result<String, ProviderError> {
        lock(&self.calls).push(blocks.to_vec());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        lock(&self.script).pop_front().unwrap_or_else(|| {
            Err(ProviderError::RequestFailed(
                "no scripted response left".to_string(),
            ))
        })
    }
}

/// Vision collaborator returning a fixed answer.
#[derive(Debug)]
pub struct StaticFactExtractor {
    answer: Result<ImageFacts, ProviderError>,
    calls: Mutex<Vec<String>>,
}

impl StaticFactExtractor {
    pub fn new(facts: ImageFacts) -> Self {
        Self {
            answer: Ok(facts),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: ProviderError) -> Self {
        Self {
            answer: Err(error),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn image_urls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl FactExtractor for StaticFactExtractor {
    async fn extract_facts(&self, image_url: &str) -> Result<ImageFacts, ProviderError> {
        lock(&self.calls).push(image_url.to_string());
        self.answer.clone()
    }
}

/// Fallback provider returning a fixed variant (or a fixed failure).
#[derive(Debug)]
pub struct StaticFallback {
    name: String,
    answer: Result<RawVariant, ProviderError>,
    inputs: Mutex<Vec<FallbackInput>>,
}

impl StaticFallback {
    pub fn new(variant: RawVariant) -> Self {
        Self {
            name: "OpenAI".to_string(),
            answer: Ok(variant),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: ProviderError) -> Self {
        Self {
            name: "OpenAI".to_string(),
            answer: Err(error),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn inputs(&self) -> Vec<FallbackInput> {
        lock(&self.inputs).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.inputs).len()
    }
}

#[async_trait]
impl FallbackProvider for StaticFallback {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, input: &FallbackInput) -> Result<RawVariant, ProviderError> {
        lock(&self.inputs).push(input.clone());
        self.answer.clone()
    }
}
