//! LLM provider trait for text generation

use async_trait::async_trait;

use crate::error::Result;

/// Trait for language-model text generation.
///
/// Constructed once and passed by reference into the engine, so tests can
/// substitute a fake service.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for the given prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Check whether the service is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model being used
    fn model(&self) -> &str;
}
