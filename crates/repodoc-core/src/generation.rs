//! LLM generation trait.
//!
//! [`Generator`] wraps a text-completion service. Implementations for
//! OpenAI-compatible, Ollama and Cohere endpoints live in the app crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Sampling parameters for one generation call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.3,
        }
    }
}

#[async_trait]
pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;
    /// One request, no retries.
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, ServiceError>;
}
