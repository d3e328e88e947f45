//! LLM providers implementing [`repodoc_core::generation::Generator`].
//!
//! | Config Value | Provider | Endpoint |
//! |--------------|----------|----------|
//! | `"disabled"` | none | generation is skipped |
//! | `"openai"` | [`OpenAIGenerator`] | `POST {url}/chat/completions` |
//! | `"ollama"` | [`OllamaGenerator`] | `POST {url}/api/generate` (non-streaming) |
//! | `"cohere"` | [`CohereGenerator`] | `POST {url}/v1/chat` |
//!
//! Each `generate` call is one request; see [`crate::retry`] for retries.

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;

use repodoc_core::error::ServiceError;
use repodoc_core::generation::{GenerationParams, Generator};

use crate::config::LlmConfig;
use crate::http;

const OPENAI_URL: &str = "https://api.openai.com/v1";
const OLLAMA_URL: &str = "http://localhost:11434";
const COHERE_URL: &str = "https://api.cohere.ai";

fn base_url(config: &LlmConfig, default: &str) -> String {
    config
        .url
        .as_deref()
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}

fn required_model(config: &LlmConfig) -> Result<String> {
    config
        .model
        .clone()
        .ok_or_else(|| anyhow::anyhow!("llm.model required for {} provider", config.provider))
}

/// Pull a string out of `json` at `pointer`, or fail permanently.
fn text_at(json: &serde_json::Value, pointer: &str, service: &str) -> Result<String, ServiceError> {
    json.pointer(pointer)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| {
            ServiceError::permanent(format!("Invalid {} response: missing {}", service, pointer))
        })
}

// ============ OpenAI-compatible Provider ============

pub struct OpenAIGenerator {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

impl OpenAIGenerator {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            url: base_url(config, OPENAI_URL),
            api_key: http::api_key(config.api_key_env.as_deref().unwrap_or("OPENAI_API_KEY"))?,
            model: required_model(config)?,
        })
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, ServiceError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
        });
        let request = self
            .client
            .post(format!("{}/chat/completions", self.url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body);

        let json = http::send_json(request, "OpenAI").await?;
        text_at(&json, "/choices/0/message/content", "OpenAI")
    }
}

// ============ Ollama Provider ============

pub struct OllamaGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl OllamaGenerator {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            url: base_url(config, OLLAMA_URL),
            model: required_model(config)?,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, ServiceError> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "num_predict": params.max_tokens,
                "temperature": params.temperature,
            },
        });
        let request = self
            .client
            .post(format!("{}/api/generate", self.url))
            .json(&body);

        let json = http::send_json(request, "Ollama").await?;
        text_at(&json, "/response", "Ollama")
    }
}

// ============ Cohere Provider ============

pub struct CohereGenerator {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

impl CohereGenerator {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            url: base_url(config, COHERE_URL),
            api_key: http::api_key(config.api_key_env.as_deref().unwrap_or("COHERE_API_KEY"))?,
            model: required_model(config)?,
        })
    }
}

#[async_trait]
impl Generator for CohereGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, ServiceError> {
        let body = serde_json::json!({
            "model": self.model,
            "message": prompt,
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
        });
        let request = self
            .client
            .post(format!("{}/v1/chat", self.url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body);

        let json = http::send_json(request, "Cohere").await?;
        text_at(&json, "/text", "Cohere")
    }
}

/// Build the configured generator, or `None` when generation is disabled.
pub fn create_generator(config: &LlmConfig) -> Result<Option<Arc<dyn Generator>>> {
    match config.provider.as_str() {
        "disabled" => Ok(None),
        "openai" => Ok(Some(Arc::new(OpenAIGenerator::new(config)?))),
        "ollama" => Ok(Some(Arc::new(OllamaGenerator::new(config)?))),
        "cohere" => Ok(Some(Arc::new(CohereGenerator::new(config)?))),
        other => bail!("Unknown llm provider: {}", other),
    }
}
