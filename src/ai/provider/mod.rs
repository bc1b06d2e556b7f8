//! JSON-producing LLM backends
//!
//! The quality judge always talks to a provider; the analysis agent does too
//! when no MCP server is configured.

mod ollama;
mod openai;
mod prompt_utils;

pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use prompt_utils::build_schema_prompt;

pub use crate::types::{ErrorCategory, ErrorClassifier, LlmError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

use crate::types::{DeckError, Result};

// =============================================================================
// Response
// =============================================================================

/// One structured completion
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Parsed JSON body of the completion
    pub content: Value,
    pub usage: TokenUsage,
    pub elapsed_ms: u64,
    /// Model that produced the completion (empty when unknown)
    pub model: String,
}

impl LlmResponse {
    pub fn content_only(content: Value) -> Self {
        Self {
            content,
            usage: TokenUsage::default(),
            elapsed_ms: 0,
            model: String::new(),
        }
    }

    pub(crate) fn timed(content: Value, usage: TokenUsage, started: Instant, model: &str) -> Self {
        Self {
            content,
            usage,
            elapsed_ms: started.elapsed().as_millis() as u64,
            model: model.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Shared LLM provider type injected into the judge and agent.
pub type SharedProvider = Arc<dyn LlmProvider + Send + Sync>;

// =============================================================================
// Provider Configuration
// =============================================================================

/// Connection settings for one provider
///
/// Built from `[judge]` (and `[agent]` overrides for the provider agent).
/// The API key is never serialized.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// "openai" or "ollama"
    pub provider: String,
    /// `None` picks the backend's default model
    pub model: Option<String>,
    pub timeout_secs: u64,
    pub temperature: f32,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// OpenAI-compatible gateway or remote Ollama host
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let key = if self.api_key.is_some() { "[REDACTED]" } else { "<unset>" };
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("api_key", &key)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_max_tokens() -> usize {
    4096
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: None,
            timeout_secs: 300,
            temperature: 0.0,
            api_key: None,
            api_base: None,
            max_tokens: default_max_tokens(),
        }
    }
}

// =============================================================================
// LLM Provider Trait
// =============================================================================

/// Structured-output LLM backend
///
/// Implementations return the completion already parsed as JSON; a reply
/// that cannot be parsed is an error, never a partial value.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// `schema` may be `Value::Null` for free-form JSON
    async fn generate(&self, prompt: &str, schema: &Value) -> Result<LlmResponse>;

    fn name(&self) -> &str;

    fn model(&self) -> &str;
}

/// Create a shared provider from configuration
pub fn create_provider(config: &ProviderConfig) -> Result<SharedProvider> {
    let provider: SharedProvider = match config.provider.as_str() {
        "openai" => Arc::new(OpenAiProvider::new(config.clone())?),
        "ollama" => Arc::new(OllamaProvider::new(config.clone())?),
        other => {
            return Err(DeckError::Config(format!(
                "Unknown provider '{}' (expected openai or ollama)",
                other
            )));
        }
    };
    Ok(provider)
}

/// Transport failure before any HTTP status was received
pub(crate) fn send_error(provider: &str, err: reqwest::Error) -> DeckError {
    DeckError::Llm(ErrorClassifier::classify(
        &format!("{} request failed: {}", provider, err),
        provider,
    ))
}

/// Map a non-success HTTP response to a categorized error
pub(crate) async fn http_error(provider: &str, response: reqwest::Response) -> DeckError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    DeckError::Llm(ErrorClassifier::classify_http_status(
        status.as_u16(),
        &format!("{} API error ({}): {}", provider, status, body),
        provider,
    ))
}
