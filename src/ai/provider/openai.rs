//! OpenAI Chat Completions provider
//!
//! Also works against any compatible endpoint through `api_base`.
//! JSON mode is always on; the schema rides along in the system message.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::debug;

use super::{LlmProvider, LlmResponse, ProviderConfig, TokenUsage, http_error, send_error};
use crate::ai::validation::extract_json_from_response;
use crate::types::{DeckError, Result};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const SYSTEM_PROMPT: &str = "You are a meticulous analytics reviewer. Always respond with valid JSON.";

pub struct OpenAiProvider {
    api_key: SecretString,
    api_base: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiProvider {
    /// Falls back to `OPENAI_API_KEY` when the config carries no key
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                DeckError::Config(
                    "OpenAI API key not found. Set DECKWEAVER_JUDGE_API_KEY or OPENAI_API_KEY"
                        .to_string(),
                )
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DeckError::LlmApi(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: SecretString::from(api_key),
            api_base: config
                .api_base
                .as_deref()
                .unwrap_or(DEFAULT_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            model: config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client,
        })
    }

    fn system_message(schema: &Value) -> String {
        if schema.is_null() {
            return SYSTEM_PROMPT.to_string();
        }
        let schema = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
        format!(
            "{}\nThe JSON must match this schema:\n```json\n{}\n```",
            SYSTEM_PROMPT, schema
        )
    }

    fn request_body<'a>(&'a self, system: &'a str, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: JsonMode { kind: "json_object" },
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn generate(&self, prompt: &str, schema: &Value) -> Result<LlmResponse> {
        let started = Instant::now();
        let system = Self::system_message(schema);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(self.api_key.expose_secret())
            .json(&self.request_body(&system, prompt))
            .send()
            .await
            .map_err(|e| send_error("openai", e))?;

        if !response.status().is_success() {
            return Err(http_error("openai", response).await);
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| DeckError::LlmApi(format!("Malformed OpenAI response: {}", e)))?;

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| DeckError::LlmApi("OpenAI returned no message content".to_string()))?;
        let usage = body
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        debug!(
            model = %self.model,
            tokens = usage.total(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "OpenAI completion received"
        );

        let content = extract_json_from_response(&text)?;
        Ok(LlmResponse::timed(content, usage, started, &self.model))
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: usize,
    response_format: JsonMode,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct JsonMode {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
