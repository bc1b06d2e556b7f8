//! Ollama provider (`/api/generate`, JSON format, no streaming)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{
    ErrorCategory, LlmError, LlmProvider, LlmResponse, ProviderConfig, TokenUsage, http_error,
    prompt_utils::build_schema_prompt,
};
use crate::ai::validation::extract_json_from_response;
use crate::types::{DeckError, Result};

const DEFAULT_API_BASE: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "llama3:latest";

#[derive(Debug)]
pub struct OllamaProvider {
    api_base: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let api_base = parse_endpoint(config.api_base.as_deref().unwrap_or(DEFAULT_API_BASE))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DeckError::LlmApi(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_base,
            model: config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: config.temperature,
            client,
        })
    }
}

/// http(s) only; a remote host is allowed but logged
fn parse_endpoint(endpoint: &str) -> Result<String> {
    let url = url::Url::parse(endpoint).map_err(|e| {
        DeckError::Config(format!("Invalid Ollama endpoint URL '{}': {}", endpoint, e))
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(DeckError::Config(format!(
            "Ollama endpoint must use http or https, got: {}",
            url.scheme()
        )));
    }
    if let Some(host) = url.host_str()
        && !matches!(host, "localhost" | "127.0.0.1" | "[::1]")
    {
        warn!(host, "Ollama endpoint is not local");
    }

    Ok(url.as_str().trim_end_matches('/').to_string())
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn generate(&self, prompt: &str, schema: &Value) -> Result<LlmResponse> {
        let started = Instant::now();
        let request = GenerateRequest {
            model: &self.model,
            prompt: build_schema_prompt(prompt, schema),
            stream: false,
            format: "json",
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.api_base))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let message = if e.is_connect() {
                    format!(
                        "Cannot reach Ollama at {} (is `ollama serve` running?)",
                        self.api_base
                    )
                } else {
                    format!("Ollama request failed: {}", e)
                };
                DeckError::Llm(LlmError::new(ErrorCategory::Network, message, "ollama"))
            })?;

        if !response.status().is_success() {
            return Err(http_error("ollama", response).await);
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| DeckError::LlmApi(format!("Malformed Ollama response: {}", e)))?;
        let usage = TokenUsage::new(body.prompt_eval_count, body.eval_count);

        debug!(model = %self.model, tokens = usage.total(), "Ollama completion received");

        let content = extract_json_from_response(&body.response)?;
        Ok(LlmResponse::timed(content, usage, started, &self.model))
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    format: &'static str,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_default_config() {
        let provider = OllamaProvider::new(ProviderConfig {
            provider: "ollama".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(provider.api_base, DEFAULT_API_BASE);
        assert_eq!(provider.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        assert!(matches!(
            parse_endpoint("file:///etc/passwd"),
            Err(DeckError::Config(_))
        ));
        assert!(parse_endpoint("not a url").is_err());
    }

    #[tokio::test]
    async fn test_generate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(json!({"stream": false, "format": "json"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": "{\"acceptable\": false, \"confidence\": 0.4}",
                "prompt_eval_count": 10,
                "eval_count": 5
            })))
            .mount(&server)
            .await;

        let provider = OllamaProvider::new(ProviderConfig {
            provider: "ollama".to_string(),
            api_base: Some(server.uri()),
            timeout_secs: 5,
            ..Default::default()
        })
        .unwrap();

        let response = provider.generate("judge", &Value::Null).await.unwrap();
        assert_eq!(response.content["confidence"], 0.4);
        assert_eq!(response.usage.total(), 15);
    }
}
