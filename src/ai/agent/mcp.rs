//! MCP streamable-HTTP agent client
//!
//! Handshake (`initialize` then `notifications/initialized`) happens lazily on
//! the first query. The server may answer any request with plain JSON or a
//! `text/event-stream`; both are accepted.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::AnalysisAgent;
use crate::config::AgentConfig;
use crate::constants::agent::{MCP_PROTOCOL_VERSION, MCP_SESSION_HEADER};
use crate::types::{DeckError, ErrorClassifier, Result, SessionId};

/// JSON-RPC 2.0 request (no `id` for notifications)
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    id: Option<u64>,
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Default)]
struct SessionState {
    initialized: bool,
    session_id: Option<SessionId>,
}

/// Analysis agent reached through an MCP tool
pub struct McpAgent {
    endpoint: String,
    tool_name: String,
    max_steps: u32,
    api_key: Option<SecretString>,
    client: reqwest::Client,
    request_id: AtomicU64,
    session: Mutex<SessionState>,
}

impl std::fmt::Debug for McpAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpAgent")
            .field("endpoint", &self.endpoint)
            .field("tool_name", &self.tool_name)
            .field("max_steps", &self.max_steps)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl McpAgent {
    pub fn new(endpoint: &str, config: &AgentConfig) -> Result<Self> {
        let url = url::Url::parse(endpoint).map_err(|e| {
            DeckError::Config(format!("Invalid MCP endpoint URL '{}': {}", endpoint, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(DeckError::Config(format!(
                "MCP endpoint must use http or https scheme, got: {}",
                url.scheme()
            )));
        }

        // Per-call deadline is enforced by the controller; this only bounds a hung socket
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.saturating_add(30)))
            .build()
            .map_err(|e| DeckError::Agent(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.to_string(),
            tool_name: config.tool_name.clone(),
            max_steps: config.max_steps,
            api_key: config.api_key.clone().map(SecretString::from),
            client,
            request_id: AtomicU64::new(1),
            session: Mutex::new(SessionState::default()),
        })
    }

    async fn ensure_initialized(&self, state: &mut SessionState) -> Result<()> {
        if state.initialized {
            return Ok(());
        }

        let params = json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "deckweaver",
                "version": env!("CARGO_PKG_VERSION")
            }
        });
        let response = self.call(state, "initialize", Some(params)).await?;
        let result = Self::into_result(response, "initialize")?;

        let server = result
            .pointer("/serverInfo/name")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let session = state.session_id.as_ref().map_or("none", SessionId::as_str);
        info!(server, session, "MCP session initialized");

        self.notify(state, "notifications/initialized").await?;
        state.initialized = true;
        Ok(())
    }

    /// Send a request and wait for its response
    async fn call(
        &self,
        state: &mut SessionState,
        method: &str,
        params: Option<Value>,
    ) -> Result<JsonRpcResponse> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: Some(id),
            method,
            params,
        };

        let response = self.post(state, &request).await?;

        if let Some(session) = response
            .headers()
            .get(MCP_SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            state.session_id = Some(SessionId::new(session));
        }

        let is_sse = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));

        let body = response
            .text()
            .await
            .map_err(|e| DeckError::Agent(format!("Failed to read MCP response: {}", e)))?;

        if is_sse {
            parse_sse_response(&body, id)
        } else {
            serde_json::from_str::<JsonRpcResponse>(&body).map_err(|e| {
                DeckError::Agent(format!("Failed to parse MCP response for {}: {}", method, e))
            })
        }
    }

    async fn notify(&self, state: &mut SessionState, method: &str) -> Result<()> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: None,
            method,
            params: None,
        };
        self.post(state, &request).await.map(|_| ())
    }

    async fn post(
        &self,
        state: &SessionState,
        request: &JsonRpcRequest<'_>,
    ) -> Result<reqwest::Response> {
        let mut builder = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, "application/json, text/event-stream")
            .json(request);

        if let Some(session) = &state.session_id {
            builder = builder.header(MCP_SESSION_HEADER, session.as_str());
        }
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder.send().await.map_err(|e| {
            DeckError::Llm(ErrorClassifier::classify(
                &format!("MCP request '{}' failed: {}", request.method, e),
                "mcp",
            ))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeckError::Llm(ErrorClassifier::classify_http_status(
                status.as_u16(),
                &format!("MCP server returned HTTP {} for {}: {}", status, request.method, body),
                "mcp",
            )));
        }
        Ok(response)
    }

    fn into_result(response: JsonRpcResponse, method: &str) -> Result<Value> {
        if let Some(error) = response.error {
            return Err(DeckError::Agent(format!(
                "MCP {} failed: [{}] {}",
                method, error.code, error.message
            )));
        }
        response
            .result
            .ok_or_else(|| DeckError::Agent(format!("No result in MCP {} response", method)))
    }

    async fn call_tool(&self, state: &mut SessionState, prompt: &str) -> Result<String> {
        self.ensure_initialized(state).await?;

        let params = json!({
            "name": self.tool_name,
            "arguments": {"query": prompt, "max_steps": self.max_steps}
        });
        let response = self.call(state, "tools/call", Some(params)).await?;
        tool_result_text(&Self::into_result(response, "tools/call")?, &self.tool_name)
    }
}

#[async_trait]
impl AnalysisAgent for McpAgent {
    async fn query(&self, prompt: &str) -> Result<String> {
        let mut state = self.session.lock().await;

        match self.call_tool(&mut state, prompt).await {
            // 404 on an established session means the server dropped it
            Err(DeckError::Llm(e))
                if state.session_id.is_some() && e.message.contains("HTTP 404") =>
            {
                warn!("MCP session expired, re-initializing");
                *state = SessionState::default();
                self.call_tool(&mut state, prompt).await
            }
            other => other,
        }
    }

    fn name(&self) -> &str {
        "mcp"
    }
}

/// Pick the response matching `id` out of an SSE body
///
/// Events end at a blank line; `\n`, `\r\n` and bare `\r` all end a line.
fn parse_sse_response(body: &str, id: u64) -> Result<JsonRpcResponse> {
    let body = body.replace("\r\n", "\n").replace('\r', "\n");
    let mut last_error = None;
    let mut data: Vec<&str> = Vec::new();

    // trailing "" flushes an event the server did not terminate
    for line in body.split('\n').chain(std::iter::once("")) {
        if let Some(value) = line.strip_prefix("data:") {
            data.push(value.strip_prefix(' ').unwrap_or(value));
            continue;
        }
        if !line.is_empty() || data.is_empty() {
            continue;
        }
        match serde_json::from_str::<JsonRpcResponse>(&data.join("\n")) {
            Ok(response) if response.id == Some(id) => return Ok(response),
            Ok(_) => debug!("Skipping unrelated MCP event"),
            Err(e) => last_error = Some(e.to_string()),
        }
        data.clear();
    }
    Err(DeckError::Agent(format!(
        "No response for request {} in MCP event stream{}",
        id,
        last_error.map(|e| format!(" (last parse error: {})", e)).unwrap_or_default()
    )))
}

/// Concatenate text content of a tool result
fn tool_result_text(result: &Value, tool: &str) -> Result<String> {
    let texts: Vec<&str> = result
        .get("content")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter(|item| item.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    if result.get("isError").and_then(Value::as_bool) == Some(true) {
        return Err(DeckError::Agent(format!(
            "MCP tool '{}' reported an error: {}",
            tool,
            texts.join("\n")
        )));
    }

    if texts.is_empty() {
        if let Some(structured) = result.get("structuredContent") {
            return Ok(structured.to_string());
        }
        return Err(DeckError::Agent(format!(
            "MCP tool '{}' returned no text content",
            tool
        )));
    }

    Ok(texts.join("\n"))
}
