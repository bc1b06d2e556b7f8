//! Analysis Agent Clients
//!
//! The analysis agent answers a natural-language metric query with free
//! text that should contain the requested JSON.
//!
//! - `McpAgent`: MCP tool call over streamable HTTP (JSON-RPC 2.0)
//! - `ProviderAgent`: direct LLM provider call when no MCP server is configured

mod mcp;
mod provider_agent;

pub use mcp::McpAgent;
pub use provider_agent::ProviderAgent;

use async_trait::async_trait;
use std::sync::Arc;

use crate::ai::provider::create_provider;
use crate::config::{AgentKind, Config};
use crate::types::{DeckError, Result};

/// Free-text query interface to an analysis agent
#[async_trait]
pub trait AnalysisAgent: Send + Sync {
    /// Send one query, returning the agent's final answer text
    async fn query(&self, prompt: &str) -> Result<String>;

    /// Agent name for logging
    fn name(&self) -> &str;
}

pub type SharedAgent = Arc<dyn AnalysisAgent + Send + Sync>;

/// Create the configured analysis agent
pub fn create_agent(config: &Config) -> Result<SharedAgent> {
    match config.agent.kind {
        AgentKind::Mcp => {
            let endpoint = config.agent.endpoint.as_deref().ok_or_else(|| {
                DeckError::Config(
                    "agent.endpoint is required for the MCP agent (or set agent.kind = \"provider\")"
                        .to_string(),
                )
            })?;
            Ok(Arc::new(McpAgent::new(endpoint, &config.agent)?))
        }
        AgentKind::Provider => {
            let mut provider_config = config.judge.to_provider_config();
            if let Some(provider) = &config.agent.provider {
                provider_config.provider = provider.clone();
            }
            if config.agent.model.is_some() {
                provider_config.model = config.agent.model.clone();
            }
            provider_config.timeout_secs = config.agent.timeout_secs;
            Ok(Arc::new(ProviderAgent::new(create_provider(&provider_config)?)))
        }
    }
}
