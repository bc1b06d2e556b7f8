//! Analysis agent backed by a plain LLM provider

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::AnalysisAgent;
use crate::ai::provider::SharedProvider;
use crate::types::Result;

/// Sends the query straight to a provider and returns its JSON as text
///
/// The provider has no data tools, so answers are only as good as the model's
/// own knowledge. Useful for dry runs and for agents fronted by an
/// OpenAI-compatible endpoint.
pub struct ProviderAgent {
    provider: SharedProvider,
}

impl ProviderAgent {
    pub fn new(provider: SharedProvider) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl AnalysisAgent for ProviderAgent {
    async fn query(&self, prompt: &str) -> Result<String> {
        let response = self.provider.generate(prompt, &Value::Null).await?;
        debug!(
            provider = self.provider.name(),
            tokens = response.usage.total(),
            "Provider agent answered"
        );
        Ok(serde_json::to_string_pretty(&response.content)?)
    }

    fn name(&self) -> &str {
        self.provider.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProvider;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_returns_provider_json_as_text() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(json!({
            "structured_data": {"Jan": {"2024": 3}},
            "paragraph": "Flat."
        }))]));
        let agent = ProviderAgent::new(provider.clone());

        let text = agent.query("monthly sales").await.unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["structured_data"]["Jan"]["2024"], 3);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_propagates_provider_error() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err("boom".to_string())]));
        let agent = ProviderAgent::new(provider);
        assert!(agent.query("anything").await.is_err());
    }
}
