//! Quality Judge
//!
//! Second LLM call grading the structured data of one iteration.

use serde_json::{Value, json};
use std::time::Duration;
use tracing::{info, warn};

use super::types::JudgeDecision;
use crate::ai::prompt::{MetricRequest, PromptBuilder};
use crate::ai::provider::SharedProvider;
use crate::ai::timeout::with_timeout;
use crate::constants::judge::RAW_PREVIEW_CHARS;
use crate::types::{Result, StructuredData, truncate_chars};

/// Everything the judge sees for one iteration
#[derive(Debug, Clone, Copy)]
pub struct JudgeInput<'a> {
    pub request: &'a MetricRequest,
    pub data: &'a StructuredData,
    pub raw_response: &'a str,
    pub iteration: u32,
    pub previous_feedback: &'a str,
}

pub struct QualityJudge {
    provider: SharedProvider,
    timeout: Duration,
}

impl QualityJudge {
    pub fn new(provider: SharedProvider, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Grade one iteration; never fails
    ///
    /// The second element carries the judge error when the decision was
    /// synthesized.
    pub async fn evaluate(&self, input: JudgeInput<'_>) -> (JudgeDecision, Option<String>) {
        match self.try_evaluate(&input).await {
            Ok(decision) => {
                info!(
                    iteration = input.iteration,
                    acceptable = decision.acceptable,
                    confidence = format!("{:.2}", decision.confidence),
                    "Judge decision"
                );
                (decision, None)
            }
            Err(e) => {
                warn!(iteration = input.iteration, "Judge evaluation failed: {}", e);
                (JudgeDecision::failed(&e), Some(e.to_string()))
            }
        }
    }

    async fn try_evaluate(&self, input: &JudgeInput<'_>) -> Result<JudgeDecision> {
        let prompt = build_prompt(input)?;
        let response = with_timeout(
            self.timeout,
            self.provider.generate(&prompt, &decision_schema()),
            "judge evaluation",
        )
        .await?;
        let decision: JudgeDecision = serde_json::from_value(response.content)?;
        Ok(decision.normalized())
    }
}

fn build_prompt(input: &JudgeInput<'_>) -> Result<String> {
    let request = input.request;
    let data = serde_json::to_string_pretty(input.data)?;
    let previous = if input.previous_feedback.trim().is_empty() {
        "None"
    } else {
        input.previous_feedback
    };

    Ok(PromptBuilder::new()
        .role(
            "LLM judge evaluating Key Account Manager chart data quality",
            "assessing whether structured data is consistent, complete, and ready for visualization",
        )
        .objectives(vec![
            "Check the numbers are plausible for the requested metric and period",
            "Check categories and series are complete and consistently labelled",
            "Check the structured data agrees with the raw analysis",
            "Give concrete, actionable feedback when rejecting",
        ])
        .context_item("Merchant", request.merchant.as_str())
        .context_item("Period", &request.range.to_string())
        .context_item("Metric", &request.metric)
        .context_item("Iteration", &input.iteration.to_string())
        .context_item("Previous feedback", previous)
        .section("Structured Data", "")
        .code("json", &data)
        .section(
            "Raw Analysis",
            truncate_chars(input.raw_response, RAW_PREVIEW_CHARS),
        )
        .text(
            "Set acceptable=true only if the data can be charted as is. \
             confidence is a number between 0 and 1.",
        )
        .build())
}

fn decision_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "acceptable": {"type": "boolean"},
            "confidence": {"type": "number", "minimum": 0, "maximum": 1},
            "feedback": {"type": "string"},
            "suggestions": {"type": "array", "items": {"type": "string"}}
        },
        "required": ["acceptable", "confidence", "feedback", "suggestions"],
        "additionalProperties": false
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProvider;
    use crate::types::{DateRange, MerchantToken};
    use std::sync::Arc;

    fn request() -> MetricRequest {
        MetricRequest::new(
            "monthly sales year over year",
            MerchantToken::from("m-123"),
            DateRange::parse("2024-01-01", "2024-12-31").unwrap(),
        )
    }

    fn input<'a>(
        request: &'a MetricRequest,
        data: &'a StructuredData,
        raw: &'a str,
    ) -> JudgeInput<'a> {
        JudgeInput {
            request,
            data,
            raw_response: raw,
            iteration: 2,
            previous_feedback: "Missing March",
        }
    }

    #[tokio::test]
    async fn test_evaluate_parses_decision() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(json!({
            "acceptable": true,
            "confidence": 1.4,
            "feedback": "Looks complete",
            "suggestions": []
        }))]));
        let judge = QualityJudge::new(provider.clone(), Duration::from_secs(5));
        let request = request();
        let data = StructuredData::default();

        let (decision, error) = judge.evaluate(input(&request, &data, "raw")).await;
        assert!(decision.acceptable);
        assert_eq!(decision.confidence, 1.0);
        assert!(error.is_none());

        let prompt = &provider.prompts()[0];
        assert!(prompt.contains("m-123"));
        assert!(prompt.contains("2024-01-01 to 2024-12-31"));
        assert!(prompt.contains("Missing March"));
        assert!(prompt.contains("**Iteration**: 2"));
    }

    #[tokio::test]
    async fn test_provider_failure_synthesizes_rejection() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err("quota".to_string())]));
        let judge = QualityJudge::new(provider, Duration::from_secs(5));
        let request = request();
        let data = StructuredData::default();

        let (decision, error) = judge.evaluate(input(&request, &data, "")).await;
        assert!(!decision.acceptable);
        assert_eq!(decision.confidence, 0.0);
        assert!(decision.feedback.starts_with("Judge evaluation failed: "));
        assert!(decision.feedback.contains("quota"));
        assert_eq!(decision.suggestions, vec!["Retry with original approach"]);
        assert!(error.is_some());
    }

    #[tokio::test]
    async fn test_malformed_decision_synthesizes_rejection() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(json!({"verdict": "yes"}))]));
        let judge = QualityJudge::new(provider, Duration::from_secs(5));
        let request = request();
        let data = StructuredData::default();

        let (decision, error) = judge.evaluate(input(&request, &data, "")).await;
        assert!(!decision.acceptable);
        assert!(error.is_some());
    }

    #[test]
    fn test_prompt_truncates_raw_response() {
        let request = request();
        let data = StructuredData::default();
        let raw = format!("{}{}", "a".repeat(RAW_PREVIEW_CHARS), "TAIL");
        let prompt = build_prompt(&input(&request, &data, &raw)).unwrap();
        assert!(prompt.contains(&"a".repeat(RAW_PREVIEW_CHARS)));
        assert!(!prompt.contains("TAIL"));
    }
}
