//! Iteration Controller
//!
//! Judge-and-retry loop for one metric: format → agent → extract → judge,
//! repeated until the judge accepts or the iteration cap is reached.
//!
//! Failures inside a pass never abort the loop. A failed agent call is
//! recorded with its `DataSource`, a failed judge call becomes a rejecting
//! decision with confidence 0.

use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use super::judge::{JudgeInput, QualityJudge};
use super::types::{DataSource, IterationOutcome, IterationRecord, StopReason, select_best};
use crate::ai::agent::SharedAgent;
use crate::ai::prompt::{DEFAULT_AGENT_TEMPLATE, MetricRequest, RequestFormatter};
use crate::ai::timeout::{TimeoutConfig, with_timeout};
use crate::ai::validation::StructuredExtractor;
use crate::config::{Config, IterationConfig};
use crate::types::{DeckError, ErrorClassifier, Result};

pub struct IterationController {
    agent: SharedAgent,
    judge: QualityJudge,
    formatter: RequestFormatter,
    extractor: StructuredExtractor,
    settings: IterationConfig,
    agent_timeout: Duration,
}

impl IterationController {
    /// Rejects an iteration cap outside [1, 50] or a threshold outside [0, 1]
    pub fn new(agent: SharedAgent, judge: QualityJudge, config: &Config) -> Result<Self> {
        config.iteration.validate()?;
        let require_envelope = config.extraction.require_envelope;

        Ok(Self {
            agent,
            judge,
            formatter: RequestFormatter::new(DEFAULT_AGENT_TEMPLATE, require_envelope),
            extractor: StructuredExtractor::new(require_envelope),
            settings: config.iteration.clone(),
            agent_timeout: TimeoutConfig::from_config(config).agent_call,
        })
    }

    pub fn with_formatter(mut self, formatter: RequestFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    #[instrument(skip(self, request), fields(metric = %request.metric, merchant = %request.merchant))]
    pub async fn run(&self, request: &MetricRequest) -> Result<IterationOutcome> {
        let max = self.settings.max_iterations;
        let threshold = self.settings.confidence_threshold;
        let mut records: Vec<IterationRecord> = Vec::new();

        info!(
            "Starting iteration loop (max={}, threshold={:.2})",
            max, threshold
        );

        for index in 1..=max {
            let started = Instant::now();

            let (feedback, suggestions) = records
                .last()
                .map(|r| (r.decision.feedback.as_str(), r.decision.suggestions.as_slice()))
                .unwrap_or_default();
            let prompt = self.formatter.format(request, feedback, suggestions);

            let (raw_response, source) = self.query_agent(&prompt, index).await;

            let extraction = self.extractor.extract(&raw_response);
            if let Some(reason) = &extraction.upstream_error {
                warn!(iteration = index, "No usable payload: {}", reason);
            }
            debug!(
                iteration = index,
                method = %extraction.method,
                categories = extraction.data.len(),
                "Extracted structured data"
            );

            let (decision, judge_error) = self
                .judge
                .evaluate(JudgeInput {
                    request,
                    data: &extraction.data,
                    raw_response: &raw_response,
                    iteration: index,
                    previous_feedback: feedback,
                })
                .await;

            let accepted = decision.accepts(threshold);
            records.push(IterationRecord {
                index,
                prompt,
                raw_response,
                source,
                data: extraction.data,
                paragraph: extraction.paragraph,
                method: extraction.method,
                decision,
                judge_error,
                elapsed_ms: started.elapsed().as_millis() as u64,
            });

            if accepted {
                info!("Accepted at iteration {}", index);
                return Ok(IterationOutcome {
                    records,
                    stop_reason: StopReason::Accepted,
                    final_index: index,
                });
            }
        }

        let best = select_best(&records)
            .ok_or_else(|| DeckError::Config("iteration loop produced no records".to_string()))?;
        let final_index = records[best].index;
        info!(
            "Iteration cap reached; finalizing iteration {} (confidence {:.2}, source {})",
            final_index, records[best].decision.confidence, records[best].source
        );

        Ok(IterationOutcome {
            records,
            stop_reason: StopReason::Exhausted,
            final_index,
        })
    }

    async fn query_agent(&self, prompt: &str, index: u32) -> (String, DataSource) {
        match with_timeout(self.agent_timeout, self.agent.query(prompt), "agent call").await {
            Ok(text) => (text, DataSource::Agent),
            Err(e) => {
                let reason = e.to_string();
                let category = ErrorClassifier::classify_deck_error(&e, self.agent.name()).category;
                match &self.settings.fallback_payload {
                    Some(payload) => {
                        warn!(iteration = index, category = %category, "Agent failed, using fallback payload: {}", reason);
                        (payload.clone(), DataSource::Fallback { reason })
                    }
                    None => {
                        warn!(iteration = index, category = %category, "Agent failed: {}", reason);
                        (String::new(), DataSource::AgentFailed { reason })
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::validation::ExtractionMethod;
    use crate::testing::{ScriptedAgent, ScriptedProvider};
    use crate::types::{DateRange, MerchantToken};
    use proptest::prelude::*;
    use serde_json::{Value, json};
    use std::sync::Arc;

    const AGENT_REPLY: &str =
        "Here you go:\n```json\n{\"Jan\": {\"2023\": 10, \"2024\": 12}, \"Feb\": {\"2023\": 8, \"2024\": 15}}\n```";

    fn request() -> MetricRequest {
        MetricRequest::new(
            "monthly sales year over year",
            MerchantToken::from("m-1"),
            DateRange::parse("2024-01-01", "2024-06-30").unwrap(),
        )
    }

    fn verdict(acceptable: bool, confidence: f32) -> std::result::Result<Value, String> {
        Ok(json!({
            "acceptable": acceptable,
            "confidence": confidence,
            "feedback": format!("confidence {}", confidence),
            "suggestions": ["Add March"]
        }))
    }

    fn config(max_iterations: u32) -> Config {
        let mut config = Config::default();
        config.iteration.max_iterations = max_iterations;
        config.iteration.confidence_threshold = 0.8;
        config
    }

    fn controller(
        agent: Arc<ScriptedAgent>,
        judge: Arc<ScriptedProvider>,
        config: &Config,
    ) -> IterationController {
        IterationController::new(
            agent,
            QualityJudge::new(judge, Duration::from_secs(5)),
            config,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_stops_at_first_accepted() {
        let agent = Arc::new(ScriptedAgent::replying(AGENT_REPLY));
        let judge = Arc::new(ScriptedProvider::new(vec![
            verdict(true, 0.3),
            verdict(true, 0.95),
            verdict(true, 0.5),
        ]));

        let outcome = controller(agent.clone(), judge.clone(), &config(3))
            .run(&request())
            .await
            .unwrap();

        assert_eq!(outcome.iterations(), 2);
        assert_eq!(outcome.stop_reason, StopReason::Accepted);
        assert_eq!(outcome.final_index, 2);
        assert_eq!(agent.calls(), 2);
        assert_eq!(judge.calls(), 2);

        let finalized = outcome.finalized();
        assert_eq!(finalized.method, ExtractionMethod::FencedJson);
        assert_eq!(finalized.data.get("Feb", "2024"), Some(15.0));
        assert!(outcome.source().is_agent());
    }

    #[tokio::test]
    async fn test_largest_cap_stops_on_first_acceptance() {
        let agent = Arc::new(ScriptedAgent::replying(AGENT_REPLY));
        let judge = Arc::new(ScriptedProvider::new(vec![verdict(true, 0.99)]));

        let outcome = controller(
            agent.clone(),
            judge.clone(),
            &config(crate::constants::iteration::ITERATION_CAP_LIMIT),
        )
        .run(&request())
        .await
        .unwrap();

        assert_eq!(outcome.iterations(), 1);
        assert_eq!(outcome.stop_reason, StopReason::Accepted);
        assert_eq!(agent.calls(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_finalizes_best() {
        let agent = Arc::new(ScriptedAgent::replying(AGENT_REPLY));
        let judge = Arc::new(ScriptedProvider::new(vec![
            verdict(false, 0.3),
            verdict(false, 0.5),
            verdict(false, 0.6),
        ]));

        let outcome = controller(agent, judge, &config(3))
            .run(&request())
            .await
            .unwrap();

        assert_eq!(outcome.iterations(), 3);
        assert_eq!(outcome.stop_reason, StopReason::Exhausted);
        assert_eq!(outcome.final_index, 3);
    }

    #[tokio::test]
    async fn test_acceptable_below_threshold_continues() {
        let agent = Arc::new(ScriptedAgent::replying(AGENT_REPLY));
        let judge = Arc::new(ScriptedProvider::new(vec![
            verdict(true, 0.7),
            verdict(false, 0.9),
        ]));

        let outcome = controller(agent, judge, &config(2))
            .run(&request())
            .await
            .unwrap();

        assert_eq!(outcome.stop_reason, StopReason::Exhausted);
        assert_eq!(outcome.final_index, 2);
    }

    #[tokio::test]
    async fn test_feedback_carried_forward() {
        let agent = Arc::new(ScriptedAgent::replying(AGENT_REPLY));
        let judge = Arc::new(ScriptedProvider::new(vec![
            verdict(false, 0.2),
            verdict(true, 0.9),
        ]));

        controller(agent.clone(), judge, &config(3))
            .run(&request())
            .await
            .unwrap();

        let prompts = agent.prompts();
        assert!(!prompts[0].contains("Previous Attempt Feedback"));
        assert!(prompts[1].contains("confidence 0.2"));
        assert!(prompts[1].contains("Add March"));
    }

    #[tokio::test]
    async fn test_agent_failure_without_fallback() {
        let agent = Arc::new(ScriptedAgent::new(vec![Err("server down".to_string())]));
        let judge = Arc::new(ScriptedProvider::new(vec![verdict(false, 0.1)]));

        let outcome = controller(agent, judge, &config(2))
            .run(&request())
            .await
            .unwrap();

        assert_eq!(outcome.iterations(), 2);
        let finalized = outcome.finalized();
        assert!(matches!(finalized.source, DataSource::AgentFailed { ref reason } if reason.contains("server down")));
        assert!(finalized.raw_response.is_empty());
        assert!(finalized.data.is_empty());
    }

    #[tokio::test]
    async fn test_agent_failure_with_fallback() {
        let agent = Arc::new(ScriptedAgent::new(vec![Err("server down".to_string())]));
        let judge = Arc::new(ScriptedProvider::new(vec![verdict(true, 0.9)]));
        let mut config = config(3);
        config.iteration.fallback_payload = Some("```json\n{\"Jan\": {\"2023\": 1}}\n```".to_string());

        let outcome = controller(agent, judge, &config)
            .run(&request())
            .await
            .unwrap();

        assert_eq!(outcome.stop_reason, StopReason::Accepted);
        assert!(matches!(outcome.source(), DataSource::Fallback { .. }));
        assert!(!outcome.source().is_agent());
        assert_eq!(outcome.finalized().data.get("Jan", "2023"), Some(1.0));
    }

    #[tokio::test]
    async fn test_judge_failure_is_recorded() {
        let agent = Arc::new(ScriptedAgent::replying(AGENT_REPLY));
        let judge = Arc::new(ScriptedProvider::new(vec![Err("rate limited".to_string())]));

        let outcome = controller(agent, judge, &config(2))
            .run(&request())
            .await
            .unwrap();

        assert_eq!(outcome.stop_reason, StopReason::Exhausted);
        assert_eq!(outcome.final_index, 1);
        for record in &outcome.records {
            assert_eq!(record.decision.confidence, 0.0);
            assert!(!record.decision.acceptable);
            assert!(record.judge_error.as_deref().unwrap().contains("rate limited"));
        }
    }

    #[test]
    fn test_rejects_invalid_settings() {
        let agent = Arc::new(ScriptedAgent::replying(AGENT_REPLY));
        let judge = Arc::new(ScriptedProvider::new(vec![]));

        let result = IterationController::new(
            agent.clone(),
            QualityJudge::new(judge.clone(), Duration::from_secs(5)),
            &config(0),
        );
        assert!(matches!(result, Err(DeckError::Config(_))));

        let result = IterationController::new(
            agent.clone(),
            QualityJudge::new(judge.clone(), Duration::from_secs(5)),
            &config(u32::MAX),
        );
        assert!(matches!(result, Err(DeckError::Config(_))));

        let mut config = config(3);
        config.iteration.confidence_threshold = 1.2;
        let result = IterationController::new(
            agent.clone(),
            QualityJudge::new(judge, Duration::from_secs(5)),
            &config,
        );
        assert!(result.is_err());
        assert_eq!(agent.calls(), 0);
    }

    fn run_blocking(
        max_iterations: u32,
        confidences: &[f32],
        acceptable: bool,
    ) -> IterationOutcome {
        let agent = Arc::new(ScriptedAgent::replying(AGENT_REPLY));
        let judge = Arc::new(ScriptedProvider::new(
            confidences.iter().map(|c| verdict(acceptable, *c)).collect(),
        ));
        let controller = controller(agent, judge, &config(max_iterations));
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(controller.run(&request()))
            .unwrap()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn prop_never_exceeds_cap(
            max in 1u32..8,
            confidences in prop::collection::vec(0.0f32..=1.0, 1..10)
        ) {
            let outcome = run_blocking(max, &confidences, true);
            prop_assert!(outcome.iterations() <= max as usize);
        }

        #[test]
        fn prop_exhausted_finalizes_max_confidence(
            max in 1u32..8,
            confidences in prop::collection::vec(0.0f32..=1.0, 1..10)
        ) {
            let outcome = run_blocking(max, &confidences, false);
            prop_assert_eq!(outcome.iterations(), max as usize);
            prop_assert_eq!(outcome.stop_reason, StopReason::Exhausted);

            let chosen = outcome.finalized().decision.confidence;
            for record in &outcome.records {
                prop_assert!(record.decision.confidence <= chosen);
                if record.index < outcome.final_index {
                    prop_assert!(record.decision.confidence < chosen);
                }
            }
        }

        #[test]
        fn prop_accepts_first_confident(
            confidences in prop::collection::vec(0.0f32..=1.0, 1..6)
        ) {
            let max = confidences.len() as u32;
            let outcome = run_blocking(max, &confidences, true);
            let first = confidences.iter().position(|c| *c >= 0.8);
            match first {
                Some(i) => {
                    prop_assert_eq!(outcome.stop_reason, StopReason::Accepted);
                    prop_assert_eq!(outcome.final_index, i as u32 + 1);
                }
                None => prop_assert_eq!(outcome.stop_reason, StopReason::Exhausted),
            }
        }
    }
}
