//! Deck Pipeline
//!
//! Runs the iteration controller for every requested metric, renders the
//! finalized data as charts, and hands the resulting sections to the deck
//! assembler. Everything that happened is collected into a `DeckReport`.

pub mod controller;
pub mod judge;
pub mod types;

pub use controller::IterationController;
pub use judge::{JudgeInput, QualityJudge};
pub use types::{DataSource, IterationOutcome, IterationRecord, JudgeDecision, StopReason, select_best};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::ai::agent::create_agent;
use crate::ai::prompt::{ChartKind, MetricRequest};
use crate::ai::provider::create_provider;
use crate::ai::timeout::TimeoutConfig;
use crate::config::Config;
use crate::render::{RasterChartRenderer, RenderedChart, SharedRenderer};
use crate::slides::{DeckOutput, DeckSection, GoogleSlidesAssembler, SharedAssembler, slugify};
use crate::types::{DateRange, DeckError, MerchantToken, Result};

// =============================================================================
// Report
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricReport {
    pub metric: String,
    pub title: String,
    pub chart_kind: ChartKind,
    pub outcome: IterationOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<RenderedChart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paragraph: Option<String>,
    /// Why the metric was left out of the deck
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

impl MetricReport {
    pub fn section(&self) -> Option<DeckSection> {
        if self.skipped.is_some() {
            return None;
        }
        Some(DeckSection {
            title: self.title.clone(),
            paragraph: self.paragraph.clone(),
            chart_path: self.chart.as_ref().map(|c| c.path.clone()),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeckReport {
    pub run_id: String,
    pub merchant: MerchantToken,
    pub range: DateRange,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub metrics: Vec<MetricReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deck: Option<DeckOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deck_error: Option<String>,
}

impl DeckReport {
    pub fn rendered_count(&self) -> usize {
        self.metrics.iter().filter(|m| m.skipped.is_none()).count()
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

// =============================================================================
// Pipeline
// =============================================================================

pub struct DeckPipeline {
    controller: IterationController,
    renderer: SharedRenderer,
    assembler: Option<SharedAssembler>,
    chart_dir: PathBuf,
    allow_fallback_data: bool,
}

impl DeckPipeline {
    pub fn new(
        controller: IterationController,
        renderer: SharedRenderer,
        assembler: Option<SharedAssembler>,
        config: &Config,
    ) -> Self {
        Self {
            controller,
            renderer,
            assembler,
            chart_dir: config.chart.output_dir.clone(),
            allow_fallback_data: config.iteration.allow_fallback_data,
        }
    }

    /// Wire agent, judge, renderer and (when enabled) the Slides assembler
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let timeouts = TimeoutConfig::from_config(config);

        let agent = create_agent(config)?;
        let judge = QualityJudge::new(
            create_provider(&config.judge.to_provider_config())?,
            timeouts.judge_call,
        );
        let controller = IterationController::new(agent, judge, config)?;
        let renderer: SharedRenderer = Arc::new(RasterChartRenderer::from_config(&config.chart));

        let assembler: Option<SharedAssembler> = if config.deck.enabled {
            Some(Arc::new(GoogleSlidesAssembler::from_config(
                &config.deck,
                timeouts.google_request,
            )?))
        } else {
            None
        };

        Ok(Self::new(controller, renderer, assembler, config))
    }

    #[instrument(skip(self, metrics), fields(merchant = %merchant, metrics = metrics.len()))]
    pub async fn run(
        &self,
        merchant: &MerchantToken,
        range: &DateRange,
        metrics: &[String],
    ) -> Result<DeckReport> {
        let started_at = Utc::now();
        let mut reports = Vec::with_capacity(metrics.len());

        for metric in metrics {
            let request = MetricRequest::new(metric.as_str(), merchant.clone(), range.clone());
            let outcome = self.controller.run(&request).await?;
            reports.push(self.finish_metric(&request, outcome));
        }

        let sections: Vec<DeckSection> = reports.iter().filter_map(MetricReport::section).collect();
        let (deck, deck_error) = match &self.assembler {
            Some(assembler) => match assembler.assemble(&sections).await {
                Ok(output) => {
                    info!("Deck ready: {}", output.presentation_id);
                    (Some(output), None)
                }
                Err(e) => {
                    warn!("Deck assembly failed: {}", e);
                    (None, Some(e.to_string()))
                }
            },
            None => (None, None),
        };

        Ok(DeckReport {
            run_id: uuid::Uuid::new_v4().to_string(),
            merchant: merchant.clone(),
            range: range.clone(),
            started_at,
            finished_at: Utc::now(),
            metrics: reports,
            deck,
            deck_error,
        })
    }

    fn finish_metric(&self, request: &MetricRequest, outcome: IterationOutcome) -> MetricReport {
        let mut report = MetricReport {
            metric: request.metric.clone(),
            title: request.title(),
            chart_kind: request.chart_kind(),
            outcome,
            chart: None,
            paragraph: None,
            skipped: None,
        };

        let record = report.outcome.finalized();
        if !record.source.is_agent() && !self.allow_fallback_data {
            let reason = DeckError::UntrustedData {
                metric: request.metric.clone(),
                source_kind: record.source.kind().to_string(),
            };
            warn!("Skipping chart: {}", reason);
            report.skipped = Some(reason.to_string());
            return report;
        }
        if record.data.is_empty() {
            warn!(metric = %request.metric, "Skipping chart: no structured data");
            report.skipped = Some("No structured data extracted".to_string());
            return report;
        }

        let path = self.chart_dir.join(format!(
            "{}_iter_{}.png",
            slugify(&report.title),
            record.index
        ));
        match self.renderer.render(&record.data, report.chart_kind, &path) {
            Ok(chart) => {
                info!(metric = %request.metric, "Chart written to {}", chart.path.display());
                let paragraph = record
                    .paragraph
                    .clone()
                    .filter(|p| !p.trim().is_empty())
                    .unwrap_or_else(|| record.data.describe(&request.metric));
                report.paragraph = Some(paragraph);
                report.chart = Some(chart);
            }
            Err(e) => {
                warn!(metric = %request.metric, "Chart rendering failed: {}", e);
                report.skipped = Some(e.to_string());
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slides::DeckAssembler;
    use crate::testing::{ScriptedAgent, ScriptedProvider};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    const WITH_PARAGRAPH: &str = r#"{"structured_data": {"Jan": {"2024": 10, "2025": 14}, "Feb": {"2024": 12, "2025": 18}}, "paragraph": "Sales grew."}"#;

    #[derive(Default)]
    struct RecordingAssembler {
        sections: Mutex<Vec<DeckSection>>,
        fail: bool,
    }

    #[async_trait]
    impl DeckAssembler for RecordingAssembler {
        async fn assemble(&self, sections: &[DeckSection]) -> Result<DeckOutput> {
            self.sections.lock().unwrap().extend_from_slice(sections);
            if self.fail {
                return Err(DeckError::Deck("template missing".to_string()));
            }
            Ok(DeckOutput {
                presentation_id: "pres-1".to_string(),
                pdf_path: None,
                uploaded_images: Vec::new(),
            })
        }
    }

    fn accept() -> std::result::Result<serde_json::Value, String> {
        Ok(json!({"acceptable": true, "confidence": 0.9, "feedback": "ok", "suggestions": []}))
    }

    fn pipeline(
        dir: &TempDir,
        agent: ScriptedAgent,
        assembler: Option<SharedAssembler>,
        configure: impl FnOnce(&mut Config),
    ) -> DeckPipeline {
        let mut config = Config::default();
        config.iteration.max_iterations = 2;
        config.chart.output_dir = dir.path().join("charts");
        configure(&mut config);

        let judge = QualityJudge::new(
            Arc::new(ScriptedProvider::new(vec![accept()])),
            Duration::from_secs(5),
        );
        let controller = IterationController::new(Arc::new(agent), judge, &config).unwrap();
        DeckPipeline::new(
            controller,
            Arc::new(RasterChartRenderer::new(300, 120)),
            assembler,
            &config,
        )
    }

    fn request_args() -> (MerchantToken, DateRange) {
        (
            MerchantToken::from("m-42"),
            DateRange::parse("2025-01-01", "2025-02-28").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_renders_chart_and_assembles() {
        let dir = TempDir::new().unwrap();
        let assembler = Arc::new(RecordingAssembler::default());
        let pipeline = pipeline(
            &dir,
            ScriptedAgent::replying(WITH_PARAGRAPH),
            Some(assembler.clone()),
            |_| {},
        );
        let (merchant, range) = request_args();

        let report = pipeline
            .run(&merchant, &range, &["monthly sales year over year".to_string()])
            .await
            .unwrap();

        assert_eq!(report.rendered_count(), 1);
        let metric = &report.metrics[0];
        assert_eq!(metric.outcome.stop_reason, StopReason::Accepted);
        assert_eq!(metric.paragraph.as_deref(), Some("Sales grew."));
        let chart = metric.chart.as_ref().unwrap();
        assert!(chart.path.exists());
        assert!(chart.path.to_string_lossy().ends_with("_iter_1.png"));

        assert_eq!(report.deck.as_ref().unwrap().presentation_id, "pres-1");
        let sections = assembler.sections.lock().unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].chart_path.as_ref(), Some(&chart.path));
    }

    #[tokio::test]
    async fn test_synthesizes_paragraph_when_missing() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(
            &dir,
            ScriptedAgent::replying(r#"{"Jan": {"value": 5}, "Feb": {"value": 9}}"#),
            None,
            |_| {},
        );
        let (merchant, range) = request_args();

        let report = pipeline.run(&merchant, &range, &["AOV".to_string()]).await.unwrap();
        let paragraph = report.metrics[0].paragraph.as_deref().unwrap();
        assert!(paragraph.starts_with("AOV across 2 categories"));
        assert!(report.deck.is_none());
        assert!(report.deck_error.is_none());
    }

    #[tokio::test]
    async fn test_fallback_data_is_skipped() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(
            &dir,
            ScriptedAgent::new(vec![Err("connection refused".to_string())]),
            None,
            |c| c.iteration.fallback_payload = Some(WITH_PARAGRAPH.to_string()),
        );
        let (merchant, range) = request_args();

        let report = pipeline.run(&merchant, &range, &["AOV".to_string()]).await.unwrap();
        let metric = &report.metrics[0];
        assert!(matches!(metric.outcome.source(), DataSource::Fallback { .. }));
        assert_eq!(
            metric.skipped.as_deref(),
            Some("Metric 'AOV' finalized with fallback data")
        );
        assert!(metric.chart.is_none());
        assert_eq!(report.rendered_count(), 0);
    }

    #[tokio::test]
    async fn test_fallback_data_allowed() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(
            &dir,
            ScriptedAgent::new(vec![Err("connection refused".to_string())]),
            None,
            |c| {
                c.iteration.fallback_payload = Some(WITH_PARAGRAPH.to_string());
                c.iteration.allow_fallback_data = true;
            },
        );
        let (merchant, range) = request_args();

        let report = pipeline.run(&merchant, &range, &["AOV".to_string()]).await.unwrap();
        assert!(report.metrics[0].chart.is_some());
    }

    #[tokio::test]
    async fn test_empty_data_skipped_and_deck_error_reported() {
        let dir = TempDir::new().unwrap();
        let assembler = Arc::new(RecordingAssembler {
            fail: true,
            ..RecordingAssembler::default()
        });
        let pipeline = pipeline(
            &dir,
            ScriptedAgent::replying("I could not find any data."),
            Some(assembler),
            |_| {},
        );
        let (merchant, range) = request_args();

        let report = pipeline.run(&merchant, &range, &["AOV".to_string()]).await.unwrap();
        assert_eq!(
            report.metrics[0].skipped.as_deref(),
            Some("No structured data extracted")
        );
        assert!(report.deck.is_none());
        assert!(report.deck_error.as_deref().unwrap().contains("template missing"));
    }

    #[tokio::test]
    async fn test_report_written_as_json() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(&dir, ScriptedAgent::replying(WITH_PARAGRAPH), None, |_| {});
        let (merchant, range) = request_args();
        let report = pipeline.run(&merchant, &range, &["AOV".to_string()]).await.unwrap();

        let path = dir.path().join("out/report.json");
        report.write_json(&path).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["merchant"], "m-42");
        assert_eq!(value["metrics"][0]["outcome"]["stop_reason"], "accepted");
        assert!(value.get("deck").is_none());
    }
}
