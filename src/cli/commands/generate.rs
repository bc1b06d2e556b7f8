//! Generate Command
//!
//! Full run: iteration loop per metric, charts, Slides deck, JSON report.

use std::path::PathBuf;

use crate::ai::prompt::KNOWN_METRICS;
use crate::cli::Output;
use crate::config::{Config, ConfigLoader};
use crate::pipeline::{DeckPipeline, DeckReport};
use crate::types::{DateRange, DeckError, MerchantToken, Result};

#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub merchant: String,
    pub start: String,
    pub end: String,
    /// Empty means every catalog metric
    pub metrics: Vec<String>,
    pub config_path: Option<PathBuf>,
    pub template: Option<String>,
    pub folder: Option<String>,
    pub max_iterations: Option<u32>,
    pub threshold: Option<f32>,
    pub allow_fallback: bool,
    pub no_deck: bool,
    pub no_pdf: bool,
    pub report: Option<PathBuf>,
}

impl GenerateOptions {
    /// CLI flags take precedence over every config source
    fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(template) = &self.template {
            config.deck.template_id = Some(template.clone());
        }
        if let Some(folder) = &self.folder {
            config.deck.folder_id = Some(folder.clone());
        }
        if let Some(max) = self.max_iterations {
            config.iteration.max_iterations = max;
        }
        if let Some(threshold) = self.threshold {
            config.iteration.confidence_threshold = threshold;
        }
        if self.allow_fallback {
            config.iteration.allow_fallback_data = true;
        }
        if self.no_deck {
            config.deck.enabled = false;
        }
        if self.no_pdf {
            config.deck.export_pdf = false;
        }
        config.validate()
    }

    fn metrics(&self) -> Vec<String> {
        if self.metrics.is_empty() {
            KNOWN_METRICS.iter().map(|m| m.name.to_string()).collect()
        } else {
            self.metrics.clone()
        }
    }
}

pub async fn run(options: GenerateOptions) -> Result<DeckReport> {
    let output = Output::new();

    let mut config = match &options.config_path {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    options.apply(&mut config)?;

    let merchant = MerchantToken::new(options.merchant.trim());
    if merchant.as_str().is_empty() {
        return Err(DeckError::Config("merchant token must not be empty".to_string()));
    }
    let range = DateRange::parse(&options.start, &options.end)?;
    let metrics = options.metrics();

    output.info(&format!(
        "Generating {} metrics for {} ({}), up to {} iterations each",
        metrics.len(),
        merchant,
        range,
        config.iteration.max_iterations
    ));

    let pipeline = DeckPipeline::from_config(&config)?;
    let report = pipeline.run(&merchant, &range, &metrics).await?;

    output.report(&report);
    if let Some(path) = &options.report {
        report.write_json(path)?;
        output.info(&format!("Report written to {}", path.display()));
    }

    Ok(report)
}
