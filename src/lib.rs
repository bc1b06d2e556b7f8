//! deckweaver - Judged Analytics to Slide Decks
//!
//! Queries a data-analysis agent for merchant metrics, has a second LLM judge
//! the extracted data, retries with the judge's feedback until the data is
//! accepted or the iteration cap is hit, then renders charts and fills a
//! Google Slides template.
//!
//! ## Quick Start
//!
//! ```ignore
//! use deckweaver::{ConfigLoader, DeckPipeline, DateRange, MerchantToken};
//!
//! let config = ConfigLoader::load()?;
//! let pipeline = DeckPipeline::from_config(&config)?;
//! let report = pipeline
//!     .run(
//!         &MerchantToken::from("merchant-123"),
//!         &DateRange::parse("2025-01-01", "2025-06-30")?,
//!         &["AOV".to_string()],
//!     )
//!     .await?;
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: agent clients, judge providers, prompts, structured-data extraction
//! - [`pipeline`]: iteration controller, quality judge, deck pipeline
//! - [`render`]: PNG chart rendering
//! - [`slides`]: Google Drive / Slides deck assembly
//! - [`config`]: layered configuration

pub mod ai;
pub mod cli;
pub mod config;
pub mod constants;
pub mod pipeline;
pub mod render;
pub mod slides;
pub mod types;

#[cfg(test)]
mod testing;

// =============================================================================
// Core Re-exports
// =============================================================================

pub use config::{Config, ConfigLoader};
pub use types::{
    DateRange, DeckError, ErrorCategory, MerchantToken, Result, StructuredData,
};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use pipeline::{
    DataSource, DeckPipeline, DeckReport, IterationController, IterationOutcome,
    IterationRecord, JudgeDecision, MetricReport, QualityJudge, StopReason,
};

// =============================================================================
// Collaborator Re-exports
// =============================================================================

pub use ai::{
    AnalysisAgent, ChartKind, LlmProvider, McpAgent, MetricRequest, StructuredExtractor,
    TimeoutConfig, with_timeout,
};
pub use render::{ChartRenderer, RasterChartRenderer, RenderedChart};
pub use slides::{DeckAssembler, DeckOutput, DeckSection, GoogleSlidesAssembler};
