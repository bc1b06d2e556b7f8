//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/deckweaver/) and project (.deckweaver/) level configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ai::provider::ProviderConfig;
use crate::constants::{agent, chart, google, iteration, judge};
use crate::types::{DeckError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Analysis agent settings
    pub agent: AgentConfig,

    /// Quality judge (LLM provider) settings
    pub judge: JudgeConfig,

    /// Judge-and-retry loop settings
    pub iteration: IterationConfig,

    /// Structured-data extraction settings
    pub extraction: ExtractionConfig,

    /// Chart rendering settings
    pub chart: ChartConfig,

    /// Slide deck assembly settings
    pub deck: DeckConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            agent: AgentConfig::default(),
            judge: JudgeConfig::default(),
            iteration: IterationConfig::default(),
            extraction: ExtractionConfig::default(),
            chart: ChartConfig::default(),
            deck: DeckConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `DeckError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        self.iteration.validate()?;

        if !(0.0..=2.0).contains(&self.judge.temperature) {
            return Err(DeckError::Config(format!(
                "Judge temperature must be between 0.0 and 2.0, got {}",
                self.judge.temperature
            )));
        }

        if self.judge.timeout_secs == 0 {
            return Err(DeckError::Config(
                "Judge timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.agent.timeout_secs == 0 {
            return Err(DeckError::Config(
                "Agent timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.agent.max_steps == 0 {
            return Err(DeckError::Config(
                "Agent max_steps must be greater than 0".to_string(),
            ));
        }

        if self.chart.width_inches <= 0.0 || self.chart.height_inches <= 0.0 || self.chart.dpi == 0
        {
            return Err(DeckError::Config(format!(
                "Chart size must be positive, got {}x{} in at {} dpi",
                self.chart.width_inches, self.chart.height_inches, self.chart.dpi
            )));
        }

        Ok(())
    }
}

// =============================================================================
// Agent Configuration
// =============================================================================

/// Which analysis agent client to use
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    /// MCP server exposing an analysis tool over streamable HTTP
    #[default]
    Mcp,
    /// Direct LLM provider call (no data tools)
    Provider,
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentKind::Mcp => write!(f, "mcp"),
            AgentKind::Provider => write!(f, "provider"),
        }
    }
}

impl std::str::FromStr for AgentKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mcp" => Ok(AgentKind::Mcp),
            "provider" => Ok(AgentKind::Provider),
            _ => Err(format!(
                "Unknown agent kind: {}. Valid values: mcp, provider",
                s
            )),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub kind: AgentKind,

    /// MCP endpoint URL (e.g. http://localhost:8000/mcp)
    pub endpoint: Option<String>,

    /// MCP tool name
    pub tool_name: String,

    /// Reasoning step budget passed to the agent
    pub max_steps: u32,

    /// Timeout for one agent call
    pub timeout_secs: u64,

    /// Bearer token for the MCP server. Never serialized.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Provider for `kind = "provider"` (defaults to the judge's)
    pub provider: Option<String>,

    /// Model for `kind = "provider"` (defaults to the judge's)
    pub model: Option<String>,
}

impl std::fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfig")
            .field("kind", &self.kind)
            .field("endpoint", &self.endpoint)
            .field("tool_name", &self.tool_name)
            .field("max_steps", &self.max_steps)
            .field("timeout_secs", &self.timeout_secs)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("provider", &self.provider)
            .field("model", &self.model)
            .finish()
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            kind: AgentKind::Mcp,
            endpoint: Some("http://localhost:8000/mcp".to_string()),
            tool_name: agent::DEFAULT_TOOL_NAME.to_string(),
            max_steps: agent::MAX_STEPS,
            timeout_secs: agent::DEFAULT_TIMEOUT_SECS,
            api_key: None,
            provider: None,
            model: None,
        }
    }
}

// =============================================================================
// Judge Configuration
// =============================================================================

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeConfig {
    /// Provider name: "openai", "ollama"
    pub provider: String,

    /// Model name (provider default when unset)
    pub model: Option<String>,

    /// Temperature (0.0 = deterministic)
    pub temperature: f32,

    /// API key. Never serialized.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Custom API base URL
    pub api_base: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum tokens to generate
    pub max_tokens: usize,
}

impl std::fmt::Debug for JudgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JudgeConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: None,
            temperature: 0.0,
            api_key: None,
            api_base: None,
            timeout_secs: judge::DEFAULT_TIMEOUT_SECS,
            max_tokens: 2048,
        }
    }
}

impl JudgeConfig {
    pub fn to_provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            provider: self.provider.clone(),
            model: self.model.clone(),
            timeout_secs: self.timeout_secs,
            temperature: self.temperature,
            api_key: self.api_key.clone(),
            api_base: self.api_base.clone(),
            max_tokens: self.max_tokens,
        }
    }
}

// =============================================================================
// Iteration Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IterationConfig {
    /// Maximum passes per metric (>= 1)
    pub max_iterations: u32,

    /// Judge confidence needed for early acceptance (0.0-1.0)
    pub confidence_threshold: f32,

    /// Text substituted when the agent call fails
    pub fallback_payload: Option<String>,

    /// Put fallback-sourced data into the deck
    pub allow_fallback_data: bool,
}

impl Default for IterationConfig {
    fn default() -> Self {
        Self {
            max_iterations: iteration::MAX_ITERATIONS,
            confidence_threshold: iteration::CONFIDENCE_THRESHOLD,
            fallback_payload: None,
            allow_fallback_data: false,
        }
    }
}

impl IterationConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1..=iteration::ITERATION_CAP_LIMIT).contains(&self.max_iterations) {
            return Err(DeckError::Config(format!(
                "max_iterations must be between 1 and {}, got {}",
                iteration::ITERATION_CAP_LIMIT,
                self.max_iterations
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(DeckError::Config(format!(
                "confidence_threshold must be between 0.0 and 1.0, got {}",
                self.confidence_threshold
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Extraction Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Only accept `{"parsed": ...}` / `{"parseError": ...}` payloads
    pub require_envelope: bool,
}

// =============================================================================
// Chart Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    /// Directory receiving rendered PNGs
    pub output_dir: PathBuf,

    pub width_inches: f32,

    pub height_inches: f32,

    pub dpi: u32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            output_dir: std::env::temp_dir().join("deckweaver"),
            width_inches: chart::WIDTH_INCHES,
            height_inches: chart::HEIGHT_INCHES,
            dpi: chart::DPI,
        }
    }
}

impl ChartConfig {
    /// Pixel dimensions of rendered charts
    pub fn pixel_size(&self) -> (u32, u32) {
        let dpi = self.dpi as f32;
        (
            (self.width_inches * dpi).round().max(1.0) as u32,
            (self.height_inches * dpi).round().max(1.0) as u32,
        )
    }
}

// =============================================================================
// Deck Configuration
// =============================================================================

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckConfig {
    /// Assemble the Slides deck after rendering charts
    pub enabled: bool,

    /// Slides template presentation id
    pub template_id: Option<String>,

    /// Drive folder receiving the copy and uploaded images
    pub folder_id: Option<String>,

    /// Service-account JSON key
    pub credentials_path: Option<PathBuf>,

    /// Static OAuth bearer token (used when no key file is set). Never serialized.
    #[serde(skip_serializing)]
    pub access_token: Option<String>,

    /// Export the finished deck as PDF
    pub export_pdf: bool,

    /// Directory receiving exported PDFs
    pub pdf_dir: PathBuf,

    pub slides_api_base: String,
    pub drive_api_base: String,
    pub drive_upload_base: String,
    pub token_uri: String,
}

impl std::fmt::Debug for DeckConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeckConfig")
            .field("enabled", &self.enabled)
            .field("template_id", &self.template_id)
            .field("folder_id", &self.folder_id)
            .field("credentials_path", &self.credentials_path)
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("export_pdf", &self.export_pdf)
            .field("pdf_dir", &self.pdf_dir)
            .field("slides_api_base", &self.slides_api_base)
            .field("drive_api_base", &self.drive_api_base)
            .finish()
    }
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            template_id: None,
            folder_id: None,
            credentials_path: None,
            access_token: None,
            export_pdf: true,
            pdf_dir: PathBuf::from("decks"),
            slides_api_base: google::SLIDES_API_BASE.to_string(),
            drive_api_base: google::DRIVE_API_BASE.to_string(),
            drive_upload_base: google::DRIVE_UPLOAD_BASE.to_string(),
            token_uri: google::TOKEN_URI.to_string(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
