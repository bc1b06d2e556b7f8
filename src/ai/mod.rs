//! AI Integration Layer
//!
//! Analysis agent clients, the LLM providers behind the quality judge,
//! prompt construction and extraction of structured data from free text.

pub mod agent;
pub mod prompt;
pub mod provider;
pub mod timeout;
pub mod validation;

pub use agent::{AnalysisAgent, McpAgent, ProviderAgent, SharedAgent, create_agent};
pub use prompt::{ChartKind, MetricRequest, PromptBuilder, RequestFormatter};
pub use provider::{
    ErrorCategory, ErrorClassifier, LlmError, LlmProvider, LlmResponse, ProviderConfig,
    SharedProvider, TokenUsage, create_provider,
};
pub use timeout::{TimeoutConfig, with_timeout};
pub use validation::{Extraction, ExtractionMethod, StructuredExtractor};
