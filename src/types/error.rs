//! Error types
//!
//! `DeckError` is the crate-wide error. Remote failures (LLM providers, the
//! MCP agent, Google APIs) carry an `LlmError` whose `ErrorCategory` decides
//! whether a Google call is retried and how a masked agent failure is logged.
//!
//! Errors inside the iteration loop are never thrown to the caller; they are
//! recorded on the iteration and surfaced through its data source.

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Categories
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    RateLimit,
    Auth,
    Network,
    /// 5xx and "try again later" responses
    Transient,
    /// Missing resource or endpoint
    Unavailable,
    BadRequest,
    ParseError,
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::RateLimit => "RATE_LIMIT",
            Self::Auth => "AUTH",
            Self::Network => "NETWORK",
            Self::Transient => "TRANSIENT",
            Self::Unavailable => "UNAVAILABLE",
            Self::BadRequest => "BAD_REQUEST",
            Self::ParseError => "PARSE_ERROR",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

impl ErrorCategory {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit | Self::Network | Self::Transient)
    }
}

// =============================================================================
// Remote Error
// =============================================================================

/// Categorized failure reported by a remote service
#[derive(Debug, Clone)]
pub struct LlmError {
    pub category: ErrorCategory,
    pub message: String,
    /// Service name: "openai", "ollama", "mcp", "google", ...
    pub provider: String,
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}:{}] {}", self.provider, self.category, self.message)
    }
}

impl std::error::Error for LlmError {}

impl LlmError {
    pub fn new(category: ErrorCategory, message: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            provider: provider.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category.is_retryable()
    }
}

// =============================================================================
// Classifier
// =============================================================================

/// First matching row wins, so more specific phrases come first
const KEYWORDS: &[(ErrorCategory, &[&str])] = &[
    (
        ErrorCategory::RateLimit,
        &["rate limit", "429", "too many requests", "quota", "resource_exhausted"],
    ),
    (
        ErrorCategory::Auth,
        &["401", "403", "api key", "unauthorized", "permission denied", "invalid_grant"],
    ),
    (
        ErrorCategory::Network,
        &["connect", "dns", "timed out", "timeout", "unreachable", "network", "broken pipe"],
    ),
    (
        ErrorCategory::Transient,
        &["500", "502", "503", "504", "overloaded", "temporar", "backend error", "try again"],
    ),
    (ErrorCategory::Unavailable, &["404", "not found", "unavailable"]),
    (
        ErrorCategory::BadRequest,
        &["400", "bad request", "malformed", "invalid argument"],
    ),
    (ErrorCategory::ParseError, &["parse", "json", "decod", "expected value"]),
];

pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Categorize a free-form error message
    pub fn classify(message: &str, provider: &str) -> LlmError {
        let lower = message.to_lowercase();
        let category = KEYWORDS
            .iter()
            .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
            .map_or(ErrorCategory::Unknown, |(category, _)| *category);
        LlmError::new(category, message, provider)
    }

    /// Categorize by HTTP status; preferred over message matching
    pub fn classify_http_status(status: u16, message: &str, provider: &str) -> LlmError {
        let category = match status {
            429 => ErrorCategory::RateLimit,
            401 | 403 => ErrorCategory::Auth,
            400 | 422 => ErrorCategory::BadRequest,
            404 | 410 => ErrorCategory::Unavailable,
            408 | 500..=599 => ErrorCategory::Transient,
            _ => ErrorCategory::Unknown,
        };
        LlmError::new(category, message, provider)
    }

    /// Categorize any `DeckError`, keeping the category of remote errors
    pub fn classify_deck_error(err: &DeckError, provider: &str) -> LlmError {
        let category = match err {
            DeckError::Llm(e) | DeckError::Google(e) => return e.clone(),
            DeckError::LlmApi(msg) | DeckError::Agent(msg) => {
                return Self::classify(msg, provider);
            }
            DeckError::Timeout { .. } => ErrorCategory::Network,
            DeckError::Json(_) => ErrorCategory::ParseError,
            DeckError::Auth(_) => ErrorCategory::Auth,
            DeckError::Config(_) => ErrorCategory::BadRequest,
            _ => ErrorCategory::Unknown,
        };
        LlmError::new(category, err.to_string(), provider)
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum DeckError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    // -------------------------------------------------------------------------
    // Remote Service Errors
    // -------------------------------------------------------------------------
    /// Structured LLM error with category and retry hints
    #[error("LLM error: {0}")]
    Llm(LlmError),

    /// Simple LLM API error (use Llm variant for structured errors)
    #[error("LLM API error: {0}")]
    LlmApi(String),

    /// Analysis agent invocation failed
    #[error("Agent error: {0}")]
    Agent(String),

    /// Google Drive / Slides API failure
    #[error("Google API error: {0}")]
    Google(LlmError),

    #[error("Authentication error: {0}")]
    Auth(String),

    /// Operation timeout with context
    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    // -------------------------------------------------------------------------
    // Domain Errors
    // -------------------------------------------------------------------------
    #[error("Config error: {0}")]
    Config(String),

    #[error("Chart rendering failed: {0}")]
    Chart(String),

    #[error("Deck assembly failed: {0}")]
    Deck(String),

    /// Finalized data for a metric did not come from the agent
    #[error("Metric '{metric}' finalized with {source_kind} data")]
    UntrustedData { metric: String, source_kind: String },
}

impl From<LlmError> for DeckError {
    fn from(err: LlmError) -> Self {
        DeckError::Llm(err)
    }
}

pub type Result<T> = std::result::Result<T, DeckError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl DeckError {
    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Model output that could not be turned into JSON
    pub fn unparseable(message: impl Into<String>) -> Self {
        Self::Llm(LlmError::new(ErrorCategory::ParseError, message, "llm"))
    }

    /// Create a Google API error from an HTTP status
    pub fn google_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::Google(ErrorClassifier::classify_http_status(
            status, &message, "google",
        ))
    }

    /// Check if this error is worth retrying
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Llm(e) | Self::Google(e) => e.is_retryable(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
