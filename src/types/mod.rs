pub mod data;
pub mod error;

pub use data::{SINGLE_SERIES_LABEL, StructuredData, paragraph_from_value};
pub use error::{DeckError, ErrorCategory, ErrorClassifier, LlmError, Result};

// =============================================================================
// Domain Newtypes
// =============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type-safe wrapper for merchant tokens
///
/// Prevents accidental mixing of merchant identifiers with other string types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MerchantToken(String);

impl MerchantToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MerchantToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MerchantToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for MerchantToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Inclusive reporting window in `YYYY-MM-DD` form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

impl DateRange {
    /// Build a range, rejecting unparsable dates and reversed bounds
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let parse = |s: &str| {
            chrono::NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|e| DeckError::Config(format!("Invalid date '{}': {}", s, e)))
        };
        let (from, to) = (parse(start)?, parse(end)?);
        if from > to {
            return Err(DeckError::Config(format!(
                "Start date {} is after end date {}",
                start, end
            )));
        }
        Ok(Self {
            start: from.format("%Y-%m-%d").to_string(),
            end: to.format("%Y-%m-%d").to_string(),
        })
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Type-safe wrapper for MCP session IDs
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Truncate to at most `max_chars` characters on a char boundary
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
