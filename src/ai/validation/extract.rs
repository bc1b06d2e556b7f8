//! Structured-data extraction from agent free text
//!
//! Tries, in order: the tagged envelope, a ```json fence, any fence, the
//! first-`{` to last-`}` span, and finally the whole text with single quotes
//! swapped for double quotes. Every candidate is retried with quotes
//! normalized. Failure yields an empty mapping, never an error.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{debug, warn};

use super::envelope::{Envelope, parse_envelope};
use super::json_repair::JsonRepairer;
use crate::types::{StructuredData, paragraph_from_value};

static JSON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)```json\s*(.*?)```").expect("valid json fence regex"));

static ANY_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_-]*\s*(.*?)```").expect("valid fence regex")
});

/// How the payload was located
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Envelope,
    FencedJson,
    FencedBlock,
    BraceSpan,
    QuoteNormalized,
    /// Nothing parsed
    NotFound,
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Envelope => "envelope",
            Self::FencedJson => "fenced_json",
            Self::FencedBlock => "fenced_block",
            Self::BraceSpan => "brace_span",
            Self::QuoteNormalized => "quote_normalized",
            Self::NotFound => "not_found",
        };
        write!(f, "{}", s)
    }
}

/// Result of one extraction
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Parsed payload (Null when nothing parsed)
    pub value: Value,
    pub data: StructuredData,
    pub paragraph: Option<String>,
    pub method: ExtractionMethod,
    /// Reason carried by a `parseError` envelope, or why strict mode rejected the text
    pub upstream_error: Option<String>,
}

impl Extraction {
    fn empty(method: ExtractionMethod, upstream_error: Option<String>) -> Self {
        Self {
            value: Value::Null,
            data: StructuredData::default(),
            paragraph: None,
            method,
            upstream_error,
        }
    }

    fn from_value(value: Value, method: ExtractionMethod) -> Self {
        Self {
            data: StructuredData::from_value(&value),
            paragraph: paragraph_from_value(&value),
            value,
            method,
            upstream_error: None,
        }
    }
}

/// Extractor over agent free text
#[derive(Debug, Clone, Default)]
pub struct StructuredExtractor {
    require_envelope: bool,
    repairer: JsonRepairer,
}

impl StructuredExtractor {
    pub fn new(require_envelope: bool) -> Self {
        Self {
            require_envelope,
            repairer: JsonRepairer::new(),
        }
    }

    pub fn extract(&self, raw: &str) -> Extraction {
        if let Some(envelope) = parse_envelope(raw) {
            return match envelope {
                Envelope::Parsed(value) => Extraction::from_value(value, ExtractionMethod::Envelope),
                Envelope::ParseError(reason) => {
                    warn!(reason = %reason, "Agent reported a parse error");
                    Extraction::empty(ExtractionMethod::Envelope, Some(reason))
                }
            };
        }

        if self.require_envelope {
            debug!("Response is not a tagged envelope, strict mode rejects it");
            return Extraction::empty(
                ExtractionMethod::NotFound,
                Some("response is not a tagged envelope".to_string()),
            );
        }

        let candidates = [
            (ExtractionMethod::FencedJson, capture(&JSON_FENCE, raw)),
            (ExtractionMethod::FencedBlock, capture(&ANY_FENCE, raw)),
            (ExtractionMethod::BraceSpan, brace_span(raw)),
        ];

        for (method, candidate) in candidates {
            if let Some(text) = candidate
                && let Some(value) = self.parse_candidate(text)
            {
                debug!(%method, "Extracted structured data");
                return Extraction::from_value(value, method);
            }
        }

        if let Some(value) = self.parse_strict(&raw.replace('\'', "\"")) {
            return Extraction::from_value(value, ExtractionMethod::QuoteNormalized);
        }

        debug!("No JSON found in agent response");
        Extraction::empty(ExtractionMethod::NotFound, None)
    }

    fn parse_candidate(&self, text: &str) -> Option<Value> {
        self.parse_strict(text)
            .or_else(|| self.parse_strict(&text.replace('\'', "\"")))
    }

    /// Objects only; scalars and arrays are not chart data
    fn parse_strict(&self, text: &str) -> Option<Value> {
        let text = text.trim();
        let value = serde_json::from_str::<Value>(text)
            .ok()
            .or_else(|| self.repairer.repair(text))?;
        value.is_object().then_some(value)
    }
}

fn capture<'a>(re: &Regex, text: &'a str) -> Option<&'a str> {
    re.captures(text)?.get(1).map(|m| m.as_str())
}

fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
