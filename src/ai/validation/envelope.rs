//! Tagged payload envelope
//!
//! Agents that support it answer with exactly one of
//! `{"parsed": <payload>}` or `{"parseError": "<reason>"}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Envelope<T = Value> {
    Parsed(T),
    ParseError(String),
}

impl<T> Envelope<T> {
    pub fn into_result(self) -> std::result::Result<T, String> {
        match self {
            Envelope::Parsed(payload) => Ok(payload),
            Envelope::ParseError(reason) => Err(reason),
        }
    }
}

/// Parse the whole text as an envelope, tolerating one surrounding code fence
pub fn parse_envelope(text: &str) -> Option<Envelope> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);
    serde_json::from_str::<Envelope>(body.trim()).ok()
}
