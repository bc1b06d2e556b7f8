//! Lenient JSON parsing for model output
//!
//! Tried in order: the text as is (minus a code fence), trailing commas
//! dropped and closers appended, then the first balanced span in the text.

use serde_json::Value;
use tracing::debug;

use crate::types::{DeckError, Result};

pub fn extract_json_from_response(content: &str) -> Result<Value> {
    JsonRepairer::new().parse_or_repair(content).map(|(value, _)| value)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonRepairer;

impl JsonRepairer {
    pub fn new() -> Self {
        Self
    }

    /// The flag is true when anything beyond fence stripping was needed
    pub fn parse_or_repair(&self, raw: &str) -> Result<(Value, bool)> {
        let cleaned = Self::preprocess(raw);

        if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
            return Ok((value, false));
        }

        if let Some(value) = self.repair(&cleaned) {
            debug!("JSON parsed after repair");
            return Ok((value, true));
        }

        if let Some(span) = balanced_span(&cleaned)
            && let Ok(value) = serde_json::from_str::<Value>(span)
        {
            debug!("JSON extracted from mixed content");
            return Ok((value, true));
        }

        let preview: String = cleaned.chars().take(200).collect();
        Err(DeckError::unparseable(format!("No JSON found in model output: {}...", preview)))
    }

    pub fn repair(&self, s: &str) -> Option<Value> {
        let fixed = fix_trailing_commas(s);
        if let Ok(value) = serde_json::from_str::<Value>(&fixed) {
            return Some(value);
        }
        serde_json::from_str::<Value>(&balance_brackets(&fixed)).ok()
    }

    fn preprocess(raw: &str) -> String {
        let s = raw.trim().trim_start_matches('\u{feff}');
        strip_code_fences(s).trim().to_string()
    }
}

fn strip_code_fences(s: &str) -> &str {
    let body = match s.strip_prefix("```") {
        // drop the info string (`json`, `JSON`, ...) along with the fence
        Some(rest) => rest.split_once('\n').map_or("", |(_, body)| body),
        None => s,
    };
    body.trim_end()
        .strip_suffix("```")
        .map_or(body, str::trim_end)
}

/// Drop commas directly before `]` or `}`
fn fix_trailing_commas(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len());
    let mut in_string = false;
    let mut escape = false;

    for (i, &ch) in chars.iter().enumerate() {
        if escape {
            escape = false;
            result.push(ch);
            continue;
        }
        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            ',' if !in_string => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if matches!(next, Some(']') | Some('}')) {
                    continue;
                }
            }
            _ => {}
        }
        result.push(ch);
    }

    result
}

/// Close unterminated strings and append missing closers
fn balance_brackets(s: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escape = false;

    for ch in s.chars() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            '{' if !in_string => stack.push('}'),
            '[' if !in_string => stack.push(']'),
            '}' | ']' if !in_string => {
                stack.pop();
            }
            _ => {}
        }
    }

    let mut result = s.to_string();
    if in_string {
        result.push('"');
    }
    while let Some(closer) = stack.pop() {
        result.push(closer);
    }
    result
}

/// First balanced `{...}` or `[...]` span, string-aware
fn balanced_span(s: &str) -> Option<&str> {
    let start = s.find(['{', '['])?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;

    for (i, ch) in s[start..].char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            '{' | '[' if !in_string => depth += 1,
            '}' | ']' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&s[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
