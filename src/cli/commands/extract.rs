//! Extract Command
//!
//! Runs the structured-data extractor over saved agent output.

use std::io::Read;
use std::path::Path;

use serde_json::json;

use crate::ai::validation::StructuredExtractor;
use crate::types::Result;

pub fn run(input: Option<&Path>, require_envelope: bool) -> Result<()> {
    let raw = match input {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let extraction = StructuredExtractor::new(require_envelope).extract(&raw);
    let output = json!({
        "method": extraction.method,
        "structured_data": extraction.data,
        "paragraph": extraction.paragraph,
        "upstream_error": extraction.upstream_error,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
