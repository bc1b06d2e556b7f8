//! Model Output Parsing
//!
//! - `json_repair`: lenient JSON parsing for provider responses
//! - `envelope`: strict `{"parsed": ..}` / `{"parseError": ..}` payloads
//! - `extract`: structured chart data from agent free text

mod envelope;
mod extract;
mod json_repair;

pub use envelope::{Envelope, parse_envelope};
pub use extract::{Extraction, ExtractionMethod, StructuredExtractor};
pub use json_repair::{JsonRepairer, extract_json_from_response};
