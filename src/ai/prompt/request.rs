//! Agent query formatting

use serde::{Deserialize, Serialize};

use super::PromptBuilder;
use super::catalog::{ChartKind, chart_kind_for, title_for};
use crate::types::{DateRange, MerchantToken};

/// Default agent query. Placeholders: `{data_type}`, `{merchant_token}`,
/// `{starting_date}`, `{end_date}`.
pub const DEFAULT_AGENT_TEMPLATE: &str = r#"Retrieve {data_type} for the merchant "{merchant_token}" from {starting_date} to {end_date} and write a short analysis of the trends.

Answer with a single JSON object of this shape and nothing else:
{"structured_data": {"<category>": {"<series>": <number>}}, "paragraph": "<analysis>"}

Use month abbreviations (Jan..Dec) as categories when the data is monthly and years or types as series. Only report data you actually retrieved for this merchant. Run the same steps every time so repeated queries return the same numbers."#;

const ENVELOPE_INSTRUCTION: &str = r#"Wrap the object as {"parsed": <object>}. If the data cannot be produced, answer {"parseError": "<reason>"} instead."#;

/// One metric to retrieve for one merchant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRequest {
    pub metric: String,
    pub merchant: MerchantToken,
    pub range: DateRange,
}

impl MetricRequest {
    pub fn new(metric: impl Into<String>, merchant: MerchantToken, range: DateRange) -> Self {
        Self {
            metric: metric.into(),
            merchant,
            range,
        }
    }

    pub fn title(&self) -> String {
        title_for(&self.metric)
    }

    pub fn chart_kind(&self) -> ChartKind {
        chart_kind_for(&self.metric)
    }
}

/// Builds agent queries from a template
#[derive(Debug, Clone)]
pub struct RequestFormatter {
    template: String,
    require_envelope: bool,
}

impl Default for RequestFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_AGENT_TEMPLATE, false)
    }
}

impl RequestFormatter {
    pub fn new(template: impl Into<String>, require_envelope: bool) -> Self {
        Self {
            template: template.into(),
            require_envelope,
        }
    }

    /// Format a query, appending the previous rejection's feedback when present
    pub fn format(&self, request: &MetricRequest, feedback: &str, suggestions: &[String]) -> String {
        let base = self
            .template
            .replace("{data_type}", &request.metric)
            .replace("{merchant_token}", request.merchant.as_str())
            .replace("{starting_date}", &request.range.start)
            .replace("{end_date}", &request.range.end);

        let mut builder = PromptBuilder::new().text(&base);

        if self.require_envelope {
            builder = builder.text(ENVELOPE_INSTRUCTION);
        }

        if !feedback.trim().is_empty() {
            builder = builder
                .section(
                    "Previous Attempt Feedback",
                    &format!(
                        "A reviewer rejected the previous answer:\n{}\n\nAddress this before answering again.",
                        feedback.trim()
                    ),
                )
                .bullets("Suggestions", suggestions);
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> MetricRequest {
        MetricRequest::new(
            "monthly sales year over year",
            MerchantToken::from("M123"),
            DateRange::parse("2023-01-01", "2025-06-30").unwrap(),
        )
    }

    #[test]
    fn test_placeholders_filled() {
        let prompt = RequestFormatter::default().format(&request(), "", &[]);
        assert!(prompt.contains("monthly sales year over year"));
        assert!(prompt.contains("\"M123\""));
        assert!(prompt.contains("from 2023-01-01 to 2025-06-30"));
        assert!(!prompt.contains("{data_type}"));
        assert!(!prompt.contains("{end_date}"));
        assert!(!prompt.contains("Previous Attempt Feedback"));
    }

    #[test]
    fn test_feedback_appended() {
        let suggestions = vec!["Include 2025 values".to_string()];
        let prompt =
            RequestFormatter::default().format(&request(), "Missing 2025 months", &suggestions);
        assert!(prompt.contains("# Previous Attempt Feedback"));
        assert!(prompt.contains("Missing 2025 months"));
        assert!(prompt.contains("- Include 2025 values"));
    }

    #[test]
    fn test_custom_template() {
        let formatter = RequestFormatter::new("{data_type}|{merchant_token}|{end_date}", false);
        assert_eq!(
            formatter.format(&request(), "  ", &[]),
            "monthly sales year over year|M123|2025-06-30"
        );
    }

    #[test]
    fn test_envelope_instruction() {
        let formatter = RequestFormatter::new(DEFAULT_AGENT_TEMPLATE, true);
        let prompt = formatter.format(&request(), "", &[]);
        assert!(prompt.contains("{\"parsed\""));
        assert!(prompt.contains("parseError"));
    }

    #[test]
    fn test_request_metadata() {
        let req = request();
        assert_eq!(req.title(), "Monthly Sales YoY");
        assert_eq!(req.chart_kind(), ChartKind::Bar);
    }
}
