//! Structured Chart Data
//!
//! Normalized category → sub-label → value mapping consumed by the chart
//! renderer. Built from whatever JSON the analysis agent produced, with ad hoc
//! unwrapping of the common envelopes (`structured_data`, `months`).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Sub-label used when a category maps directly to a number
pub const SINGLE_SERIES_LABEL: &str = "value";

/// Keys that wrap the actual category mapping
const DATA_ENVELOPE_KEYS: &[&str] = &["structured_data", "months", "data"];

/// Keys that carry the narrative paragraph next to the data
const PARAGRAPH_KEYS: &[&str] = &["paragraph", "summary", "analysis"];

/// Ordered category → (sub-label → value) mapping
///
/// Insertion order follows the agent's JSON, so months stay in calendar order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructuredData(IndexMap<String, IndexMap<String, f64>>);

impl StructuredData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize an arbitrary JSON value into structured data
    ///
    /// Non-object input yields an empty mapping. Entries whose values are not
    /// numeric are dropped.
    pub fn from_value(value: &Value) -> Self {
        let Some(root) = value.as_object() else {
            return Self::default();
        };

        let categories = DATA_ENVELOPE_KEYS
            .iter()
            .find_map(|key| root.get(*key).and_then(Value::as_object))
            .unwrap_or(root);

        let mut data = Self::default();
        for (category, entry) in categories {
            match entry {
                Value::Object(series) => {
                    let mut row = IndexMap::new();
                    for (label, raw) in series {
                        match parse_number(raw) {
                            Some(n) => {
                                row.insert(label.clone(), n);
                            }
                            None => debug!(category, label, "Dropping non-numeric value"),
                        }
                    }
                    if !row.is_empty() {
                        data.0.insert(category.clone(), row);
                    }
                }
                other => {
                    if let Some(n) = parse_number(other) {
                        data.insert(category, SINGLE_SERIES_LABEL, n);
                    } else if PARAGRAPH_KEYS.contains(&category.as_str()) {
                        // narrative sitting next to the categories
                    } else {
                        debug!(category, "Dropping non-numeric category");
                    }
                }
            }
        }
        data
    }

    pub fn insert(&mut self, category: &str, label: &str, value: f64) {
        self.0
            .entry(category.to_string())
            .or_default()
            .insert(label.to_string(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of categories
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn get(&self, category: &str, label: &str) -> Option<f64> {
        self.0.get(category)?.get(label).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &IndexMap<String, f64>)> {
        self.0.iter()
    }

    /// All sub-labels across categories, sorted
    ///
    /// Year labels sort numerically when every label parses as an integer.
    pub fn series_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = Vec::new();
        for row in self.0.values() {
            for label in row.keys() {
                if !labels.contains(label) {
                    labels.push(label.clone());
                }
            }
        }

        if labels.iter().all(|l| l.parse::<i64>().is_ok()) {
            labels.sort_by_key(|l| l.parse::<i64>().unwrap_or_default());
        } else {
            labels.sort();
        }
        labels
    }

    /// Largest single value (0.0 when empty)
    pub fn max_value(&self) -> f64 {
        self.0
            .values()
            .flat_map(|row| row.values().copied())
            .fold(0.0, f64::max)
    }

    /// Largest per-category sum, used for stacked charts
    pub fn max_category_total(&self) -> f64 {
        self.0
            .values()
            .map(|row| row.values().copied().filter(|v| *v > 0.0).sum::<f64>())
            .fold(0.0, f64::max)
    }

    /// Deterministic one-paragraph description of the data
    ///
    /// Used when the agent returned numbers without narrative text.
    pub fn describe(&self, metric: &str) -> String {
        let mut points: Vec<(&str, &str, f64)> = Vec::new();
        for (category, row) in &self.0 {
            for (label, value) in row {
                points.push((category, label, *value));
            }
        }

        let Some(first) = points.first().copied() else {
            return format!("No data was available for {}.", metric);
        };

        let (mut low, mut high) = (first, first);
        for point in &points {
            if point.2 < low.2 {
                low = *point;
            }
            if point.2 > high.2 {
                high = *point;
            }
        }

        let series = self.series_labels();
        format!(
            "{} across {} categories and {} series. Peak of {} in {} ({}); lowest value {} in {} ({}).",
            capitalize(metric),
            self.0.len(),
            series.len(),
            format_number(high.2),
            high.0,
            high.1,
            format_number(low.2),
            low.0,
            low.1
        )
    }
}

/// Parse a JSON number or numeric string ("1,061", "12.5%", " 42 ")
fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .trim_end_matches('%')
                .chars()
                .filter(|c| *c != ',' && *c != '_')
                .collect();
            cleaned.trim().parse::<f64>().ok().filter(|v| v.is_finite())
        }
        _ => None,
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Extract the narrative paragraph sitting next to the data, if any
pub fn paragraph_from_value(value: &Value) -> Option<String> {
    let root = value.as_object()?;
    PARAGRAPH_KEYS
        .iter()
        .filter_map(|key| root.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|p| !p.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_nested_months() {
        let value = json!({
            "Jan": {"2023": 1061, "2024": 2051},
            "Feb": {"2023": 869, "2024": "2,516"}
        });
        let data = StructuredData::from_value(&value);

        assert_eq!(data.len(), 2);
        assert_eq!(data.get("Feb", "2024"), Some(2516.0));
        assert_eq!(data.categories().collect::<Vec<_>>(), vec!["Jan", "Feb"]);
    }

    #[test]
    fn test_unwraps_structured_data_envelope() {
        let value = json!({
            "structured_data": {"Mar": {"2025": 4392}},
            "paragraph": "Sales grew."
        });
        let data = StructuredData::from_value(&value);

        assert_eq!(data.get("Mar", "2025"), Some(4392.0));
        assert_eq!(paragraph_from_value(&value).as_deref(), Some("Sales grew."));
    }

    #[test]
    fn test_flat_series_uses_single_label() {
        let value = json!({"Jan": 52.3, "Feb": "48.1%"});
        let data = StructuredData::from_value(&value);

        assert_eq!(data.get("Jan", SINGLE_SERIES_LABEL), Some(52.3));
        assert_eq!(data.get("Feb", SINGLE_SERIES_LABEL), Some(48.1));
    }

    #[test]
    fn test_drops_non_numeric() {
        let value = json!({"Jan": {"2023": "n/a"}, "note": "ignore me", "Feb": {"2023": 3}});
        let data = StructuredData::from_value(&value);

        assert_eq!(data.len(), 1);
        assert!(data.get("Jan", "2023").is_none());
    }

    #[test]
    fn test_non_object_is_empty() {
        assert!(StructuredData::from_value(&json!([1, 2, 3])).is_empty());
        assert!(StructuredData::from_value(&Value::Null).is_empty());
    }

    #[test]
    fn test_series_labels_sort_numerically() {
        let value = json!({
            "Oct": {"2022": 6, "2023": 45},
            "Jan": {"2023": 15, "2024": 41, "2025": 46}
        });
        let data = StructuredData::from_value(&value);
        assert_eq!(data.series_labels(), vec!["2022", "2023", "2024", "2025"]);
    }

    #[test]
    fn test_max_values() {
        let value = json!({"A": {"x": 3, "y": 4}, "B": {"x": 6, "y": 0}});
        let data = StructuredData::from_value(&value);
        assert_eq!(data.max_value(), 6.0);
        assert_eq!(data.max_category_total(), 7.0);
    }

    #[test]
    fn test_describe() {
        let value = json!({"Jan": {"2024": 10}, "Feb": {"2024": 30}});
        let text = StructuredData::from_value(&value).describe("monthly sales");
        assert!(text.starts_with("Monthly sales across 2 categories"));
        assert!(text.contains("Peak of 30 in Feb (2024)"));
        assert!(text.contains("lowest value 10 in Jan (2024)"));

        assert_eq!(
            StructuredData::new().describe("AOV"),
            "No data was available for AOV."
        );
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let mut data = StructuredData::new();
        data.insert("Jan", "2024", 5.0);
        assert_eq!(serde_json::to_value(&data).unwrap(), json!({"Jan": {"2024": 5.0}}));
    }
}
