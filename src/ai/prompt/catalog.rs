//! Known merchant metrics and the chart each one is drawn with

use serde::{Deserialize, Serialize};

/// Chart shapes the renderer can draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    /// Grouped bars, one bar per sub-label within each category
    #[default]
    Bar,
    /// Sub-labels stacked on one bar per category
    StackedBar,
    /// One line per sub-label across categories
    Line,
}

impl std::fmt::Display for ChartKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChartKind::Bar => write!(f, "bar"),
            ChartKind::StackedBar => write!(f, "stacked_bar"),
            ChartKind::Line => write!(f, "line"),
        }
    }
}

impl std::str::FromStr for ChartKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "bar" => Ok(ChartKind::Bar),
            "stacked_bar" | "stacked" => Ok(ChartKind::StackedBar),
            "line" => Ok(ChartKind::Line),
            // distributions are drawn as bars
            "pie" => Ok(ChartKind::Bar),
            _ => Err(format!(
                "Unknown chart kind: {}. Valid values: bar, stacked_bar, line",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MetricSpec {
    /// Metric phrase sent to the agent
    pub name: &'static str,
    /// Slide section title
    pub title: &'static str,
    pub chart: ChartKind,
}

pub const KNOWN_METRICS: &[MetricSpec] = &[
    MetricSpec {
        name: "monthly sales year over year",
        title: "Monthly Sales YoY",
        chart: ChartKind::Bar,
    },
    MetricSpec {
        name: "monthly sales by product type over time",
        title: "Sales by Product Type",
        chart: ChartKind::StackedBar,
    },
    MetricSpec {
        name: "monthly orders by user type",
        title: "Orders by User Type",
        chart: ChartKind::StackedBar,
    },
    MetricSpec {
        name: "AOV",
        title: "Average Order Value",
        chart: ChartKind::Line,
    },
    MetricSpec {
        name: "scalapay users demographic in percentages",
        title: "User Demographics",
        chart: ChartKind::Bar,
    },
    MetricSpec {
        name: "orders by product type (i.e. pay in 3, pay in 4)",
        title: "Orders by Product Type",
        chart: ChartKind::StackedBar,
    },
    MetricSpec {
        name: "AOV by product type (i.e. pay in 3, pay in 4)",
        title: "AOV by Product Type",
        chart: ChartKind::Line,
    },
];

/// Case-insensitive catalog lookup
pub fn lookup_metric(metric: &str) -> Option<&'static MetricSpec> {
    let needle = metric.trim();
    KNOWN_METRICS
        .iter()
        .find(|spec| spec.name.eq_ignore_ascii_case(needle))
}

/// Chart kind for a metric, by catalog entry or by keyword rules
pub fn chart_kind_for(metric: &str) -> ChartKind {
    if let Some(spec) = lookup_metric(metric) {
        return spec.chart;
    }

    let lower = metric.to_lowercase();
    if lower.contains("aov") || lower.contains("average order value") {
        ChartKind::Line
    } else if ["distribution", "demographic", "percentage", "share"]
        .iter()
        .any(|k| lower.contains(k))
    {
        ChartKind::Bar
    } else if lower.contains("by product type") || lower.contains("by user type") {
        ChartKind::StackedBar
    } else if lower.contains("over time") && !lower.contains("sales") {
        ChartKind::Line
    } else {
        ChartKind::Bar
    }
}

/// Section title for a metric
pub fn title_for(metric: &str) -> String {
    match lookup_metric(metric) {
        Some(spec) => spec.title.to_string(),
        None => {
            let mut chars = metric.trim().chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_mapping() {
        assert_eq!(chart_kind_for("monthly sales year over year"), ChartKind::Bar);
        assert_eq!(chart_kind_for("Monthly orders by user type"), ChartKind::StackedBar);
        assert_eq!(chart_kind_for("aov"), ChartKind::Line);
    }

    #[test]
    fn test_rule_mapping() {
        assert_eq!(chart_kind_for("monthly sales over time"), ChartKind::Bar);
        assert_eq!(chart_kind_for("refunds by product type"), ChartKind::StackedBar);
        assert_eq!(chart_kind_for("Average Order Value over time"), ChartKind::Line);
        assert_eq!(chart_kind_for("age distribution"), ChartKind::Bar);
        assert_eq!(chart_kind_for("returning customers over time"), ChartKind::Line);
    }

    #[test]
    fn test_titles() {
        assert_eq!(title_for("AOV"), "Average Order Value");
        assert_eq!(title_for("refund rate"), "Refund rate");
    }

    #[test]
    fn test_chart_kind_parse() {
        assert_eq!("stacked-bar".parse::<ChartKind>().unwrap(), ChartKind::StackedBar);
        assert_eq!("pie".parse::<ChartKind>().unwrap(), ChartKind::Bar);
        assert!("radar".parse::<ChartKind>().is_err());
        assert_eq!(ChartKind::StackedBar.to_string(), "stacked_bar");
    }
}
