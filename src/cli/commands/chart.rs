//! Chart Command
//!
//! Renders a structured-data JSON file to PNG without running the loop.

use std::path::Path;

use crate::ai::prompt::ChartKind;
use crate::config::ChartConfig;
use crate::render::{ChartRenderer, RasterChartRenderer};
use crate::types::{DeckError, Result, StructuredData};

pub fn run(input: &Path, output: &Path, kind: ChartKind, chart: &ChartConfig) -> Result<()> {
    let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(input)?)?;
    let data = StructuredData::from_value(&value);
    if data.is_empty() {
        return Err(DeckError::Chart(format!(
            "{} contains no numeric category data",
            input.display()
        )));
    }

    let rendered = RasterChartRenderer::from_config(chart).render(&data, kind, output)?;
    println!(
        "✓ {} chart ({}x{}) written to {}",
        kind,
        rendered.width_px,
        rendered.height_px,
        rendered.path.display()
    );
    Ok(())
}
