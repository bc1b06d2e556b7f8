//! Chart Rendering
//!
//! Turns finalized structured data into a PNG the deck assembler can upload.

mod canvas;
mod raster;

pub use raster::RasterChartRenderer;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::ai::prompt::ChartKind;
use crate::types::{Result, StructuredData};

/// A chart written to disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedChart {
    pub path: PathBuf,
    pub width_px: u32,
    pub height_px: u32,
}

pub trait ChartRenderer: Send + Sync {
    /// Render `data` as `kind` to `path`
    ///
    /// Empty data is an error.
    fn render(&self, data: &StructuredData, kind: ChartKind, path: &Path) -> Result<RenderedChart>;
}

pub type SharedRenderer = Arc<dyn ChartRenderer + Send + Sync>;
