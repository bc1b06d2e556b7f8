//! Raster chart renderer
//!
//! Grouped bar, stacked bar and line charts drawn straight into an RGB
//! buffer. Layout: plot area on the left, legend swatches on the right,
//! horizontal grid lines, y axis from zero to the maximum plus headroom.
//! Series colours follow the palette in sorted sub-label order.

use image::{ImageFormat, Rgb};
use std::path::Path;
use tracing::debug;

use super::canvas::{AXIS, Canvas, GRID, parse_hex};
use super::{ChartRenderer, RenderedChart};
use crate::ai::prompt::ChartKind;
use crate::config::ChartConfig;
use crate::constants::chart::{GRID_LINES, GROUP_WIDTH, PALETTE, Y_HEADROOM};
use crate::types::{DeckError, Result, StructuredData};

#[derive(Debug, Clone, Copy)]
pub struct RasterChartRenderer {
    width: u32,
    height: u32,
}

impl Default for RasterChartRenderer {
    fn default() -> Self {
        Self::from_config(&ChartConfig::default())
    }
}

impl RasterChartRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(64),
            height: height.max(64),
        }
    }

    pub fn from_config(config: &ChartConfig) -> Self {
        let (width, height) = config.pixel_size();
        Self::new(width, height)
    }
}

/// Plot-area geometry in pixels
#[derive(Debug, Clone, Copy)]
struct Frame {
    left: i64,
    top: i64,
    right: i64,
    bottom: i64,
    y_max: f64,
}

impl Frame {
    fn new(width: u32, height: u32, y_max: f64) -> Self {
        let (w, h) = (width as i64, height as i64);
        Self {
            left: w * 6 / 100,
            top: h * 8 / 100,
            right: w * 86 / 100,
            bottom: h * 88 / 100,
            y_max,
        }
    }

    fn plot_width(&self) -> f64 {
        (self.right - self.left) as f64
    }

    /// Pixel row for a data value; negatives sit on the baseline
    fn y(&self, value: f64) -> i64 {
        let ratio = (value.max(0.0) / self.y_max).min(1.0);
        self.bottom - (ratio * (self.bottom - self.top) as f64).round() as i64
    }

    fn slot(&self, index: usize, count: usize) -> (f64, f64) {
        let width = self.plot_width() / count as f64;
        (self.left as f64 + width * index as f64, width)
    }
}

fn series_color(index: usize) -> Rgb<u8> {
    parse_hex(PALETTE[index % PALETTE.len()])
}

impl ChartRenderer for RasterChartRenderer {
    fn render(&self, data: &StructuredData, kind: ChartKind, path: &Path) -> Result<RenderedChart> {
        if data.is_empty() {
            return Err(DeckError::Chart(format!(
                "No data to render for {}",
                path.display()
            )));
        }

        let series = data.series_labels();
        let peak = match kind {
            ChartKind::StackedBar => data.max_category_total(),
            ChartKind::Bar | ChartKind::Line => data.max_value(),
        };
        let frame = Frame::new(self.width, self.height, peak.max(0.0) + Y_HEADROOM);

        let mut canvas = Canvas::new(self.width, self.height);
        draw_grid(&mut canvas, &frame);
        match kind {
            ChartKind::Bar => draw_grouped_bars(&mut canvas, &frame, data, &series),
            ChartKind::StackedBar => draw_stacked_bars(&mut canvas, &frame, data, &series),
            ChartKind::Line => draw_lines(&mut canvas, &frame, data, &series),
        }
        draw_axes(&mut canvas, &frame);
        draw_legend(&mut canvas, &frame, series.len());

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let (width_px, height_px) = (canvas.width(), canvas.height());
        canvas.into_image().save_with_format(path, ImageFormat::Png)?;

        debug!(
            path = %path.display(),
            kind = %kind,
            categories = data.len(),
            series = series.len(),
            "Rendered chart"
        );

        Ok(RenderedChart {
            path: path.to_path_buf(),
            width_px,
            height_px,
        })
    }
}

fn draw_grid(canvas: &mut Canvas, frame: &Frame) {
    let height = (frame.bottom - frame.top) as f64;
    for i in 1..=GRID_LINES {
        let y = frame.bottom - (height * i as f64 / GRID_LINES as f64).round() as i64;
        canvas.hline(frame.left, frame.right, y, 1, GRID);
    }
}

fn draw_axes(canvas: &mut Canvas, frame: &Frame) {
    canvas.vline(frame.left - 2, frame.top, frame.bottom + 2, 2, AXIS);
    canvas.hline(frame.left - 2, frame.right, frame.bottom, 2, AXIS);
}

fn draw_grouped_bars(canvas: &mut Canvas, frame: &Frame, data: &StructuredData, series: &[String]) {
    let count = data.len();
    let per_group = series.len().max(1) as f64;

    for (ci, (_, row)) in data.iter().enumerate() {
        let (start, width) = frame.slot(ci, count);
        let group = width * GROUP_WIDTH as f64;
        let bar = group / per_group;
        let offset = start + (width - group) / 2.0;

        for (si, label) in series.iter().enumerate() {
            let Some(value) = row.get(label) else {
                continue;
            };
            let x0 = (offset + bar * si as f64).round() as i64;
            let x1 = (offset + bar * (si + 1) as f64).round() as i64 - 1;
            canvas.fill_rect(x0, frame.y(*value), x1.max(x0 + 1), frame.bottom, series_color(si));
        }
    }
}

fn draw_stacked_bars(canvas: &mut Canvas, frame: &Frame, data: &StructuredData, series: &[String]) {
    let count = data.len();

    for (ci, (_, row)) in data.iter().enumerate() {
        let (start, width) = frame.slot(ci, count);
        let group = width * GROUP_WIDTH as f64;
        let x0 = (start + (width - group) / 2.0).round() as i64;
        let x1 = (start + (width + group) / 2.0).round() as i64;

        let mut base = 0.0;
        for (si, label) in series.iter().enumerate() {
            let Some(value) = row.get(label).copied().filter(|v| *v > 0.0) else {
                continue;
            };
            canvas.fill_rect(x0, frame.y(base + value), x1, frame.y(base), series_color(si));
            base += value;
        }
    }
}

fn draw_lines(canvas: &mut Canvas, frame: &Frame, data: &StructuredData, series: &[String]) {
    let count = data.len();

    for (si, label) in series.iter().enumerate() {
        let color = series_color(si);
        let mut previous: Option<(i64, i64)> = None;

        for (ci, (_, row)) in data.iter().enumerate() {
            let Some(value) = row.get(label) else {
                // gap in the series
                previous = None;
                continue;
            };
            let (start, width) = frame.slot(ci, count);
            let point = ((start + width / 2.0).round() as i64, frame.y(*value));

            if let Some(prev) = previous {
                canvas.line(prev, point, 3, color);
            }
            canvas.fill_rect(point.0 - 4, point.1 - 4, point.0 + 5, point.1 + 5, color);
            previous = Some(point);
        }
    }
}

fn draw_legend(canvas: &mut Canvas, frame: &Frame, series_count: usize) {
    let size = ((canvas.height() as i64) / 30).max(8);
    let x = frame.right + (canvas.width() as i64 - frame.right) / 4;
    for si in 0..series_count {
        let y = frame.top + si as i64 * size * 2;
        if y + size > frame.bottom {
            break;
        }
        canvas.fill_rect(x, y, x + size, y + size, series_color(si));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample() -> StructuredData {
        StructuredData::from_value(&json!({
            "Jan": {"2023": 1061, "2024": 2051, "2025": 1190},
            "Feb": {"2023": 869, "2024": 2516, "2025": 3879},
            "Mar": {"2023": 744, "2024": 2017, "2025": 4392}
        }))
    }

    #[test]
    fn test_default_size() {
        let renderer = RasterChartRenderer::default();
        assert_eq!((renderer.width, renderer.height), (1800, 600));
    }

    #[test]
    fn test_render_each_kind() {
        let dir = TempDir::new().unwrap();
        let renderer = RasterChartRenderer::new(600, 200);

        for kind in [ChartKind::Bar, ChartKind::StackedBar, ChartKind::Line] {
            let path = dir.path().join(format!("nested/{}.png", kind));
            let chart = renderer.render(&sample(), kind, &path).unwrap();

            assert_eq!(chart.path, path);
            assert_eq!((chart.width_px, chart.height_px), (600, 200));
            let (w, h) = image::image_dimensions(&path).unwrap();
            assert_eq!((w, h), (600, 200));
        }
    }

    #[test]
    fn test_bars_use_palette_in_sorted_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bars.png");
        let renderer = RasterChartRenderer::new(900, 300);
        renderer.render(&sample(), ChartKind::Bar, &path).unwrap();

        let img = image::open(&path).unwrap().to_rgb8();
        let colors: Vec<Rgb<u8>> = img.pixels().copied().collect();
        for hex in &PALETTE[..3] {
            assert!(colors.contains(&parse_hex(hex)), "missing {}", hex);
        }
        assert!(!colors.contains(&parse_hex(PALETTE[3])));
    }

    #[test]
    fn test_empty_data_is_error() {
        let dir = TempDir::new().unwrap();
        let result = RasterChartRenderer::default().render(
            &StructuredData::default(),
            ChartKind::Bar,
            &dir.path().join("empty.png"),
        );
        assert!(matches!(result, Err(DeckError::Chart(_))));
    }

    #[test]
    fn test_frame_scales_to_headroom() {
        let frame = Frame::new(1000, 500, 110.0);
        assert_eq!(frame.y(0.0), frame.bottom);
        assert_eq!(frame.y(-5.0), frame.bottom);
        assert_eq!(frame.y(110.0), frame.top);
        assert!(frame.y(100.0) > frame.top);
    }
}
