//! Pixel drawing primitives over an RGB buffer

use image::{Rgb, RgbImage};

pub(super) const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub(super) const AXIS: Rgb<u8> = Rgb([64, 64, 64]);
pub(super) const GRID: Rgb<u8> = Rgb([225, 225, 225]);

/// Parse `#rrggbb`; anything else falls back to mid grey
pub(super) fn parse_hex(hex: &str) -> Rgb<u8> {
    let digits = hex.trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        return Rgb([128, 128, 128]);
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).unwrap_or(128);
    Rgb([channel(0), channel(2), channel(4)])
}

pub(super) struct Canvas {
    img: RgbImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            img: RgbImage::from_pixel(width, height, WHITE),
        }
    }

    pub fn width(&self) -> u32 {
        self.img.width()
    }

    pub fn height(&self) -> u32 {
        self.img.height()
    }

    /// Fill the half-open rectangle [x0, x1) × [y0, y1), clipped to the image
    pub fn fill_rect(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgb<u8>) {
        let (w, h) = (self.img.width() as i64, self.img.height() as i64);
        let (x0, x1) = (x0.min(x1).clamp(0, w), x0.max(x1).clamp(0, w));
        let (y0, y1) = (y0.min(y1).clamp(0, h), y0.max(y1).clamp(0, h));
        for y in y0..y1 {
            for x in x0..x1 {
                self.img.put_pixel(x as u32, y as u32, color);
            }
        }
    }

    pub fn hline(&mut self, x0: i64, x1: i64, y: i64, thickness: i64, color: Rgb<u8>) {
        self.fill_rect(x0, y, x1, y + thickness, color);
    }

    pub fn vline(&mut self, x: i64, y0: i64, y1: i64, thickness: i64, color: Rgb<u8>) {
        self.fill_rect(x, y0, x + thickness, y1, color);
    }

    /// Thick line segment (Bresenham with a square brush)
    pub fn line(&mut self, from: (i64, i64), to: (i64, i64), thickness: i64, color: Rgb<u8>) {
        let (mut x, mut y) = from;
        let dx = (to.0 - x).abs();
        let dy = -(to.1 - y).abs();
        let sx = if x < to.0 { 1 } else { -1 };
        let sy = if y < to.1 { 1 } else { -1 };
        let mut err = dx + dy;
        let half = thickness / 2;

        loop {
            self.fill_rect(x - half, y - half, x - half + thickness, y - half + thickness, color);
            if x == to.0 && y == to.1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    pub fn into_image(self) -> RgbImage {
        self.img
    }
}
