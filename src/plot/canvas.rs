use std::path::Path;

use anyhow::{Context, Result};
use font8x8::{BASIC_FONTS, UnicodeFonts};
use image::{Rgb, RgbImage};

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const AXIS: Rgb<u8> = Rgb([60, 60, 60]);
pub const GRID: Rgb<u8> = Rgb([225, 225, 225]);

/// Side of one glyph cell at scale 1.
pub const GLYPH: u32 = 8;

/// Pixel width of `text` at scale 1.
pub fn text_width(text: &str) -> u32 {
    text.chars().count() as u32 * GLYPH
}

/// A bounds-checked drawing surface over an `RgbImage`.
pub struct Canvas {
    image: RgbImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32, background: Rgb<u8>) -> Self {
        Canvas {
            image: RgbImage::from_pixel(width, height, background),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Set one pixel; coordinates outside the canvas are ignored.
    pub fn put(&mut self, x: i64, y: i64, color: Rgb<u8>) {
        if x >= 0 && y >= 0 && x < i64::from(self.width()) && y < i64::from(self.height()) {
            self.image.put_pixel(x as u32, y as u32, color);
        }
    }

    pub fn fill_rect(&mut self, x: i64, y: i64, w: u32, h: u32, color: Rgb<u8>) {
        for dy in 0..i64::from(h) {
            for dx in 0..i64::from(w) {
                self.put(x + dx, y + dy, color);
            }
        }
    }

    pub fn stroke_rect(&mut self, x: i64, y: i64, w: u32, h: u32, color: Rgb<u8>) {
        let (w, h) = (i64::from(w), i64::from(h));
        self.line(x, y, x + w - 1, y, color);
        self.line(x, y + h - 1, x + w - 1, y + h - 1, color);
        self.line(x, y, x, y + h - 1, color);
        self.line(x + w - 1, y, x + w - 1, y + h - 1, color);
    }

    /// Bresenham line, endpoints inclusive.
    pub fn line(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgb<u8>) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let (mut x, mut y) = (x0, y0);
        let mut err = dx + dy;
        loop {
            self.put(x, y, color);
            if x == x1 && y == y1 {
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

    /// Square marker centred on (x, y).
    pub fn marker(&mut self, x: i64, y: i64, radius: u32, color: Rgb<u8>) {
        let r = i64::from(radius);
        let side = 2 * radius + 1;
        self.fill_rect(x - r, y - r, side, side, color);
    }

    /// Draw `text` with its top-left corner at (x, y). Characters outside the
    /// basic Latin set render as `?`.
    pub fn text(&mut self, x: i64, y: i64, text: &str, color: Rgb<u8>) {
        let step = i64::from(GLYPH);
        for (i, ch) in text.chars().enumerate() {
            let Some(glyph) = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?')) else {
                continue;
            };
            let left = x + i as i64 * step;
            for (row, &bits) in glyph.iter().enumerate() {
                for col in 0..GLYPH {
                    if (bits >> col) & 1 == 1 {
                        self.put(left + i64::from(col), y + row as i64, color);
                    }
                }
            }
        }
    }

    /// Draw `text` centred on (cx, cy).
    pub fn text_centered(&mut self, cx: i64, cy: i64, text: &str, color: Rgb<u8>) {
        let x = cx - i64::from(text_width(text)) / 2;
        let y = cy - i64::from(GLYPH) / 2;
        self.text(x, y, text, color);
    }

    /// Copy `src` with its top-left corner at (x, y).
    pub fn blit(&mut self, src: &RgbImage, x: i64, y: i64) {
        for (sx, sy, pixel) in src.enumerate_pixels() {
            self.put(x + i64::from(sx), y + i64::from(sy), *pixel);
        }
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }
}

/// Write a figure to disk as PNG.
pub fn save_png(image: &RgbImage, path: &Path) -> Result<()> {
    image
        .save(path)
        .with_context(|| format!("writing figure {}", path.display()))?;
    log::info!("Saved figure {}", path.display());
    Ok(())
}
