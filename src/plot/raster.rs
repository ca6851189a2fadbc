use image::{Rgb, RgbImage};
use ndarray::ArrayView2;
use rand::Rng;

use super::canvas::{AXIS, Canvas, GLYPH, WHITE, text_width};
use crate::color::nipy_spectral;
use crate::data::model::{GroundTruth, SpectralCube};
use crate::error::PipelineError;

const GAP: u32 = 6;
const COLORBAR_WIDTH: u32 = 18;
const TICK: u32 = 4;
/// Height of the title line above each band tile.
const TITLE_HEIGHT: u32 = GLYPH + 4;

/// Observed (min, max) of finite values; `(0, 1)` when there are none.
fn value_range<'a>(values: impl IntoIterator<Item = &'a f32>) -> (f32, f32) {
    let (min, max) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if min.is_finite() { (min, max) } else { (0.0, 1.0) }
}

fn normalized(v: f32, min: f32, max: f32) -> f32 {
    let range = max - min;
    if range.abs() < f32::EPSILON { 0.0 } else { (v - min) / range }
}

/// Render a 2-D array through nipy_spectral after min-max normalisation.
pub fn colormapped(values: ArrayView2<'_, f32>) -> RgbImage {
    let (min, max) = value_range(values.iter());
    let (rows, cols) = values.dim();
    RgbImage::from_fn(cols as u32, rows as u32, |x, y| {
        nipy_spectral(normalized(values[[y as usize, x as usize]], min, max))
    })
}

/// Pick `count` band indices uniformly from `0..bands` (with replacement).
pub fn choose_bands<R: Rng>(bands: usize, count: usize, rng: &mut R) -> Vec<usize> {
    if bands == 0 {
        return Vec::new();
    }
    (0..count).map(|_| rng.gen_range(0..bands)).collect()
}

/// Band images laid out on a grid with `columns` tiles per row, each titled
/// `Band - <index>`.
pub fn band_grid(
    cube: &SpectralCube,
    bands: &[usize],
    columns: usize,
) -> Result<RgbImage, PipelineError> {
    let columns = columns.max(1);
    let rows = bands.len().div_ceil(columns).max(1);
    let (tile_w, tile_h) = (cube.width() as u32, cube.height() as u32);
    let row_h = TITLE_HEIGHT + tile_h + GAP;
    let width = columns as u32 * (tile_w + GAP) + GAP;
    let height = rows as u32 * row_h + GAP;

    let mut canvas = Canvas::new(width, height, WHITE);
    for (i, &band) in bands.iter().enumerate() {
        let tile = colormapped(cube.band(band)?);
        let x = GAP + (i % columns) as u32 * (tile_w + GAP);
        let y = GAP + (i / columns) as u32 * row_h;
        canvas.text(i64::from(x), i64::from(y), &format!("Band - {band}"), AXIS);
        canvas.blit(&tile, i64::from(x), i64::from(y + TITLE_HEIGHT));
    }
    Ok(canvas.into_image())
}

/// False-colour composite of three bands, byte-scaled over their joint range.
pub fn rgb_composite(cube: &SpectralCube, rgb: [usize; 3]) -> Result<RgbImage, PipelineError> {
    let channels = [cube.band(rgb[0])?, cube.band(rgb[1])?, cube.band(rgb[2])?];
    let (min, max) = value_range(channels.iter().flat_map(|c| c.iter()));
    let byte = |v: f32| (normalized(v, min, max).clamp(0.0, 1.0) * 255.0).round() as u8;

    Ok(RgbImage::from_fn(cube.width() as u32, cube.height() as u32, |x, y| {
        let (r, c) = (y as usize, x as usize);
        Rgb([
            byte(channels[0][[r, c]]),
            byte(channels[1][[r, c]]),
            byte(channels[2][[r, c]]),
        ])
    }))
}

/// Ground-truth classes through nipy_spectral over `[0, max_label]`, with a
/// vertical colour bar on the right (top = highest label) ticked at class
/// labels.
pub fn label_map(gt: &GroundTruth) -> RgbImage {
    let top_label = gt.max_label().max(1);
    let max_label = top_label as f32;
    let (h, w) = (gt.height() as u32, gt.width() as u32);
    let width = w + 3 * GAP + COLORBAR_WIDTH + TICK + 2 + text_width(&top_label.to_string());
    let height = h + 2 * GAP;

    let mut canvas = Canvas::new(width, height, WHITE);
    let map = RgbImage::from_fn(w, h, |x, y| {
        nipy_spectral(gt.labels()[[y as usize, x as usize]] as f32 / max_label)
    });
    canvas.blit(&map, i64::from(GAP), i64::from(GAP));

    let bar_x = i64::from(w + 2 * GAP);
    for row in 0..h {
        let t = if h > 1 { 1.0 - row as f32 / (h - 1) as f32 } else { 1.0 };
        canvas.fill_rect(bar_x, i64::from(GAP + row), COLORBAR_WIDTH, 1, nipy_spectral(t));
    }
    canvas.stroke_rect(bar_x - 1, i64::from(GAP) - 1, COLORBAR_WIDTH + 2, h + 2, AXIS);

    // thin out ticks so labels never overlap
    let labels = top_label + 1;
    let step = (labels * (GLYPH + 2)).div_ceil(h.max(1)).max(1);
    let tick_x = bar_x + i64::from(COLORBAR_WIDTH);
    for label in (0..labels).step_by(step as usize) {
        let t = label as f32 / max_label;
        let y = i64::from(GAP) + ((1.0 - t) * h.saturating_sub(1) as f32).round() as i64;
        canvas.line(tick_x, y, tick_x + i64::from(TICK) - 1, y, AXIS);
        let text_x = tick_x + i64::from(TICK) + 2;
        canvas.text(text_x, y - i64::from(GLYPH) / 2, &label.to_string(), AXIS);
    }
    canvas.into_image()
}
