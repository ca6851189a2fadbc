use image::{Rgb, RgbImage};
use ndarray::Array2;

use super::canvas::{AXIS, Canvas, GLYPH, GRID, WHITE, text_width};
use crate::color::{generate_palette, heat};

const CHART_WIDTH: u32 = 900;
const CHART_HEIGHT: u32 = 520;
const MARGIN: u32 = 48;
const LEGEND_SWATCH: u32 = 14;
const PAD: u32 = 8;
const X_TICKS: usize = 10;

/// One named line of a chart.
#[derive(Debug, Clone)]
pub struct Series {
    pub name: String,
    pub values: Vec<f64>,
}

impl Series {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Series {
            name: name.into(),
            values,
        }
    }
}

/// Colour assigned to each series, in order.
pub fn series_colors(series: &[Series]) -> Vec<Rgb<u8>> {
    generate_palette(series.len())
}

/// Lines with markers over a shared x axis (epoch) and shared y axis.
///
/// The legend is stacked in the top-right corner in series order; the y axis
/// carries quarter ticks and the x axis epoch numbers starting at 1.
pub fn line_chart(series: &[Series]) -> RgbImage {
    let mut canvas = Canvas::new(CHART_WIDTH, CHART_HEIGHT, WHITE);
    let plot_w = CHART_WIDTH - 2 * MARGIN;
    let plot_h = CHART_HEIGHT - 2 * MARGIN;
    let (left, top) = (i64::from(MARGIN), i64::from(MARGIN));
    let (right, bottom) = (left + i64::from(plot_w), top + i64::from(plot_h));

    let points = series.iter().map(|s| s.values.len()).max().unwrap_or(0);
    let finite = series.iter().flat_map(|s| &s.values).filter(|v| v.is_finite());
    let (mut lo, mut hi) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
        (lo.min(v), hi.max(v))
    });
    if !lo.is_finite() {
        (lo, hi) = (0.0, 1.0);
    } else if (hi - lo).abs() < f64::EPSILON {
        hi = lo + 1.0;
    }

    // horizontal grid and y ticks at quarters
    for q in 0..=4 {
        let y = bottom - i64::from(plot_h) * q / 4;
        if q > 0 && q < 4 {
            canvas.line(left, y, right, y, GRID);
        }
        let label = format!("{:.2}", lo + (hi - lo) * q as f64 / 4.0);
        let x = left - 4 - i64::from(text_width(&label));
        canvas.text(x, y - i64::from(GLYPH) / 2, &label, AXIS);
    }
    canvas.line(left, bottom, right, bottom, AXIS);
    canvas.line(left, top, left, bottom, AXIS);

    let to_x = |i: usize| {
        if points > 1 {
            left + (i as f64 / (points - 1) as f64 * f64::from(plot_w)).round() as i64
        } else {
            left + i64::from(plot_w) / 2
        }
    };
    let to_y = |v: f64| bottom - ((v - lo) / (hi - lo) * f64::from(plot_h)).round() as i64;

    let tick_y = bottom + 4 + i64::from(GLYPH) / 2;
    for i in (0..points).step_by(points.div_ceil(X_TICKS).max(1)) {
        let x = to_x(i);
        canvas.line(x, bottom, x, bottom + 3, AXIS);
        canvas.text_centered(x, tick_y, &(i + 1).to_string(), AXIS);
    }
    canvas.text_centered((left + right) / 2, tick_y + i64::from(2 * GLYPH), "Epoch", AXIS);

    let colors = series_colors(series);
    for (s, &color) in series.iter().zip(&colors) {
        let mut previous: Option<(i64, i64)> = None;
        for (i, &v) in s.values.iter().enumerate() {
            if !v.is_finite() {
                previous = None;
                continue;
            }
            let (x, y) = (to_x(i), to_y(v));
            if let Some((px, py)) = previous {
                canvas.line(px, py, x, y, color);
            }
            canvas.marker(x, y, 2, color);
            previous = Some((x, y));
        }
    }

    let name_w = series.iter().map(|s| text_width(&s.name)).max().unwrap_or(0);
    let swatch_x = right - 4 - i64::from(name_w) - 6 - i64::from(LEGEND_SWATCH);
    for (i, (s, &color)) in series.iter().zip(&colors).enumerate() {
        let y = top + 4 + i as i64 * i64::from(LEGEND_SWATCH + 4);
        canvas.fill_rect(swatch_x, y, LEGEND_SWATCH, LEGEND_SWATCH, color);
        canvas.stroke_rect(swatch_x, y, LEGEND_SWATCH, LEGEND_SWATCH, AXIS);
        let text_y = y + i64::from(LEGEND_SWATCH - GLYPH) / 2;
        canvas.text(swatch_x + i64::from(LEGEND_SWATCH) + 6, text_y, &s.name, AXIS);
    }

    canvas.into_image()
}

/// Top-left corner of the heatmap grid: row names on the left, a title line
/// and the column labels above.
fn grid_origin(row_names: &[String]) -> (i64, i64) {
    let label_w = row_names.iter().map(|n| text_width(n)).max().unwrap_or(0);
    let left = PAD + label_w + PAD;
    let top = PAD + 2 * (GLYPH + 4);
    (i64::from(left), i64::from(top))
}

/// Confusion-matrix heatmap, one `cell`-sized square per entry, shaded by
/// count relative to the largest entry and annotated with the count.
///
/// Rows are true classes named by `row_names`, columns predicted classes
/// labelled by `column_names`.
pub fn heatmap(
    matrix: &Array2<u64>,
    row_names: &[String],
    column_names: &[String],
    cell: u32,
) -> RgbImage {
    let (rows, cols) = matrix.dim();
    let cell = cell.max(1);
    let (grid_w, grid_h) = (cols as u32 * cell, rows as u32 * cell);
    let (left, top) = grid_origin(row_names);
    let width = left as u32 + grid_w + PAD;
    let height = top as u32 + grid_h + PAD;
    let half = i64::from(cell / 2);

    let mut canvas = Canvas::new(width, height, WHITE);
    let max = matrix.iter().copied().max().unwrap_or(0).max(1) as f32;
    for ((r, c), &count) in matrix.indexed_iter() {
        let x = left + (c as u32 * cell) as i64;
        let y = top + (r as u32 * cell) as i64;
        let t = count as f32 / max;
        canvas.fill_rect(x, y, cell, cell, heat(t));
        canvas.stroke_rect(x, y, cell, cell, WHITE);
        let ink = if t > 0.5 { WHITE } else { AXIS };
        canvas.text_centered(x + half, y + half, &count.to_string(), ink);
    }
    canvas.stroke_rect(left - 1, top - 1, grid_w + 2, grid_h + 2, AXIS);

    let pad = i64::from(PAD);
    canvas.text(pad, pad, "True", AXIS);
    let title_y = pad + i64::from(GLYPH) / 2;
    canvas.text_centered(left + i64::from(grid_w) / 2, title_y, "Predicted", AXIS);
    let column_y = title_y + i64::from(GLYPH + 4);
    for (c, name) in column_names.iter().take(cols).enumerate() {
        let x = left + (c as u32 * cell) as i64 + half;
        canvas.text_centered(x, column_y, name, AXIS);
    }
    for (r, name) in row_names.iter().take(rows).enumerate() {
        let y = top + (r as u32 * cell) as i64 + half - i64::from(GLYPH) / 2;
        canvas.text(pad, y, name, AXIS);
    }
    canvas.into_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn strings(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn line_chart_draws_each_series_colour() {
        let series = vec![
            Series::new("loss", vec![2.0, 1.0, 0.5]),
            Series::new("accuracy", vec![0.2, 0.6, 0.9]),
        ];
        let img = line_chart(&series);
        assert_eq!((img.width(), img.height()), (CHART_WIDTH, CHART_HEIGHT));
        for color in series_colors(&series) {
            assert!(img.pixels().any(|p| *p == color));
        }
    }

    #[test]
    fn line_chart_legend_names_series() {
        let values = vec![2.0, 1.0, 0.5];
        let a = line_chart(&[Series::new("Train loss", values.clone())]);
        let b = line_chart(&[Series::new("Test loss", values)]);
        let differing: Vec<(u32, u32)> = a
            .enumerate_pixels()
            .filter(|&(x, y, p)| b.get_pixel(x, y) != p)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!differing.is_empty());
        // only the legend corner changes
        assert!(
            differing
                .iter()
                .all(|&(x, y)| x > CHART_WIDTH / 2 && y < MARGIN + LEGEND_SWATCH + 8)
        );
    }

    #[test]
    fn line_chart_tolerates_empty_and_nan_input() {
        let img = line_chart(&[]);
        assert_eq!(img.width(), CHART_WIDTH);
        let img = line_chart(&[Series::new("x", vec![f64::NAN, 1.0])]);
        assert_eq!(img.height(), CHART_HEIGHT);
    }

    #[test]
    fn heatmap_shades_largest_cell_darkest() {
        let m = array![[8u64, 0], [2, 5]];
        let rows = strings(&["1.a", "2.b"]);
        let img = heatmap(&m, &rows, &strings(&["1", "2"]), 24);
        let (x0, y0) = grid_origin(&rows);
        let (x0, y0) = (x0 as u32, y0 as u32);
        assert_eq!(*img.get_pixel(x0 + 2, y0 + 2), heat(1.0));
        assert_eq!(*img.get_pixel(x0 + 24 + 2, y0 + 2), heat(0.0));
    }

    #[test]
    fn every_cell_is_annotated_with_its_count() {
        let m = array![[8u64, 0], [2, 5]];
        let rows = strings(&["1.a", "2.b"]);
        let cell = 24;
        let img = heatmap(&m, &rows, &strings(&["1", "2"]), cell);
        let (x0, y0) = grid_origin(&rows);
        for ((r, c), &count) in m.indexed_iter() {
            let fill = heat(count as f32 / 8.0);
            let (x, y) = (x0 as u32 + c as u32 * cell, y0 as u32 + r as u32 * cell);
            let marked = (1..cell - 1)
                .flat_map(|dy| (1..cell - 1).map(move |dx| (x + dx, y + dy)))
                .any(|(px, py)| *img.get_pixel(px, py) != fill);
            assert!(marked, "cell ({r}, {c}) has no count");
        }
    }

    #[test]
    fn heatmap_makes_room_for_row_names() {
        let m = array![[1u64]];
        let short = heatmap(&m, &strings(&["1"]), &strings(&["1"]), 20);
        let long = heatmap(&m, &strings(&["1.Brocoli_green_weeds_1"]), &strings(&["1"]), 20);
        assert_eq!(long.width() - short.width(), text_width("1.Brocoli_green_weeds_1") - GLYPH);
        assert!(short.pixels().any(|p| *p == AXIS));
    }
}
