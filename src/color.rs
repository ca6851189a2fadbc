use image::Rgb;
use palette::{Hsl, IntoColor, Lab, Mix, Srgb};

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Rgb<u8>> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            to_rgb8(rgb)
        })
        .collect()
}

fn to_rgb8(rgb: Srgb) -> Rgb<u8> {
    Rgb([
        (rgb.red.clamp(0.0, 1.0) * 255.0) as u8,
        (rgb.green.clamp(0.0, 1.0) * 255.0) as u8,
        (rgb.blue.clamp(0.0, 1.0) * 255.0) as u8,
    ])
}

// ---------------------------------------------------------------------------
// nipy_spectral – the colour map used for band and label images
// ---------------------------------------------------------------------------

/// 21 evenly spaced stops (t = 0.00, 0.05, … 1.00), RGB in 0..=1.
const NIPY_SPECTRAL: [[f32; 3]; 21] = [
    [0.0, 0.0, 0.0],
    [0.4667, 0.0, 0.5333],
    [0.5333, 0.0, 0.6],
    [0.0, 0.0, 0.6667],
    [0.0, 0.0, 0.8667],
    [0.0, 0.4667, 0.8667],
    [0.0, 0.6, 0.8667],
    [0.0, 0.6667, 0.6667],
    [0.0, 0.6667, 0.5333],
    [0.0, 0.6, 0.0],
    [0.0, 0.7333, 0.0],
    [0.0, 0.8667, 0.0],
    [0.0, 1.0, 0.0],
    [0.7333, 1.0, 0.0],
    [0.9333, 0.9333, 0.0],
    [1.0, 0.8, 0.0],
    [1.0, 0.6, 0.0],
    [1.0, 0.0, 0.0],
    [0.8667, 0.0, 0.0],
    [0.8, 0.0, 0.0],
    [0.8, 0.8, 0.8],
];

/// Evaluate nipy_spectral at `t` ∈ [0, 1] (clamped).
pub fn nipy_spectral(t: f32) -> Rgb<u8> {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let pos = t * (NIPY_SPECTRAL.len() - 1) as f32;
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(NIPY_SPECTRAL.len() - 1);
    let frac = pos - lo as f32;

    let [r0, g0, b0] = NIPY_SPECTRAL[lo];
    let [r1, g1, b1] = NIPY_SPECTRAL[hi];
    to_rgb8(Srgb::new(
        r0 + (r1 - r0) * frac,
        g0 + (g1 - g0) * frac,
        b0 + (b1 - b0) * frac,
    ))
}

// ---------------------------------------------------------------------------
// Sequential heat scale
// ---------------------------------------------------------------------------

/// Light-to-dark sequential colour for `t` ∈ [0, 1], interpolated in Lab so
/// equal steps in `t` look like equal steps in intensity.
pub fn heat(t: f32) -> Rgb<u8> {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let light: Lab = Srgb::new(0.98, 0.92, 0.84).into_color();
    let dark: Lab = Srgb::new(0.24, 0.05, 0.25).into_color();
    let mixed = light.mix(dark, t);
    to_rgb8(mixed.into_color())
}
