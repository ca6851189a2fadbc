//! Writes a small synthetic Salinas-like scene (`sample_cube.npy`,
//! `sample_gt.npy`) for trying the pipeline without the real data:
//!
//! ```text
//! cargo run --bin generate_sample -- 40 30 64
//! salinas-cnn --cube sample_cube.npy --ground-truth sample_gt.npy --epochs 5
//! ```

use anyhow::{Context, Result, bail};
use ndarray::{Array2, Array3};
use ndarray_npy::write_npy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const CLASSES: usize = 6;

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Box-Muller transform for a normal sample
fn gauss<R: Rng>(rng: &mut R, mean: f64, std_dev: f64) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-15);
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + std_dev * z
}

/// Absorption-like peaks (centre, width, amplitude) per class, in band units.
fn class_peaks(class: usize, bands: usize) -> Vec<(f64, f64, f64)> {
    let b = bands as f64;
    let shift = class as f64 / CLASSES as f64;
    vec![
        (b * (0.15 + 0.1 * shift), b * 0.05, 900.0 + 150.0 * class as f64),
        (b * (0.45 + 0.2 * shift), b * 0.08, 1400.0 - 120.0 * class as f64),
        (b * (0.8 - 0.1 * shift), b * 0.04, 600.0 + 80.0 * class as f64),
    ]
}

/// Field layout: background border, then vertical strips of classes
/// `1..=CLASSES`.
fn field_label(row: usize, col: usize, height: usize, width: usize) -> u8 {
    let border = (height.min(width) / 10).max(1);
    if row < border || col < border || row + border >= height || col + border >= width {
        return 0;
    }
    let inner = width - 2 * border;
    (1 + (col - border) * CLASSES / inner.max(1)) as u8
}

fn parse_arg(args: &[String], index: usize, default: usize) -> Result<usize> {
    match args.get(index) {
        Some(v) => v.parse().with_context(|| format!("invalid size argument {v:?}")),
        None => Ok(default),
    }
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let height = parse_arg(&args, 1, 40)?;
    let width = parse_arg(&args, 2, 30)?;
    let bands = parse_arg(&args, 3, 64)?;
    if height < 3 || width < CLASSES + 2 || bands < 22 {
        bail!("scene too small: need height >= 3, width >= {}, bands >= 22", CLASSES + 2);
    }

    let mut rng = StdRng::seed_from_u64(42);
    let labels = Array2::from_shape_fn((height, width), |(r, c)| field_label(r, c, height, width));
    let peaks: Vec<Vec<(f64, f64, f64)>> = (0..=CLASSES).map(|c| class_peaks(c, bands)).collect();

    let mut cube = Array3::<u16>::zeros((height, width, bands));
    for ((r, c, b), value) in cube.indexed_iter_mut() {
        let class = labels[[r, c]] as usize;
        let signal: f64 = peaks[class]
            .iter()
            .map(|&(mu, sigma, amp)| gaussian(b as f64, mu, sigma, amp))
            .sum();
        *value = (1000.0 + signal + gauss(&mut rng, 0.0, 25.0)).clamp(0.0, 65535.0) as u16;
    }

    let cube_path = "sample_cube.npy";
    let gt_path = "sample_gt.npy";
    write_npy(cube_path, &cube).with_context(|| format!("writing {cube_path}"))?;
    write_npy(gt_path, &labels).with_context(|| format!("writing {gt_path}"))?;

    let labeled = labels.iter().filter(|&&l| l != 0).count();
    println!(
        "Wrote {height}x{width}x{bands} cube to {cube_path} and ground truth to {gt_path} \
         ({labeled} labeled pixels, {CLASSES} classes)"
    );
    Ok(())
}
