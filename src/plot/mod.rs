/// Figure rendering: every figure is an in-memory `RgbImage` that the
/// pipeline writes out as PNG.
///
/// * `raster` – band images, false-colour composite, label map
/// * `chart`  – training curves and the confusion-matrix heatmap
/// * `canvas` – the small drawing surface both are built on

pub mod canvas;
pub mod chart;
pub mod raster;

pub use canvas::save_png;
