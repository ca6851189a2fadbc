use std::collections::BTreeSet;
use std::fmt::Write as _;

use ndarray::{Array2, Array3, ArrayView2, Axis};

use crate::error::PipelineError;

// ---------------------------------------------------------------------------
// SpectralCube – the hyperspectral image
// ---------------------------------------------------------------------------

/// Reflectance values laid out as (height, width, bands).
#[derive(Debug, Clone)]
pub struct SpectralCube {
    data: Array3<f32>,
}

impl SpectralCube {
    pub fn new(data: Array3<f32>) -> Self {
        SpectralCube { data }
    }

    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    pub fn bands(&self) -> usize {
        self.data.dim().2
    }

    /// A single band as a (height, width) image.
    pub fn band(&self, band: usize) -> Result<ArrayView2<'_, f32>, PipelineError> {
        if band >= self.bands() {
            return Err(PipelineError::BandOutOfRange {
                band,
                bands: self.bands(),
            });
        }
        Ok(self.data.index_axis(Axis(2), band))
    }

    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }
}

// ---------------------------------------------------------------------------
// GroundTruth – per-pixel class labels
// ---------------------------------------------------------------------------

/// Label raster; `0` marks unlabeled background.
#[derive(Debug, Clone)]
pub struct GroundTruth {
    labels: Array2<u32>,
}

impl GroundTruth {
    pub fn new(labels: Array2<u32>) -> Self {
        GroundTruth { labels }
    }

    pub fn height(&self) -> usize {
        self.labels.dim().0
    }

    pub fn width(&self) -> usize {
        self.labels.dim().1
    }

    pub fn labels(&self) -> &Array2<u32> {
        &self.labels
    }

    pub fn max_label(&self) -> u32 {
        self.labels.iter().copied().max().unwrap_or(0)
    }

    /// Sorted set of the nonzero labels present in the raster.
    pub fn classes(&self) -> BTreeSet<u32> {
        self.labels.iter().copied().filter(|&l| l != 0).collect()
    }
}

// ---------------------------------------------------------------------------
// PixelTable – one row per pixel
// ---------------------------------------------------------------------------

/// The flattened scene: row `r * width + c` holds the spectrum of pixel
/// `(r, c)` and its class label.
#[derive(Debug, Clone)]
pub struct PixelTable {
    /// (pixels, bands)
    pub features: Array2<f32>,
    /// One label per row.
    pub labels: Vec<u32>,
}

impl PixelTable {
    /// Flatten a cube and its ground truth into a pixel table.
    pub fn from_scene(cube: &SpectralCube, gt: &GroundTruth) -> Result<Self, PipelineError> {
        if cube.height() != gt.height() || cube.width() != gt.width() {
            return Err(PipelineError::ShapeMismatch {
                what: "ground truth must match the cube's height and width",
                expected: vec![cube.height(), cube.width()],
                actual: vec![gt.height(), gt.width()],
            });
        }

        let rows = cube.height() * cube.width();
        let bands = cube.bands();
        // Logical iteration order of an Array3 is row-major regardless of memory layout.
        let features = Array2::from_shape_vec((rows, bands), cube.data().iter().copied().collect())
            .map_err(|_| PipelineError::ShapeMismatch {
                what: "cube could not be reshaped into a pixel table",
                expected: vec![rows, bands],
                actual: cube.data().shape().to_vec(),
            })?;
        let labels = gt.labels().iter().copied().collect();
        Self::from_parts(features, labels)
    }

    pub fn from_parts(features: Array2<f32>, labels: Vec<u32>) -> Result<Self, PipelineError> {
        if features.nrows() != labels.len() {
            return Err(PipelineError::ShapeMismatch {
                what: "features and labels must have the same row count",
                expected: vec![features.nrows()],
                actual: vec![labels.len()],
            });
        }
        Ok(PixelTable { features, labels })
    }

    /// Number of rows (pixels).
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn bands(&self) -> usize {
        self.features.ncols()
    }

    /// `band1 .. bandN` followed by `class`.
    pub fn column_names(&self) -> Vec<String> {
        (1..=self.bands())
            .map(|i| format!("band{i}"))
            .chain(std::iter::once("class".to_string()))
            .collect()
    }

    /// Text preview of the first `n` rows, eliding middle band columns.
    pub fn head(&self, n: usize) -> String {
        const EDGE: usize = 3;
        let names = self.column_names();
        let bands = self.bands();
        let shown: Vec<usize> = if bands <= 2 * EDGE {
            (0..bands).collect()
        } else {
            (0..EDGE).chain(bands - EDGE..bands).collect()
        };

        let mut out = String::new();
        let _ = write!(out, "{:>6}", "");
        for (pos, &b) in shown.iter().enumerate() {
            if bands > 2 * EDGE && pos == EDGE {
                let _ = write!(out, " {:>8}", "...");
            }
            let _ = write!(out, " {:>8}", names[b]);
        }
        let _ = writeln!(out, " {:>6}", "class");

        for row in 0..n.min(self.len()) {
            let _ = write!(out, "{row:>6}");
            for (pos, &b) in shown.iter().enumerate() {
                if bands > 2 * EDGE && pos == EDGE {
                    let _ = write!(out, " {:>8}", "...");
                }
                let _ = write!(out, " {:>8.1}", self.features[[row, b]]);
            }
            let _ = writeln!(out, " {:>6}", self.labels[row]);
        }
        let _ = write!(out, "[{} rows x {} columns]", self.len(), names.len());
        out
    }
}
