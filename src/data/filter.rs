use ndarray::{Array2, Axis};

use super::model::PixelTable;

/// Label value marking unlabeled background pixels.
pub const BACKGROUND: u32 = 0;

// ---------------------------------------------------------------------------
// LabeledSet – the pixels that carry a class
// ---------------------------------------------------------------------------

/// Rows of a [`PixelTable`] whose label is not [`BACKGROUND`].
#[derive(Debug, Clone)]
pub struct LabeledSet {
    /// (labeled pixels, bands)
    pub features: Array2<f32>,
    pub labels: Vec<u32>,
}

impl LabeledSet {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn max_label(&self) -> u32 {
        self.labels.iter().copied().max().unwrap_or(BACKGROUND)
    }
}

/// Return indices of rows that carry a label.
pub fn labeled_indices(table: &PixelTable) -> Vec<usize> {
    table
        .labels
        .iter()
        .enumerate()
        .filter(|&(_, &label)| label != BACKGROUND)
        .map(|(i, _)| i)
        .collect()
}

/// Drop unlabeled pixels.
pub fn filter_labeled(table: &PixelTable) -> LabeledSet {
    let rows = labeled_indices(table);
    let features = table.features.select(Axis(0), &rows);
    let labels = rows.iter().map(|&i| table.labels[i]).collect();
    LabeledSet { features, labels }
}
