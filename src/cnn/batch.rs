use burn::prelude::*;
use ndarray::Array2;

/// Selected rows of a `(rows, bands)` matrix as a `[rows, 1, bands]` tensor.
pub fn features_tensor<B: Backend>(
    features: &Array2<f32>,
    rows: &[usize],
    device: &B::Device,
) -> Tensor<B, 3> {
    let bands = features.ncols();
    let mut values = Vec::with_capacity(rows.len() * bands);
    for &row in rows {
        values.extend(features.row(row).iter().copied());
    }
    Tensor::from_data(TensorData::new(values, [rows.len(), 1, bands]), device)
}

/// Selected labels as class-index targets.
pub fn targets_tensor<B: Backend>(
    labels: &[u32],
    rows: &[usize],
    device: &B::Device,
) -> Tensor<B, 1, Int> {
    let values: Vec<i64> = rows.iter().map(|&row| i64::from(labels[row])).collect();
    Tensor::from_data(TensorData::new(values, [rows.len()]), device)
}

/// Arg-max class of each logit row.
pub fn predicted_classes<B: Backend>(logits: Tensor<B, 2>) -> Vec<u32> {
    logits
        .argmax(1)
        .into_data()
        .iter::<i64>()
        .map(|class| class as u32)
        .collect()
}
