use burn::nn::loss::CrossEntropyLossConfig;
use burn::prelude::*;
use burn::tensor::ElementConversion;

use super::batch::{features_tensor, predicted_classes, targets_tensor};
use super::model::SpectralCnn;
use crate::data::preprocess::Partition;
use crate::metrics;

/// Loss, accuracy and per-row predictions of a model over one partition.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Mean cross-entropy per sample.
    pub loss: f64,
    pub accuracy: f64,
    pub predictions: Vec<u32>,
}

/// Run `model` over `data` in batches of `batch_size`.
///
/// Dropout is inactive as long as `B` is not an autodiff backend, so pass
/// `model.valid()` when evaluating during training.
pub fn evaluate<B: Backend>(
    model: &SpectralCnn<B>,
    data: &Partition,
    batch_size: usize,
    device: &B::Device,
) -> Evaluation {
    let loss_fn = CrossEntropyLossConfig::new().init::<B>(device);
    let rows: Vec<usize> = (0..data.len()).collect();

    let mut loss_sum = 0.0;
    let mut predictions = Vec::with_capacity(rows.len());
    for chunk in rows.chunks(batch_size.max(1)) {
        let logits = model.forward(features_tensor::<B>(&data.features, chunk, device));
        let targets = targets_tensor::<B>(&data.labels, chunk, device);
        let loss = loss_fn.forward(logits.clone(), targets);
        loss_sum += loss.into_scalar().elem::<f64>() * chunk.len() as f64;
        predictions.extend(predicted_classes(logits));
    }

    let n = rows.len().max(1) as f64;
    Evaluation {
        loss: loss_sum / n,
        accuracy: metrics::accuracy(&data.labels, &predictions),
        predictions,
    }
}

/// Predicted class for every row of `data`.
pub fn predict<B: Backend>(
    model: &SpectralCnn<B>,
    data: &Partition,
    batch_size: usize,
    device: &B::Device,
) -> Vec<u32> {
    let rows: Vec<usize> = (0..data.len()).collect();
    rows.chunks(batch_size.max(1))
        .flat_map(|chunk| {
            let probs = model.predict_proba(features_tensor::<B>(&data.features, chunk, device));
            predicted_classes(probs)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnn::InferenceBackend;
    use crate::cnn::model::SpectralCnnConfig;
    use ndarray::Array2;

    fn partition(rows: usize, bands: usize) -> Partition {
        Partition {
            features: Array2::from_shape_fn((rows, bands), |(r, b)| ((r + b) % 7) as f32 / 7.0),
            targets: Array2::zeros((rows, 3)),
            labels: (0..rows).map(|r| (r % 2) as u32 + 1).collect(),
        }
    }

    #[test]
    fn one_prediction_per_test_row() {
        let device = Default::default();
        let model = SpectralCnnConfig::new(24, 3)
            .init::<InferenceBackend>(&device)
            .unwrap();
        let data = partition(11, 24);

        let eval = evaluate(&model, &data, 4, &device);
        assert_eq!(eval.predictions.len(), 11);
        assert!(eval.loss.is_finite() && eval.loss > 0.0);
        assert!((0.0..=1.0).contains(&eval.accuracy));

        let predicted = predict(&model, &data, 4, &device);
        assert_eq!(predicted, eval.predictions);
    }
}
