use burn::nn::conv::{Conv1d, Conv1dConfig};
use burn::nn::pool::{MaxPool1d, MaxPool1dConfig};
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::{relu, softmax};

use crate::error::PipelineError;

/// Convolutions per block.
const CONVS_PER_BLOCK: usize = 3;

/// Two blocks of three valid-padded convolutions, each block closed by max
/// pooling and dropout, followed by a small dense head.
///
/// Input is `[batch, 1, bands]`; output is `[batch, num_classes]` logits.
#[derive(Module, Debug)]
pub struct SpectralCnn<B: Backend> {
    conv1: Conv1d<B>,
    conv2: Conv1d<B>,
    conv3: Conv1d<B>,
    pool1: MaxPool1d,
    dropout1: Dropout,
    conv4: Conv1d<B>,
    conv5: Conv1d<B>,
    conv6: Conv1d<B>,
    pool2: MaxPool1d,
    dropout2: Dropout,
    dense: Linear<B>,
    output: Linear<B>,
}

#[derive(Config, Debug)]
pub struct SpectralCnnConfig {
    pub bands: usize,
    pub num_classes: usize,
    #[config(default = 64)]
    pub wide_filters: usize,
    #[config(default = 32)]
    pub narrow_filters: usize,
    #[config(default = 3)]
    pub kernel_size: usize,
    #[config(default = 2)]
    pub pool_size: usize,
    #[config(default = 25)]
    pub dense_units: usize,
    #[config(default = 0.4)]
    pub dropout: f64,
}

impl SpectralCnnConfig {
    /// Length of the band axis after both blocks, or `None` when the input is
    /// too short to survive them.
    pub fn feature_length(&self) -> Option<usize> {
        if self.kernel_size == 0 || self.pool_size == 0 {
            return None;
        }
        let block = |len: usize| -> Option<usize> {
            let convolved = len.checked_sub(CONVS_PER_BLOCK * (self.kernel_size - 1))?;
            let pooled = convolved / self.pool_size;
            (pooled > 0).then_some(pooled)
        };
        block(self.bands).and_then(block)
    }

    /// Input size of the dense layer.
    pub fn flattened_len(&self) -> Option<usize> {
        self.feature_length().map(|len| len * self.narrow_filters)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<SpectralCnn<B>, PipelineError> {
        let flattened = self.flattened_len().ok_or_else(|| {
            PipelineError::InvalidConfig(format!(
                "{} bands are too few for two blocks of {CONVS_PER_BLOCK} convolutions (kernel {}) and pooling (size {})",
                self.bands, self.kernel_size, self.pool_size
            ))
        })?;
        if self.num_classes < 2 {
            return Err(PipelineError::InvalidConfig(format!(
                "need at least 2 output classes, got {}",
                self.num_classes
            )));
        }

        let conv = |c_in: usize, c_out: usize| {
            Conv1dConfig::new(c_in, c_out, self.kernel_size).init::<B>(device)
        };
        let pool = || {
            MaxPool1dConfig::new(self.pool_size)
                .with_stride(self.pool_size)
                .init()
        };
        let (wide, narrow) = (self.wide_filters, self.narrow_filters);

        Ok(SpectralCnn {
            conv1: conv(1, wide),
            conv2: conv(wide, wide),
            conv3: conv(wide, wide),
            pool1: pool(),
            dropout1: DropoutConfig::new(self.dropout).init(),
            conv4: conv(wide, narrow),
            conv5: conv(narrow, narrow),
            conv6: conv(narrow, narrow),
            pool2: pool(),
            dropout2: DropoutConfig::new(self.dropout).init(),
            dense: LinearConfig::new(flattened, self.dense_units).init::<B>(device),
            output: LinearConfig::new(self.dense_units, self.num_classes).init::<B>(device),
        })
    }
}

impl<B: Backend> SpectralCnn<B> {
    /// `[batch, 1, bands]` → `[batch, num_classes]` logits.
    pub fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 2> {
        let x = relu(self.conv1.forward(input));
        let x = relu(self.conv2.forward(x));
        let x = relu(self.conv3.forward(x));
        let x = self.dropout1.forward(self.pool1.forward(x));

        let x = relu(self.conv4.forward(x));
        let x = relu(self.conv5.forward(x));
        let x = relu(self.conv6.forward(x));
        let x = self.dropout2.forward(self.pool2.forward(x));

        let [batch, channels, length] = x.dims();
        let x = x.reshape([batch, channels * length]);
        let x = relu(self.dense.forward(x));
        self.output.forward(x)
    }

    /// Class probabilities.
    pub fn predict_proba(&self, input: Tensor<B, 3>) -> Tensor<B, 2> {
        softmax(self.forward(input), 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnn::InferenceBackend;

    #[test]
    fn salinas_band_count_flattens_to_reference_size() {
        let config = SpectralCnnConfig::new(204, 17);
        // 204 → 198 → 99 → 93 → 46, times 32 filters
        assert_eq!(config.feature_length(), Some(46));
        assert_eq!(config.flattened_len(), Some(1472));
    }

    #[test]
    fn too_few_bands_is_a_config_error() {
        let config = SpectralCnnConfig::new(20, 3);
        assert_eq!(config.feature_length(), None);
        let device = Default::default();
        assert!(matches!(
            config.init::<InferenceBackend>(&device),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn forward_produces_one_logit_row_per_sample() {
        let device = Default::default();
        let model = SpectralCnnConfig::new(30, 4)
            .init::<InferenceBackend>(&device)
            .unwrap();
        let input = Tensor::<InferenceBackend, 3>::ones([5, 1, 30], &device);
        let logits = model.forward(input.clone());
        assert_eq!(logits.dims(), [5, 4]);

        let probs = model.predict_proba(input);
        let sums: Vec<f32> = probs.sum_dim(1).into_data().iter::<f32>().collect();
        assert!(sums.iter().all(|s| (s - 1.0).abs() < 1e-4));
    }

    #[test]
    fn parameter_count_follows_topology() {
        let device = Default::default();
        let model = SpectralCnnConfig::new(30, 4)
            .init::<InferenceBackend>(&device)
            .unwrap();
        // 30 → 24 → 12 → 6 → 3; dense input 3 * 32 = 96
        let convs = (1 * 3 * 64 + 64)
            + 2 * (64 * 3 * 64 + 64)
            + (64 * 3 * 32 + 32)
            + 2 * (32 * 3 * 32 + 32);
        let head = (96 * 25 + 25) + (25 * 4 + 4);
        assert_eq!(model.num_params(), convs + head);
    }
}
