use std::path::{Path, PathBuf};

use burn::prelude::*;
use burn::record::{DefaultRecorder, FileRecorder};

use super::model::{SpectralCnn, SpectralCnnConfig};
use crate::error::PipelineError;

/// File the recorder writes for a checkpoint stem.
pub fn checkpoint_file(stem: &Path) -> PathBuf {
    stem.with_extension(<DefaultRecorder as FileRecorder<crate::cnn::InferenceBackend>>::file_extension())
}

/// Persist model weights under `stem` (the recorder adds its extension).
pub fn save<B: Backend>(model: &SpectralCnn<B>, stem: &Path) -> Result<(), PipelineError> {
    model
        .clone()
        .save_file(stem.to_path_buf(), &DefaultRecorder::new())
        .map_err(|e| PipelineError::Checkpoint(format!("saving {}: {e:?}", stem.display())))
}

/// Rebuild the topology from `config` and load the weights saved under `stem`.
pub fn load<B: Backend>(
    config: &SpectralCnnConfig,
    stem: &Path,
    device: &B::Device,
) -> Result<SpectralCnn<B>, PipelineError> {
    config
        .init::<B>(device)?
        .load_file(stem.to_path_buf(), &DefaultRecorder::new(), device)
        .map_err(|e| PipelineError::Checkpoint(format!("loading {}: {e:?}", stem.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnn::InferenceBackend;

    #[test]
    fn saved_weights_reload_identically() {
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("model");
        let device = Default::default();
        let config = SpectralCnnConfig::new(24, 3);
        let model = config.init::<InferenceBackend>(&device).unwrap();

        save(&model, &stem).unwrap();
        assert!(checkpoint_file(&stem).exists());

        let reloaded = load::<InferenceBackend>(&config, &stem, &device).unwrap();
        let input = Tensor::<InferenceBackend, 3>::random(
            [4, 1, 24],
            burn::tensor::Distribution::Default,
            &device,
        );
        let a: Vec<f32> = model.forward(input.clone()).into_data().iter::<f32>().collect();
        let b: Vec<f32> = reloaded.forward(input).into_data().iter::<f32>().collect();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-6);
        }
    }

    #[test]
    fn missing_checkpoint_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let result = load::<InferenceBackend>(
            &SpectralCnnConfig::new(24, 3),
            &dir.path().join("absent"),
            &device,
        );
        assert!(matches!(result, Err(PipelineError::Checkpoint(_))));
    }
}
