use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use burn::module::AutodiffModule;
use burn::nn::loss::CrossEntropyLossConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::ElementConversion;
use burn::tensor::backend::AutodiffBackend;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Serialize;

use super::batch::{features_tensor, predicted_classes, targets_tensor};
use super::checkpoint;
use super::evaluation::evaluate;
use super::model::SpectralCnn;
use crate::config::PipelineConfig;
use crate::data::preprocess::Partition;
use crate::plot::chart::Series;

// ---------------------------------------------------------------------------
// Early stopping
// ---------------------------------------------------------------------------

/// What the stopper concluded from one epoch's monitored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Improved,
    NoImprovement,
    Stop,
}

/// Minimises a monitored value; stops after `patience` consecutive epochs
/// without an improvement larger than `min_delta`.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    min_delta: f64,
    best: f64,
    best_epoch: Option<usize>,
    wait: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize, min_delta: f64) -> Self {
        EarlyStopping {
            patience,
            min_delta: min_delta.abs(),
            best: f64::INFINITY,
            best_epoch: None,
            wait: 0,
        }
    }

    pub fn observe(&mut self, epoch: usize, value: f64) -> Verdict {
        // NaN never improves
        if value < self.best - self.min_delta {
            self.best = value;
            self.best_epoch = Some(epoch);
            self.wait = 0;
            return Verdict::Improved;
        }
        self.wait += 1;
        if self.wait >= self.patience {
            Verdict::Stop
        } else {
            Verdict::NoImprovement
        }
    }

    pub fn best(&self) -> f64 {
        self.best
    }

    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }
}

// ---------------------------------------------------------------------------
// Training history
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub loss: f64,
    pub accuracy: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
}

#[derive(Debug, Clone, Default)]
pub struct History {
    pub epochs: Vec<EpochRecord>,
}

impl History {
    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    /// Curves in plotting order: train loss, train accuracy, test loss, test accuracy.
    pub fn series(&self) -> Vec<Series> {
        let column =
            |f: fn(&EpochRecord) -> f64| -> Vec<f64> { self.epochs.iter().map(f).collect() };
        vec![
            Series::new("Train Loss", column(|r| r.loss)),
            Series::new("Train Accuracy", column(|r| r.accuracy)),
            Series::new("Test loss", column(|r| r.val_loss)),
            Series::new("Test Accuracy", column(|r| r.val_accuracy)),
        ]
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("creating {}", path.display()))?;
        for record in &self.epochs {
            writer.serialize(record)?;
        }
        writer.flush().context("flushing history CSV")?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fit loop
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub patience: usize,
    pub min_delta: f64,
    pub seed: u64,
}

impl From<&PipelineConfig> for TrainingConfig {
    fn from(config: &PipelineConfig) -> Self {
        TrainingConfig {
            epochs: config.epochs,
            batch_size: config.batch_size,
            learning_rate: config.learning_rate,
            patience: config.patience,
            min_delta: config.min_delta,
            seed: config.seed,
        }
    }
}

pub struct TrainingOutcome<B: AutodiffBackend> {
    /// Best-epoch weights when the run stopped early, final weights otherwise.
    pub model: SpectralCnn<B>,
    pub history: History,
    pub best_epoch: Option<usize>,
    pub stopped_early: bool,
    /// Checkpoint stem the best weights were written under.
    pub checkpoint: PathBuf,
}

/// Fit with Adam on cross-entropy, validating on `valid` after every epoch.
///
/// The training rows are reshuffled each epoch. Whenever the validation loss
/// improves, the weights are checkpointed under `checkpoint_stem`. When it has
/// not improved for `patience` epochs the run stops and the best weights are
/// restored; a run that uses its whole epoch budget returns its final weights.
pub fn train<B: AutodiffBackend>(
    mut model: SpectralCnn<B>,
    train: &Partition,
    valid: &Partition,
    config: &TrainingConfig,
    checkpoint_stem: &Path,
    device: &B::Device,
) -> Result<TrainingOutcome<B>> {
    let mut optim = AdamConfig::new().init::<B, SpectralCnn<B>>();
    let loss_fn = CrossEntropyLossConfig::new().init::<B>(device);
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut stopper = EarlyStopping::new(config.patience, config.min_delta);
    let mut best_saved = f64::INFINITY;
    let mut best_model = model.clone();
    let mut history = History::default();
    let mut stopped_early = false;

    let mut order: Vec<usize> = (0..train.len()).collect();
    let steps = train.len().div_ceil(config.batch_size.max(1));

    for epoch in 1..=config.epochs {
        order.shuffle(&mut rng);

        let mut loss_sum = 0.0;
        let mut correct = 0usize;
        for chunk in order.chunks(config.batch_size.max(1)) {
            let inputs = features_tensor::<B>(&train.features, chunk, device);
            let targets = targets_tensor::<B>(&train.labels, chunk, device);

            let logits = model.forward(inputs);
            let loss = loss_fn.forward(logits.clone(), targets);

            loss_sum += loss.clone().into_scalar().elem::<f64>() * chunk.len() as f64;
            correct += predicted_classes(logits.detach())
                .iter()
                .zip(chunk)
                .filter(|&(&p, &row)| p == train.labels[row])
                .count();

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(config.learning_rate, model, grads);
        }

        let n = train.len().max(1) as f64;
        let val = evaluate(&model.valid(), valid, config.batch_size, device);
        let record = EpochRecord {
            epoch,
            loss: loss_sum / n,
            accuracy: correct as f64 / n,
            val_loss: val.loss,
            val_accuracy: val.accuracy,
        };
        log::info!(
            "Epoch {epoch}/{} ({steps} steps) - loss: {:.4} - accuracy: {:.4} - val_loss: {:.4} - val_accuracy: {:.4}",
            config.epochs,
            record.loss,
            record.accuracy,
            record.val_loss,
            record.val_accuracy
        );
        history.epochs.push(record);

        if val.loss < best_saved {
            log::info!(
                "val_loss improved from {best_saved:.5} to {:.5}, saving model to {}",
                val.loss,
                checkpoint::checkpoint_file(checkpoint_stem).display()
            );
            best_saved = val.loss;
            checkpoint::save(&model, checkpoint_stem)?;
        }

        match stopper.observe(epoch, val.loss) {
            Verdict::Improved => best_model = model.clone(),
            Verdict::NoImprovement => {}
            Verdict::Stop => {
                log::info!("Epoch {epoch}: early stopping");
                stopped_early = true;
                break;
            }
        }
    }

    if stopped_early {
        match stopper.best_epoch() {
            Some(best) => {
                log::info!(
                    "Restoring model weights from the end of the best epoch: {best} (val_loss {:.5})",
                    stopper.best()
                );
                model = best_model;
            }
            None => log::warn!("validation loss never improved; keeping final weights"),
        }
    }

    Ok(TrainingOutcome {
        model,
        history,
        best_epoch: stopper.best_epoch(),
        stopped_early,
        checkpoint: checkpoint_stem.to_path_buf(),
    })
}
