use std::path::Path;

use anyhow::{Context, Result};
use burn::module::{AutodiffModule, Module};
use burn::prelude::Backend;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::classes::class_name;
use crate::cnn::evaluation::{evaluate, predict};
use crate::cnn::model::SpectralCnnConfig;
use crate::cnn::training::{TrainingConfig, train};
use crate::cnn::{InferenceBackend, TrainingBackend, checkpoint};
use crate::config::PipelineConfig;
use crate::data::export::export_parquet;
use crate::data::filter::filter_labeled;
use crate::data::loader::{load_cube, load_ground_truth};
use crate::data::model::{GroundTruth, PixelTable, SpectralCube};
use crate::data::preprocess::PreparedData;
use crate::metrics::{ClassificationReport, ConfusionMatrix};
use crate::plot::{self, chart, raster};

const BAND_GRID_COLUMNS: usize = 5;
const HEATMAP_CELL: u32 = 40;
const HEAD_ROWS: usize = 5;

/// What a finished run produced, for callers and tests.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub labeled_pixels: usize,
    pub bands: usize,
    /// Width of the one-hot targets (`max_label + 1`).
    pub num_classes: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub epochs_run: usize,
    pub best_epoch: Option<usize>,
    pub test_loss: f64,
    pub test_accuracy: f64,
    pub predictions: usize,
    pub report: ClassificationReport,
}

/// Load → tabulate → visualise → preprocess → train → evaluate.
pub fn run(config: &PipelineConfig) -> Result<RunSummary> {
    config.validate()?;
    std::fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("creating output dir {}", config.output_dir.display()))?;
    let out = config.output_dir.as_path();

    // -- load --
    let cube = load_cube(&config.cube_path, &config.cube_key)?;
    let gt = load_ground_truth(&config.ground_truth_path, &config.ground_truth_key)?;
    log::info!("Data Shape: ({}, {})", cube.height(), cube.width());
    log::info!("Number of Bands: {}", cube.bands());
    log::info!("Classes present: {:?}", gt.classes());

    // -- tabulate --
    let table = PixelTable::from_scene(&cube, &gt)?;
    log::info!("Pixel table:\n{}", table.head(HEAD_ROWS));
    if let Some(path) = &config.export_pixel_table {
        export_parquet(&table, path)?;
    }

    if config.render_figures {
        render_scene_figures(config, &cube, &gt, out)?;
    }

    // -- preprocess --
    let labeled = filter_labeled(&table);
    log::info!(
        "Kept {} labeled pixels of {} ({} background)",
        labeled.len(),
        table.len(),
        table.len() - labeled.len()
    );
    let data = PreparedData::prepare(&labeled, config.test_fraction, config.stratify, config.seed)?;
    let (train_set, test_set) = (data.train(), data.test());
    log::info!("X shape: ({}, {})", data.features.nrows(), data.bands());
    log::info!("y shape: ({}, {})", data.targets.nrows(), data.targets.ncols());
    log::info!("X_train: ({}, {})", train_set.len(), train_set.bands());
    log::info!("X_test: ({}, {})", test_set.len(), test_set.bands());

    // -- model --
    let device = <TrainingBackend as Backend>::Device::default();
    TrainingBackend::seed(&device, config.seed);
    let model_config = SpectralCnnConfig::new(data.bands(), data.num_classes)
        .with_dense_units(config.dense_units)
        .with_dropout(config.dropout);
    let model = model_config.init::<TrainingBackend>(&device)?;
    log::info!("{model}");
    log::info!("Total params: {}", model.num_params());

    // -- train --
    let stem = config.checkpoint_path();
    let outcome = train(
        model,
        &train_set,
        &test_set,
        &TrainingConfig::from(config),
        &stem,
        &device,
    )?;
    if outcome.stopped_early {
        log::info!(
            "Stopped early after {} of {} epochs",
            outcome.history.len(),
            config.epochs
        );
    }
    let history_path = out.join("history.csv");
    outcome.history.write_csv(&history_path)?;
    log::info!("Saved training history to {}", history_path.display());
    if config.render_figures {
        plot::save_png(
            &chart::line_chart(&outcome.history.series()),
            &out.join("training_curves.png"),
        )?;
    }

    // -- evaluate --
    let restored = outcome.model.valid();
    let eval = evaluate(&restored, &test_set, config.batch_size, &device);
    log::info!("Accuracy: {}", eval.accuracy * 100.0);
    log::info!("Loss: {}", eval.loss);

    let reloaded =
        checkpoint::load::<InferenceBackend>(&model_config, &outcome.checkpoint, &device)?;
    log::info!("Reloaded {}", checkpoint::checkpoint_file(&outcome.checkpoint).display());
    let predicted = predict(&reloaded, &test_set, config.batch_size, &device);

    let labels: Vec<u32> = (1..data.num_classes as u32).collect();
    let names: Vec<String> = labels
        .iter()
        .map(|&label| class_name(label, &config.class_names))
        .collect();

    let report = ClassificationReport::new(&test_set.labels, &predicted, &labels, &names)?;
    println!("{report}");
    let report_path = out.join("classification_report.json");
    report.write_json(&report_path)?;
    log::info!("Saved classification report to {}", report_path.display());

    let confusion = ConfusionMatrix::new(&test_set.labels, &predicted, &labels)?;
    if confusion.outside() > 0 {
        log::warn!(
            "{} test predictions fall outside classes 1..={}",
            confusion.outside(),
            labels.len()
        );
    }
    let confusion_path = out.join("confusion_matrix.csv");
    confusion.write_csv(&names, &confusion_path)?;
    log::info!("Saved confusion matrix to {}", confusion_path.display());
    if config.render_figures {
        let predicted_labels: Vec<String> =
            confusion.labels().iter().map(u32::to_string).collect();
        plot::save_png(
            &chart::heatmap(confusion.counts(), &names, &predicted_labels, HEATMAP_CELL),
            &out.join("confusion_matrix.png"),
        )?;
    }

    Ok(RunSummary {
        labeled_pixels: labeled.len(),
        bands: data.bands(),
        num_classes: data.num_classes,
        train_rows: train_set.len(),
        test_rows: test_set.len(),
        epochs_run: outcome.history.len(),
        best_epoch: outcome.best_epoch,
        test_loss: eval.loss,
        test_accuracy: eval.accuracy,
        predictions: predicted.len(),
        report,
    })
}

fn render_scene_figures(
    config: &PipelineConfig,
    cube: &SpectralCube,
    gt: &GroundTruth,
    out: &Path,
) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let bands = raster::choose_bands(cube.bands(), config.band_preview_count, &mut rng);
    log::info!("Previewing bands {bands:?}");
    plot::save_png(
        &raster::band_grid(cube, &bands, BAND_GRID_COLUMNS)?,
        &out.join("bands.png"),
    )?;
    plot::save_png(
        &raster::rgb_composite(cube, config.rgb_bands)?,
        &out.join("rgb_composite.png"),
    )?;
    plot::save_png(&raster::label_map(gt), &out.join("ground_truth.png"))?;
    Ok(())
}
