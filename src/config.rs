use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Every tunable of a run. Defaults reproduce the reference Salinas run.
///
/// Loaded from a JSON file where any field may be omitted, e.g.
///
/// ```json
/// { "cube_path": "data/Salinas_corrected.mat", "epochs": 20 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    // -- inputs --
    pub cube_path: PathBuf,
    /// Array name inside a `.mat` cube file.
    pub cube_key: String,
    pub ground_truth_path: PathBuf,
    /// Array name inside a `.mat` ground-truth file.
    pub ground_truth_key: String,
    /// Names for labels 1.. ; empty uses the Salinas class table.
    pub class_names: Vec<String>,

    // -- outputs --
    pub output_dir: PathBuf,
    /// Checkpoint file stem inside `output_dir`.
    pub checkpoint_name: String,
    pub render_figures: bool,
    /// Optional Parquet export of the full pixel table.
    pub export_pixel_table: Option<PathBuf>,
    /// Bands of the false-colour composite (red, green, blue).
    pub rgb_bands: [usize; 3],
    /// Random band images shown in the band grid.
    pub band_preview_count: usize,

    // -- preprocessing --
    pub seed: u64,
    pub test_fraction: f64,
    pub stratify: bool,

    // -- training --
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Epochs without `val_loss` improvement before stopping.
    pub patience: usize,
    pub min_delta: f64,
    pub dropout: f64,
    pub dense_units: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cube_path: PathBuf::from("Salinas_corrected.mat"),
            cube_key: "salinas_corrected".to_string(),
            ground_truth_path: PathBuf::from("Salinas_gt.mat"),
            ground_truth_key: "salinas_gt".to_string(),
            class_names: Vec::new(),
            output_dir: PathBuf::from("output"),
            checkpoint_name: "Salinas_Model".to_string(),
            render_figures: true,
            export_pixel_table: None,
            rgb_bands: [29, 19, 9],
            band_preview_count: 10,
            seed: 11,
            test_fraction: 0.3,
            stratify: true,
            epochs: 100,
            batch_size: 256,
            learning_rate: 1e-3,
            patience: 10,
            min_delta: 0.0,
            dropout: 0.4,
            dense_units: 25,
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config file; missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: PipelineConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Checks that do not need the data.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let fail = |msg: String| Err(PipelineError::InvalidConfig(msg));
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return fail(format!("test_fraction must lie in (0, 1), got {}", self.test_fraction));
        }
        if self.epochs == 0 {
            return fail("epochs must be at least 1".to_string());
        }
        if self.batch_size == 0 {
            return fail("batch_size must be at least 1".to_string());
        }
        if !(self.learning_rate > 0.0) {
            return fail(format!("learning_rate must be positive, got {}", self.learning_rate));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return fail(format!("dropout must lie in [0, 1), got {}", self.dropout));
        }
        if self.dense_units == 0 {
            return fail("dense_units must be at least 1".to_string());
        }
        if self.min_delta < 0.0 {
            return fail(format!("min_delta must be non-negative, got {}", self.min_delta));
        }
        if self.checkpoint_name.is_empty() {
            return fail("checkpoint_name must not be empty".to_string());
        }
        Ok(())
    }

    /// Checkpoint path without the recorder's extension.
    pub fn checkpoint_path(&self) -> PathBuf {
        self.output_dir.join(&self.checkpoint_name)
    }
}
