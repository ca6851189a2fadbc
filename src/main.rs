mod classes;
mod cnn;
mod color;
mod config;
mod data;
mod error;
mod metrics;
mod pipeline;
mod plot;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use env_logger::Env;

use config::PipelineConfig;

/// Train and evaluate a 1-D CNN on the Salinas hyperspectral scene.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// JSON run configuration; omitted fields keep their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Spectral cube (.mat or .npy)
    #[arg(long)]
    cube: Option<PathBuf>,

    /// Ground-truth label raster (.mat or .npy)
    #[arg(long)]
    ground_truth: Option<PathBuf>,

    /// Directory for the checkpoint, figures and reports
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Maximum number of training epochs
    #[arg(short, long)]
    epochs: Option<usize>,

    /// Skip writing PNG figures
    #[arg(long)]
    no_figures: bool,
}

impl Args {
    fn into_config(self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(cube) = self.cube {
            config.cube_path = cube;
        }
        if let Some(gt) = self.ground_truth {
            config.ground_truth_path = gt;
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if let Some(epochs) = self.epochs {
            config.epochs = epochs;
        }
        if self.no_figures {
            config.render_figures = false;
        }
        Ok(config)
    }
}

/// The single line printed for a failed run: the whole context chain.
fn failure_message(e: &anyhow::Error) -> String {
    format!("Error: {e:#}")
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let result = Args::parse().into_config().and_then(|config| {
        log::debug!("{config:?}");
        pipeline::run(&config)
    });

    match result {
        Ok(summary) => {
            log::info!(
                "Done: {} epochs, best epoch {:?}, test accuracy {:.2}%",
                summary.epochs_run,
                summary.best_epoch,
                summary.test_accuracy * 100.0
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", failure_message(&e));
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config_defaults() {
        let args = Args::parse_from([
            "salinas-cnn",
            "--cube",
            "cube.npy",
            "--epochs",
            "3",
            "--no-figures",
        ]);
        let config = args.into_config().unwrap();
        assert_eq!(config.cube_path, PathBuf::from("cube.npy"));
        assert_eq!(config.epochs, 3);
        assert!(!config.render_figures);
        assert_eq!(config.ground_truth_path, PathBuf::from("Salinas_gt.mat"));
    }

    #[test]
    fn failure_is_reported_once_with_its_context() {
        let e = anyhow::anyhow!("no such file").context("reading cube.npy");
        let message = failure_message(&e);
        assert_eq!(message, "Error: reading cube.npy: no such file");
        assert_eq!(message.matches("no such file").count(), 1);
    }

    #[test]
    fn flags_win_over_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, r#"{ "epochs": 7, "batch_size": 64 }"#).unwrap();
        let args = Args::parse_from([
            "salinas-cnn",
            "--config",
            path.to_str().unwrap(),
            "--epochs",
            "2",
        ]);
        let config = args.into_config().unwrap();
        assert_eq!(config.epochs, 2);
        assert_eq!(config.batch_size, 64);
    }
}
