//! Everything a run leaves behind in its results directory.

pub mod bundle;
pub mod grid;
pub mod plots;

use std::path::{Path, PathBuf};

use image::RgbImage;
use plotters::style::{BLUE, RED};

use crate::error::{Error, Result};
use crate::inference::PredictionSet;
use crate::model::TaskHead;
use crate::training::{ExperimentConfig, TrainingHistory};

use self::plots::Curve;

pub const RESULTS_FILE: &str = "results.json";
pub const PREDICTIONS_FILE: &str = "predictions.csv";
pub const HISTORY_FILE: &str = "history.json";
pub const CONFIG_FILE: &str = "experiment.yaml";
pub const LOSS_PLOT: &str = "loss_history.png";
pub const MODEL_DIR: &str = "model";

const GRID_COLUMNS: usize = 5;

/// Writes artifacts into one results directory, creating it on first use.
///
/// File names are chosen by the caller; existing files are overwritten.
#[derive(Debug, Clone)]
pub struct ResultWriter {
    dir: PathBuf,
}

impl ResultWriter {
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn model_dir(&self) -> PathBuf {
        self.dir.join(MODEL_DIR)
    }

    /// Save `tiles` as a grid, five per row. Nothing is written for an empty slice.
    pub fn write_sample_grid(&self, name: &str, tiles: &[RgbImage]) -> Result<Option<PathBuf>> {
        let Some(canvas) = grid::sample_grid(tiles, GRID_COLUMNS) else {
            return Ok(None);
        };
        let path = self.dir.join(name);
        canvas.save(&path).map_err(|e| Error::Plot {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        log::info!("Wrote {} sample tiles to {}", tiles.len(), path.display());
        Ok(Some(path))
    }

    /// Loss curves plus the head's metric curves, training against validation.
    pub fn write_history_plots(
        &self,
        history: &TrainingHistory,
        head: TaskHead,
        experiment: &str,
    ) -> Result<Vec<PathBuf>> {
        if history.is_empty() {
            log::warn!("No epochs recorded; skipping history plots");
            return Ok(Vec::new());
        }

        let metric = head.metric_name();
        let loss_path = self.dir.join(LOSS_PLOT);
        plots::draw_curves(
            &loss_path,
            &format!("Model loss: {experiment}"),
            "loss",
            &[
                Curve {
                    label: "train",
                    values: &history.losses(),
                    color: BLUE,
                },
                Curve {
                    label: "validation",
                    values: &history.val_losses(),
                    color: RED,
                },
            ],
        )?;

        let metric_path = self.dir.join(format!("{metric}_history.png"));
        plots::draw_curves(
            &metric_path,
            &format!("Model {metric}: {experiment}"),
            metric,
            &[
                Curve {
                    label: "train",
                    values: &history.metrics(),
                    color: BLUE,
                },
                Curve {
                    label: "validation",
                    values: &history.val_metrics(),
                    color: RED,
                },
            ],
        )?;

        log::info!("Wrote history plots to {}", self.dir.display());
        Ok(vec![loss_path, metric_path])
    }

    /// `results.json` and its `predictions.csv` mirror.
    pub fn write_bundle(&self, predictions: &PredictionSet) -> Result<PathBuf> {
        let path = self.dir.join(RESULTS_FILE);
        bundle::write_json(&path, predictions)?;
        bundle::write_predictions_csv(&self.dir.join(PREDICTIONS_FILE), predictions)?;
        log::info!("Wrote {} predictions to {}", predictions.len(), path.display());
        Ok(path)
    }

    pub fn write_history(&self, history: &TrainingHistory) -> Result<PathBuf> {
        let path = self.dir.join(HISTORY_FILE);
        bundle::write_json(&path, history.epochs())?;
        Ok(path)
    }

    pub fn write_config(&self, config: &ExperimentConfig) -> Result<PathBuf> {
        let path = self.dir.join(CONFIG_FILE);
        config.save(&path)?;
        Ok(path)
    }
}
