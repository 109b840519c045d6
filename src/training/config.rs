use std::path::Path;

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::AugmentationConfig;
use crate::error::{Error, Result};
use crate::model::{BackboneSource, TaskHead};
use crate::training::early_stopping::EarlyStoppingConfig;

/// Process-wide determinism settings. Applied once, before any model is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub seed: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { seed: 123 }
    }
}

impl RunConfig {
    pub fn apply<B: Backend>(&self) {
        B::seed(self.seed);
        log::info!("Seeded backend with {}", self.seed);
    }
}

/// Everything about an experiment that is not given on the command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub run: RunConfig,
    pub backbone: BackboneSource,
    pub head: TaskHead,
    pub augmentation: AugmentationConfig,
    /// `None` trains for the full epoch budget.
    pub early_stopping: Option<EarlyStoppingConfig>,
    /// Tiles per sample grid.
    pub preview_tiles: usize,
    pub plots: bool,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            run: RunConfig::default(),
            backbone: BackboneSource::default(),
            head: TaskHead::default(),
            augmentation: AugmentationConfig::default(),
            early_stopping: Some(EarlyStoppingConfig::default()),
            preview_tiles: 25,
            plots: true,
        }
    }
}

impl ExperimentConfig {
    pub fn from_yaml(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        serde_yaml::from_str(&content).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self).map_err(|e| Error::Serialize {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        std::fs::write(path, yaml).map_err(|e| Error::io(path, e))
    }
}
