//! On-disk model directories: `model.bin` holds the weights, `config.json` the
//! architecture needed to rebuild the module before the weights are loaded.

use std::path::Path;

use burn::prelude::*;
use burn::record::{BinFileRecorder, FullPrecisionSettings, Recorder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::adapted::{AdaptedModel, AdaptedModelConfig};
use crate::model::backbone::{Backbone, BackboneConfig, LayerShapes};

pub const MODEL_KIND: &str = "adapted";
pub const BACKBONE_KIND: &str = "backbone";

const CONFIG_FILE: &str = "config.json";
const RECORD_STEM: &str = "model";

/// Weight dims actually present in a loaded record.
pub(crate) trait RecordShapes {
    fn layer_shapes(&self) -> LayerShapes;
}

#[derive(Serialize, Deserialize)]
struct StoredConfig<C> {
    model_type: String,
    config: C,
}

pub fn save_model<B: Backend>(
    model: AdaptedModel<B>,
    config: &AdaptedModelConfig,
    dir: &Path,
) -> Result<()> {
    save(model, MODEL_KIND, config, dir)
}

pub fn load_model<B: Backend>(
    dir: &Path,
    device: &B::Device,
) -> Result<(AdaptedModelConfig, AdaptedModel<B>)> {
    let config: AdaptedModelConfig = load_config(dir, MODEL_KIND)?;
    let expected = config.backbone.layer_shapes(config.head.units());
    let model = load_record(config.init(device), &expected, dir, device)?;
    log::info!("Loaded {} model from {}", MODEL_KIND, dir.display());
    log::info!("{}", model.summary());
    Ok((config, model))
}

pub fn save_backbone<B: Backend>(
    backbone: Backbone<B>,
    config: &BackboneConfig,
    dir: &Path,
) -> Result<()> {
    save(backbone, BACKBONE_KIND, config, dir)
}

fn save<B, M, C>(module: M, kind: &str, config: &C, dir: &Path) -> Result<()>
where
    B: Backend,
    M: Module<B>,
    C: Serialize,
{
    let save_err = |reason: String| Error::ModelSave {
        path: dir.to_path_buf(),
        reason,
    };

    std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

    BinFileRecorder::<FullPrecisionSettings>::new()
        .record(module.into_record(), dir.join(RECORD_STEM))
        .map_err(|e| save_err(format!("{e:?}")))?;

    let stored = StoredConfig {
        model_type: kind.to_string(),
        config,
    };
    let json = serde_json::to_string_pretty(&stored).map_err(|e| save_err(e.to_string()))?;
    let config_path = dir.join(CONFIG_FILE);
    std::fs::write(&config_path, json).map_err(|e| Error::io(config_path, e))?;

    log::info!("Saved {kind} model to {}", dir.display());
    Ok(())
}

pub(crate) fn load_config<C: DeserializeOwned>(dir: &Path, kind: &str) -> Result<C> {
    let path = dir.join(CONFIG_FILE);
    let load_err = |reason: String| Error::ModelLoad {
        path: path.clone(),
        reason,
    };

    let content = std::fs::read_to_string(&path).map_err(|e| load_err(e.to_string()))?;
    let stored: StoredConfig<C> =
        serde_json::from_str(&content).map_err(|e| load_err(e.to_string()))?;

    if stored.model_type != kind {
        return Err(load_err(format!(
            "expected model_type `{kind}`, found `{}`",
            stored.model_type
        )));
    }
    Ok(stored.config)
}

/// Load `model.bin` into `module` once its layer shapes agree with `expected`.
pub(crate) fn load_record<B, M>(
    module: M,
    expected: &LayerShapes,
    dir: &Path,
    device: &B::Device,
) -> Result<M>
where
    B: Backend,
    M: Module<B>,
    M::Record: RecordShapes,
{
    let load_err = |reason: String| Error::ModelLoad {
        path: dir.to_path_buf(),
        reason,
    };

    let record: M::Record = BinFileRecorder::<FullPrecisionSettings>::new()
        .load(dir.join(RECORD_STEM), device)
        .map_err(|e| load_err(format!("{e:?}")))?;

    if let Some(mismatch) = expected.mismatch(&record.layer_shapes()) {
        return Err(load_err(format!(
            "layer shapes do not match {CONFIG_FILE}: {mismatch}"
        )));
    }
    Ok(module.load_record(record))
}
