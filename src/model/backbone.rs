use std::path::PathBuf;

use burn::nn::{Linear, LinearConfig, LinearRecord};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::blocks::{ConvStage, ConvStageRecord};
use crate::model::store::{self, RecordShapes};

/// Shape of a VGG-style image classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackboneConfig {
    pub image_size: usize,
    pub in_channels: usize,
    /// Conv widths per stage; every stage ends in a 2x2 max-pool.
    pub stages: Vec<Vec<usize>>,
    /// Widths of the dense layers between the flattened features and the classifier.
    pub hidden: Vec<usize>,
    pub num_classes: usize,
}

impl BackboneConfig {
    pub fn vgg16() -> Self {
        Self {
            image_size: 224,
            in_channels: 3,
            stages: vec![
                vec![64, 64],
                vec![128, 128],
                vec![256, 256, 256],
                vec![512, 512, 512],
                vec![512, 512, 512],
            ],
            hidden: vec![4096, 4096],
            num_classes: 1000,
        }
    }

    /// Length of the flattened feature vector after the last stage.
    pub fn feature_len(&self) -> usize {
        let side = self.stages.iter().fold(self.image_size, |side, _| side / 2);
        let channels = self
            .stages
            .iter()
            .rev()
            .find_map(|widths| widths.last().copied())
            .unwrap_or(self.in_channels);
        channels * side * side
    }

    /// Weight dims a module built from this config carries, ending in a dense layer
    /// of `units` outputs.
    pub(crate) fn layer_shapes(&self, units: usize) -> LayerShapes {
        let mut channels = self.in_channels;
        let convs = self
            .stages
            .iter()
            .map(|widths| {
                widths
                    .iter()
                    .map(|&out| {
                        let shape = [out, channels, 3, 3];
                        channels = out;
                        shape
                    })
                    .collect()
            })
            .collect();

        let mut width = self.feature_len();
        let mut dense: Vec<[usize; 2]> = self
            .hidden
            .iter()
            .map(|&out| {
                let shape = [width, out];
                width = out;
                shape
            })
            .collect();
        dense.push([width, units]);

        LayerShapes { convs, dense }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Backbone<B> {
        let mut channels = self.in_channels;
        let stages = self
            .stages
            .iter()
            .map(|widths| {
                let stage = ConvStage::new(device, channels, widths);
                channels = widths.last().copied().unwrap_or(channels);
                stage
            })
            .collect();

        let mut width = self.feature_len();
        let hidden = self
            .hidden
            .iter()
            .map(|&out| {
                let layer = LinearConfig::new(width, out).init(device);
                width = out;
                layer
            })
            .collect();

        Backbone {
            stages,
            hidden,
            predictions: LinearConfig::new(width, self.num_classes).init(device),
        }
    }
}

/// Weight dims per layer: conv kernels grouped by stage, then dense `[in, out]`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LayerShapes {
    pub convs: Vec<Vec<[usize; 4]>>,
    pub dense: Vec<[usize; 2]>,
}

impl LayerShapes {
    pub(crate) fn of<B: Backend>(stages: &[ConvStageRecord<B>], dense: &[&LinearRecord<B>]) -> Self {
        Self {
            convs: stages.iter().map(ConvStageRecord::kernel_shapes).collect(),
            dense: dense.iter().map(|layer| layer.weight.val().dims()).collect(),
        }
    }

    /// First layer where `found` disagrees with `self`, described for an error message.
    pub(crate) fn mismatch(&self, found: &LayerShapes) -> Option<String> {
        if self.convs.len() != found.convs.len() {
            return Some(format!(
                "expected {} conv stages, found {}",
                self.convs.len(),
                found.convs.len()
            ));
        }
        for (i, (expected, actual)) in self.convs.iter().zip(&found.convs).enumerate() {
            if expected != actual {
                return Some(format!(
                    "conv stage {}: expected kernels {expected:?}, found {actual:?}",
                    i + 1
                ));
            }
        }
        if self.dense != found.dense {
            return Some(format!(
                "dense layers: expected {:?}, found {:?}",
                self.dense, found.dense
            ));
        }
        None
    }
}

/// A pretrained feature extractor plus its original classification layer.
#[derive(Module, Debug)]
pub struct Backbone<B: Backend> {
    pub(crate) stages: Vec<ConvStage<B>>,
    pub(crate) hidden: Vec<Linear<B>>,
    pub(crate) predictions: Linear<B>,
}

impl<B: Backend> RecordShapes for BackboneRecord<B> {
    fn layer_shapes(&self) -> LayerShapes {
        let dense: Vec<_> = self.hidden.iter().chain([&self.predictions]).collect();
        LayerShapes::of(&self.stages, &dense)
    }
}

/// Where the backbone weights come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackboneSource {
    /// Directory holding `config.json` and a `model.bin` record.
    Pretrained(PathBuf),
    /// Fresh, seeded random weights. Useful for smoke runs only.
    Initialized(BackboneConfig),
}

impl Default for BackboneSource {
    fn default() -> Self {
        Self::Pretrained(PathBuf::from("weights/vgg16"))
    }
}

impl BackboneSource {
    pub fn load<B: Backend>(&self, device: &B::Device) -> Result<(BackboneConfig, Backbone<B>)> {
        match self {
            BackboneSource::Pretrained(dir) => {
                log::info!("Loading pretrained backbone from {}", dir.display());
                let config: BackboneConfig = store::load_config(dir, store::BACKBONE_KIND)?;
                let expected = config.layer_shapes(config.num_classes);
                let backbone = store::load_record(config.init(device), &expected, dir, device)?;
                Ok((config, backbone))
            }
            BackboneSource::Initialized(config) => {
                log::warn!("No pretrained weights given; backbone is randomly initialized");
                Ok((config.clone(), config.init(device)))
            }
        }
    }
}
