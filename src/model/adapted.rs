use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation;
use serde::{Deserialize, Serialize};

use crate::model::backbone::{Backbone, BackboneConfig, LayerShapes};
use crate::model::blocks::ConvStage;
use crate::model::head::TaskHead;
use crate::model::store::RecordShapes;

/// Everything needed to rebuild an [`AdaptedModel`] before loading its weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptedModelConfig {
    pub backbone: BackboneConfig,
    pub head: TaskHead,
}

impl AdaptedModelConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> AdaptedModel<B> {
        build_adapted_model(self.backbone.init(device), self.head, device)
    }
}

/// A frozen backbone feeding one trainable output unit.
#[derive(Module, Debug)]
pub struct AdaptedModel<B: Backend> {
    pub(crate) stages: Vec<ConvStage<B>>,
    pub(crate) hidden: Vec<Linear<B>>,
    pub(crate) head: Linear<B>,
}

/// Drop the backbone's classifier, freeze everything before it and attach a fresh
/// single-unit layer sized to the classifier's input width.
pub fn build_adapted_model<B: Backend>(
    backbone: Backbone<B>,
    head: TaskHead,
    device: &B::Device,
) -> AdaptedModel<B> {
    let Backbone {
        stages,
        hidden,
        predictions,
    } = backbone;
    let [features, _] = predictions.weight.val().dims();

    AdaptedModel {
        stages: stages.into_iter().map(|stage| stage.no_grad()).collect(),
        hidden: hidden.into_iter().map(|layer| layer.no_grad()).collect(),
        head: LinearConfig::new(features, head.units()).init(device),
    }
}

impl<B: Backend> AdaptedModel<B> {
    /// Raw head outputs, `[batch, 1]`.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self
            .stages
            .iter()
            .fold(images, |x, stage| stage.forward(x));
        let x = self
            .hidden
            .iter()
            .fold(x.flatten::<2>(1, 3), |x, layer| activation::relu(layer.forward(x)));
        self.head.forward(x)
    }

    /// One-line layer and parameter summary.
    pub fn summary(&self) -> String {
        let convs: usize = self.stages.iter().map(|stage| stage.convs.len()).sum();
        let frozen = self.stages.num_params() + self.hidden.num_params();
        let [features, units] = self.head.weight.val().dims();
        format!(
            "AdaptedModel: {} conv stages ({convs} convs), {} hidden dense, head {features} -> {units}; \
             {} params ({frozen} frozen, {} trainable)",
            self.stages.len(),
            self.hidden.len(),
            frozen + self.head.num_params(),
            self.head.num_params()
        )
    }
}

impl<B: Backend> RecordShapes for AdaptedModelRecord<B> {
    fn layer_shapes(&self) -> LayerShapes {
        let dense: Vec<_> = self.hidden.iter().chain([&self.head]).collect();
        LayerShapes::of(&self.stages, &dense)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{tiny_backbone, TestAutodiffBackend, TestBackend};

    #[test]
    fn test_head_replaces_classifier() {
        let device = Default::default();
        let config = tiny_backbone();
        let model = build_adapted_model(
            config.init::<TestBackend>(&device),
            TaskHead::Regression,
            &device,
        );

        assert_eq!(model.head.weight.val().dims(), [6, 1]);
        let x = Tensor::<TestBackend, 4>::zeros([3, 3, 8, 8], &device);
        assert_eq!(model.forward(x).dims(), [3, 1]);
    }

    #[test]
    fn test_only_head_receives_gradients() {
        let device = Default::default();
        let model = AdaptedModelConfig {
            backbone: tiny_backbone(),
            head: TaskHead::Classification,
        }
        .init::<TestAutodiffBackend>(&device);

        let x = Tensor::<TestAutodiffBackend, 4>::ones([2, 3, 8, 8], &device);
        let grads = model.forward(x).sum().backward();

        assert!(model.head.weight.val().grad(&grads).is_some());
        assert!(model.hidden[0].weight.val().grad(&grads).is_none());
        assert!(model.stages[0].convs[0].weight.val().grad(&grads).is_none());
    }

    #[test]
    fn test_summary_counts_frozen_and_trainable_params() {
        let device = Default::default();
        let model = AdaptedModelConfig {
            backbone: tiny_backbone(),
            head: TaskHead::Regression,
        }
        .init::<TestBackend>(&device);

        // convs: 4*3*9+4 and 4*4*9+4; hidden: 16*6+6; head: 6+1
        let summary = model.summary();
        assert!(summary.contains("2 conv stages (2 convs), 1 hidden dense, head 6 -> 1"));
        assert!(summary.contains("369 params (362 frozen, 7 trainable)"));
    }
}
