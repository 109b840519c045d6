use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::PaddingConfig2d;
use burn::prelude::*;
use burn::tensor::activation;

/// A VGG stage: 3x3 same-padded convolutions with ReLU, then a 2x2 max-pool.
#[derive(Module, Debug)]
pub struct ConvStage<B: Backend> {
    pub(crate) convs: Vec<Conv2d<B>>,
    pool: MaxPool2d,
}

impl<B: Backend> ConvStage<B> {
    pub fn new(device: &B::Device, in_channels: usize, widths: &[usize]) -> Self {
        let mut channels = in_channels;
        let convs = widths
            .iter()
            .map(|&out_channels| {
                let conv = Conv2dConfig::new([channels, out_channels], [3, 3])
                    .with_stride([1, 1])
                    .with_padding(PaddingConfig2d::Explicit(1, 1))
                    .init(device);
                channels = out_channels;
                conv
            })
            .collect();

        Self {
            convs,
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self
            .convs
            .iter()
            .fold(x, |x, conv| activation::relu(conv.forward(x)));
        self.pool.forward(x)
    }
}

impl<B: Backend> ConvStageRecord<B> {
    /// Kernel dims `[out, in, 3, 3]` of every convolution in the stage.
    pub(crate) fn kernel_shapes(&self) -> Vec<[usize; 4]> {
        self.convs.iter().map(|conv| conv.weight.val().dims()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestBackend;

    #[test]
    fn test_stage_halves_resolution() {
        let device = Default::default();
        let stage = ConvStage::<TestBackend>::new(&device, 3, &[4, 5]);

        let x = Tensor::<TestBackend, 4>::zeros([2, 3, 8, 8], &device);
        assert_eq!(stage.forward(x).dims(), [2, 5, 4, 4]);
    }
}
