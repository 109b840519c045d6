use burn::prelude::*;
use burn::tensor::activation;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::loss;

/// The single-output layer that replaces the backbone's classifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskHead {
    /// Linear output, mean squared error loss, mean absolute error metric.
    #[default]
    Regression,
    /// Sigmoid output, binary cross-entropy loss, accuracy metric.
    Classification,
}

impl TaskHead {
    pub fn units(&self) -> usize {
        1
    }

    /// Map raw head outputs to predictions.
    pub fn activate<B: Backend>(&self, logits: Tensor<B, 2>) -> Tensor<B, 2> {
        match self {
            TaskHead::Regression => logits,
            TaskHead::Classification => activation::sigmoid(logits),
        }
    }

    /// Training loss on raw head outputs.
    pub fn loss<B: Backend>(&self, logits: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
        match self {
            TaskHead::Regression => loss::mse(logits, targets),
            TaskHead::Classification => loss::binary_cross_entropy_with_logits(logits, targets),
        }
    }

    pub fn metric_name(&self) -> &'static str {
        match self {
            TaskHead::Regression => "mae",
            TaskHead::Classification => "accuracy",
        }
    }

    /// Batch metric on activated predictions.
    pub fn metric(&self, predictions: &[f32], truth: &[f32]) -> f32 {
        if predictions.is_empty() {
            return 0.0;
        }
        let n = predictions.len() as f32;
        match self {
            TaskHead::Regression => {
                predictions
                    .iter()
                    .zip(truth)
                    .map(|(p, t)| (p - t).abs())
                    .sum::<f32>()
                    / n
            }
            TaskHead::Classification => {
                predictions
                    .iter()
                    .zip(truth)
                    .filter(|(p, t)| (**p >= 0.5) == (**t >= 0.5))
                    .count() as f32
                    / n
            }
        }
    }
}

/// Flatten a `[batch, 1]` output column into host values.
pub(crate) fn column_values<B: Backend>(column: Tensor<B, 2>) -> Result<Vec<f32>> {
    column
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| Error::Tensor(format!("{e:?}")))
}
