use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::BatchSource;
use crate::error::{Error, Result};
use crate::model::head::column_values;
use crate::model::{AdaptedModel, TaskHead};

/// Predictions aligned with the evaluation order of a [`BatchSource`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionSet {
    pub filenames: Vec<String>,
    /// `None` when the manifest carried no labels.
    pub truth: Option<Vec<f32>>,
    pub confidences: Vec<f32>,
}

impl PredictionSet {
    pub fn len(&self) -> usize {
        self.confidences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.confidences.is_empty()
    }
}

/// Run `model` over one full pass of an evaluation source.
pub fn predict<B: Backend>(
    model: &AdaptedModel<B>,
    source: &mut BatchSource,
    head: TaskHead,
    device: &B::Device,
) -> Result<PredictionSet> {
    if source.is_empty() {
        return Err(Error::EmptyDataset { split: "test" });
    }
    if source.is_training() {
        log::warn!("Predicting on a training-mode source; rows will be shuffled and augmented");
    }

    source.reset();
    let mut confidences = vec![0.0; source.num_samples()];
    for batch in source.by_ref() {
        let batch = batch?;
        let outputs = column_values(head.activate(model.forward(batch.images::<B>(device))))?;
        for (&row, value) in batch.rows.iter().zip(outputs) {
            confidences[row] = value;
        }
    }

    log::info!("Predicted {} tiles", confidences.len());
    Ok(PredictionSet {
        filenames: source.filenames(),
        truth: source.labels(),
        confidences,
    })
}
