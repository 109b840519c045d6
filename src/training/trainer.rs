use burn::module::AutodiffModule;
use burn::optim::{GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use indicatif::{ProgressBar, ProgressStyle};

use crate::data::BatchSource;
use crate::error::{Error, Result};
use crate::model::head::column_values;
use crate::model::{AdaptedModel, TaskHead};
use crate::training::early_stopping::EarlyStopping;
use crate::training::metrics::{EpochMetrics, PassAccumulator, TrainingHistory};
use crate::training::state::{StopReason, TrainingState};

/// One epoch of work: a training pass followed by a validation pass.
pub trait EpochRunner {
    fn run_epoch(&mut self, epoch: usize) -> Result<EpochMetrics>;
}

#[derive(Debug, Clone)]
pub struct FitOutcome {
    pub history: TrainingHistory,
    pub stop_reason: StopReason,
}

/// Drive `runner` for up to `epochs` epochs, stopping early when `stopping` says so.
pub fn fit_epochs<R: EpochRunner>(
    runner: &mut R,
    epochs: usize,
    mut stopping: Option<EarlyStopping>,
) -> Result<FitOutcome> {
    let mut state = TrainingState::new();
    let mut history = TrainingHistory::default();
    let mut stop_reason = StopReason::EpochBudgetReached;

    let pb = ProgressBar::new(epochs as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    for epoch in 1..=epochs {
        state.begin_epoch(epoch);
        let metrics = runner.run_epoch(epoch)?;

        log::info!(
            "Epoch {}/{}: loss={:.5} val_loss={:.5} metric={:.5} val_metric={:.5}",
            epoch,
            epochs,
            metrics.loss,
            metrics.val_loss,
            metrics.metric,
            metrics.val_metric
        );
        pb.set_message(format!(
            "loss={:.4} val_loss={:.4}",
            metrics.loss, metrics.val_loss
        ));
        pb.inc(1);
        history.push(metrics);

        if let Some(stopping) = stopping.as_mut() {
            if stopping.should_stop(&metrics) {
                stop_reason = StopReason::PatienceExhausted;
                break;
            }
        }
    }

    pb.finish_with_message("training finished");
    state.converge(stop_reason);
    state.complete();

    Ok(FitOutcome {
        history,
        stop_reason,
    })
}

pub struct TrainedModel<B: Backend> {
    pub model: AdaptedModel<B>,
    pub history: TrainingHistory,
    pub stop_reason: StopReason,
}

/// Fits the trainable head of an [`AdaptedModel`] with a first-order optimizer.
pub struct Trainer<B: AutodiffBackend, O> {
    model: AdaptedModel<B>,
    optimizer: O,
    head: TaskHead,
    learning_rate: f64,
    device: B::Device,
}

impl<B, O> Trainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<AdaptedModel<B>, B>,
{
    pub fn new(
        model: AdaptedModel<B>,
        optimizer: O,
        head: TaskHead,
        learning_rate: f64,
        device: B::Device,
    ) -> Self {
        Self {
            model,
            optimizer,
            head,
            learning_rate,
            device,
        }
    }

    /// Train on `train`, validating on `valid` after every epoch.
    pub fn fit(
        mut self,
        train: &mut BatchSource,
        valid: &mut BatchSource,
        epochs: usize,
        stopping: Option<EarlyStopping>,
    ) -> Result<TrainedModel<B>> {
        if train.is_empty() {
            return Err(Error::EmptyDataset { split: "train" });
        }
        if valid.is_empty() {
            return Err(Error::EmptyDataset {
                split: "validation",
            });
        }

        log::info!(
            "Training for up to {} epochs: {} train / {} validation samples, lr={}",
            epochs,
            train.num_samples(),
            valid.num_samples(),
            self.learning_rate
        );

        let outcome = fit_epochs(
            &mut EpochLoop {
                trainer: &mut self,
                train,
                valid,
            },
            epochs,
            stopping,
        )?;
        log::info!(
            "Stopped after {} epochs ({:?})",
            outcome.history.len(),
            outcome.stop_reason
        );

        Ok(TrainedModel {
            model: self.model,
            history: outcome.history,
            stop_reason: outcome.stop_reason,
        })
    }

    fn train_pass(&mut self, source: &mut BatchSource) -> Result<(f32, f32)> {
        source.reset();
        let mut acc = PassAccumulator::default();

        for batch in source.by_ref() {
            let batch = batch?;
            let (Some(targets), Some(truth)) =
                (batch.targets::<B>(&self.device), batch.labels.as_deref())
            else {
                return Err(Error::MissingLabels { split: "train" });
            };

            let logits = self.model.forward(batch.images::<B>(&self.device));
            let loss = self.head.loss(logits.clone(), targets);
            let loss_value = loss.clone().into_scalar().elem::<f32>();
            let predictions = column_values(self.head.activate(logits.inner()))?;
            acc.add(loss_value, self.head.metric(&predictions, truth), batch.len());

            let grads = GradientsParams::from_grads(loss.backward(), &self.model);
            self.model = self
                .optimizer
                .step(self.learning_rate, self.model.clone(), grads);
        }

        Ok(acc.means())
    }

    fn validation_pass(&self, source: &mut BatchSource) -> Result<(f32, f32)> {
        source.reset();
        let model = self.model.valid();
        let mut acc = PassAccumulator::default();

        for batch in source.by_ref() {
            let batch = batch?;
            let (Some(targets), Some(truth)) = (
                batch.targets::<B::InnerBackend>(&self.device),
                batch.labels.as_deref(),
            ) else {
                return Err(Error::MissingLabels {
                    split: "validation",
                });
            };

            let logits = model.forward(batch.images::<B::InnerBackend>(&self.device));
            let loss = self.head.loss(logits.clone(), targets);
            let predictions = column_values(self.head.activate(logits))?;
            acc.add(
                loss.into_scalar().elem::<f32>(),
                self.head.metric(&predictions, truth),
                batch.len(),
            );
        }

        Ok(acc.means())
    }
}

struct EpochLoop<'a, B: AutodiffBackend, O> {
    trainer: &'a mut Trainer<B, O>,
    train: &'a mut BatchSource,
    valid: &'a mut BatchSource,
}

impl<B, O> EpochRunner for EpochLoop<'_, B, O>
where
    B: AutodiffBackend,
    O: Optimizer<AdaptedModel<B>, B>,
{
    fn run_epoch(&mut self, epoch: usize) -> Result<EpochMetrics> {
        let (loss, metric) = self.trainer.train_pass(self.train)?;
        let (val_loss, val_metric) = self.trainer.validation_pass(self.valid)?;
        Ok(EpochMetrics {
            epoch,
            loss,
            val_loss,
            metric,
            val_metric,
        })
    }
}
