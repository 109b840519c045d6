use serde::{Deserialize, Serialize};

/// Sample-weighted means over one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub loss: f32,
    pub val_loss: f32,
    /// MAE for regression, accuracy for classification.
    pub metric: f32,
    pub val_metric: f32,
}

/// Per-epoch metrics in epoch order. Only the training loop appends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    epochs: Vec<EpochMetrics>,
}

impl TrainingHistory {
    pub(crate) fn push(&mut self, metrics: EpochMetrics) {
        self.epochs.push(metrics);
    }

    pub fn epochs(&self) -> &[EpochMetrics] {
        &self.epochs
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    pub fn losses(&self) -> Vec<f32> {
        self.epochs.iter().map(|m| m.loss).collect()
    }

    pub fn val_losses(&self) -> Vec<f32> {
        self.epochs.iter().map(|m| m.val_loss).collect()
    }

    pub fn metrics(&self) -> Vec<f32> {
        self.epochs.iter().map(|m| m.metric).collect()
    }

    pub fn val_metrics(&self) -> Vec<f32> {
        self.epochs.iter().map(|m| m.val_metric).collect()
    }
}

/// Running sample-weighted sums for one pass.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct PassAccumulator {
    loss: f64,
    metric: f64,
    samples: usize,
}

impl PassAccumulator {
    pub fn add(&mut self, loss: f32, metric: f32, samples: usize) {
        self.loss += f64::from(loss) * samples as f64;
        self.metric += f64::from(metric) * samples as f64;
        self.samples += samples;
    }

    /// `(loss, metric)` means; zeros for an empty pass.
    pub fn means(&self) -> (f32, f32) {
        if self.samples == 0 {
            return (0.0, 0.0);
        }
        let n = self.samples as f64;
        ((self.loss / n) as f32, (self.metric / n) as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_means_are_sample_weighted() {
        let mut acc = PassAccumulator::default();
        acc.add(1.0, 0.5, 3);
        acc.add(4.0, 1.0, 1);
        let (loss, metric) = acc.means();
        assert!((loss - 1.75).abs() < 1e-6);
        assert!((metric - 0.625).abs() < 1e-6);
    }

    #[test]
    fn test_history_columns() {
        let mut history = TrainingHistory::default();
        for epoch in 1..=3 {
            history.push(EpochMetrics {
                epoch,
                loss: epoch as f32,
                val_loss: epoch as f32 * 2.0,
                metric: 0.1,
                val_metric: 0.2,
            });
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.losses(), vec![1.0, 2.0, 3.0]);
        assert_eq!(history.val_losses(), vec![2.0, 4.0, 6.0]);
        assert_eq!(history.epochs()[2].epoch, 3);
    }
}
