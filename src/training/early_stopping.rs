use serde::{Deserialize, Serialize};

use crate::training::metrics::EpochMetrics;

/// Which epoch loss early stopping watches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Monitor {
    Loss,
    #[default]
    ValLoss,
}

impl Monitor {
    pub fn read(&self, metrics: &EpochMetrics) -> f32 {
        match self {
            Monitor::Loss => metrics.loss,
            Monitor::ValLoss => metrics.val_loss,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EarlyStoppingConfig {
    pub patience: usize,
    pub min_delta: f32,
    pub monitor: Monitor,
}

impl Default for EarlyStoppingConfig {
    fn default() -> Self {
        Self {
            patience: 3,
            min_delta: 0.0,
            monitor: Monitor::ValLoss,
        }
    }
}

impl EarlyStoppingConfig {
    pub fn init(&self) -> EarlyStopping {
        EarlyStopping::new(self.patience, self.min_delta, self.monitor)
    }
}

#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    min_delta: f32,
    monitor: Monitor,
    best_loss: f32,
    counter: usize,
    stopped: bool,
}

impl EarlyStopping {
    pub fn new(patience: usize, min_delta: f32, monitor: Monitor) -> Self {
        Self {
            patience,
            min_delta,
            monitor,
            best_loss: f32::INFINITY,
            counter: 0,
            stopped: false,
        }
    }

    pub fn best_loss(&self) -> f32 {
        self.best_loss
    }

    /// Record one finished epoch; `true` once patience is exhausted.
    pub fn should_stop(&mut self, metrics: &EpochMetrics) -> bool {
        if self.stopped {
            return true;
        }

        let current = self.monitor.read(metrics);
        if current < self.best_loss - self.min_delta {
            self.best_loss = current;
            self.counter = 0;
            return false;
        }

        self.counter += 1;
        if self.counter >= self.patience {
            self.stopped = true;
            log::info!(
                "Early stopping: {:?} has not improved for {} epochs (best {:.5})",
                self.monitor,
                self.patience,
                self.best_loss
            );
        }
        self.stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epoch(epoch: usize, loss: f32, val_loss: f32) -> EpochMetrics {
        EpochMetrics {
            epoch,
            loss,
            val_loss,
            metric: 0.0,
            val_metric: 0.0,
        }
    }

    #[test]
    fn test_stops_after_patience_epochs_without_improvement() {
        let mut stopping = EarlyStoppingConfig::default().init();
        let val = [1.0, 0.8, 0.6, 0.5, 0.55, 0.5, 0.7];

        let stops: Vec<bool> = val
            .iter()
            .enumerate()
            .map(|(i, &v)| stopping.should_stop(&epoch(i + 1, 0.0, v)))
            .collect();

        assert_eq!(stops, vec![false, false, false, false, false, false, true]);
        assert_eq!(stopping.best_loss(), 0.5);
    }

    #[test]
    fn test_min_delta_requires_a_real_improvement() {
        let mut stopping = EarlyStopping::new(2, 0.1, Monitor::ValLoss);
        assert!(!stopping.should_stop(&epoch(1, 0.0, 1.0)));
        assert!(!stopping.should_stop(&epoch(2, 0.0, 0.95)));
        assert!(stopping.should_stop(&epoch(3, 0.0, 0.92)));
    }

    #[test]
    fn test_monitor_training_loss() {
        let mut stopping = EarlyStopping::new(1, 0.0, Monitor::Loss);
        assert!(!stopping.should_stop(&epoch(1, 1.0, 5.0)));
        assert!(!stopping.should_stop(&epoch(2, 0.5, 9.0)));
        assert!(stopping.should_stop(&epoch(3, 0.7, 0.1)));
    }

    #[test]
    fn test_monitor_serde_names() {
        let config: EarlyStoppingConfig = serde_yaml::from_str("monitor: loss").unwrap();
        assert_eq!(config.monitor, Monitor::Loss);
        assert_eq!(config.patience, 3);
    }
}
