pub mod config;
pub mod early_stopping;
pub mod metrics;
pub mod state;
pub mod trainer;

pub use config::{ExperimentConfig, RunConfig};
pub use early_stopping::{EarlyStopping, EarlyStoppingConfig, Monitor};
pub use metrics::{EpochMetrics, TrainingHistory};
pub use state::{StopReason, TrainingPhase, TrainingState};
pub use trainer::{fit_epochs, EpochRunner, FitOutcome, TrainedModel, Trainer};
