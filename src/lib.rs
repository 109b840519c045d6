pub mod data;
pub mod error;
pub mod inference;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod training;

#[cfg(test)]
mod test_support;

// Re-exports for convenience
pub use data::{BatchSource, Manifest, ManifestFormat};
pub use error::{Error, ManifestError, Result, RunError, Stage};
pub use inference::{predict, PredictionSet};
pub use model::{build_adapted_model, AdaptedModel, BackboneConfig, BackboneSource, TaskHead};
pub use pipeline::{run, Experiment, Task};
pub use training::{ExperimentConfig, RunConfig, Trainer};
