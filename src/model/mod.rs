pub mod adapted;
pub mod backbone;
pub mod blocks;
pub mod head;
pub mod loss;
pub mod store;

pub use adapted::{build_adapted_model, AdaptedModel, AdaptedModelConfig};
pub use backbone::{Backbone, BackboneConfig, BackboneSource};
pub use head::TaskHead;
