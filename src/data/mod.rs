pub mod batch;
pub mod manifest;
pub mod preprocessing;
pub mod transforms;

pub use batch::{BatchConfig, BatchSource, ImageBatch};
pub use manifest::{LabelMode, Manifest, ManifestEntry, ManifestFormat};
pub use transforms::{AugmentationConfig, DataAugmentation, TransformParams};
