pub mod conv;

pub use conv::{ConvStage, ConvStageRecord};
