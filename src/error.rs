use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Why a manifest could not be turned into entries.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("cannot read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("manifest {path} has no `{column}` column")]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("manifest {path}, row {row}: label `{value}` is not numeric")]
    InvalidLabel {
        path: PathBuf,
        row: usize,
        value: String,
    },

    #[error("manifest {path}, row {row}: image {image} does not exist")]
    MissingImage {
        path: PathBuf,
        row: usize,
        image: PathBuf,
    },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("the {split} split yields no batches")]
    EmptyDataset { split: &'static str },

    #[error("the {split} split carries no labels")]
    MissingLabels { split: &'static str },

    #[error("cannot decode image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("cannot load model from {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    #[error("cannot save model to {path}: {reason}")]
    ModelSave { path: PathBuf, reason: String },

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot render {path}: {reason}")]
    Plot { path: PathBuf, reason: String },

    #[error("cannot serialize {path}: {reason}")]
    Serialize { path: PathBuf, reason: String },

    #[error("invalid config {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("batch size must be at least 1")]
    InvalidBatchSize,

    #[error("tensor data: {0}")]
    Tensor(String),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Tags the error with the pipeline stage it escaped from.
    pub fn at(self, stage: Stage) -> RunError {
        RunError {
            stage,
            source: self,
        }
    }
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LoadManifest,
    BuildBatches,
    Train,
    Infer,
    WriteResults,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::LoadManifest => "load manifest",
            Stage::BuildBatches => "build batches",
            Stage::Train => "train",
            Stage::Infer => "infer",
            Stage::WriteResults => "write results",
        };
        f.write_str(name)
    }
}

/// A failed run: the stage that aborted it plus the underlying cause.
#[derive(Debug, Error)]
#[error("{stage} failed: {source}")]
pub struct RunError {
    pub stage: Stage,
    #[source]
    pub source: Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_error_names_stage_and_cause() {
        let err = Error::EmptyDataset { split: "train" }.at(Stage::Train);
        assert_eq!(err.to_string(), "train failed: the train split yields no batches");
    }

    #[test]
    fn test_manifest_error_converts() {
        let err: Error = ManifestError::MissingColumn {
            path: PathBuf::from("tiles.csv"),
            column: "class",
        }
        .into();
        assert!(matches!(err, Error::Manifest(_)));
        assert_eq!(
            err.at(Stage::LoadManifest).to_string(),
            "load manifest failed: manifest tiles.csv has no `class` column"
        );
    }
}
