use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};

use crate::error::ManifestError;

const PATH_COLUMNS: &[&str] = &["c1sPaths", "filename"];
const LABEL_COLUMNS: &[&str] = &["c1xLabels", "class"];

/// Whether a manifest must carry numeric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelMode {
    Labeled,
    Unlabeled,
}

/// How to read a manifest file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManifestFormat {
    pub has_headers: bool,
    pub labels: LabelMode,
}

impl ManifestFormat {
    pub fn labeled() -> Self {
        Self {
            has_headers: true,
            labels: LabelMode::Labeled,
        }
    }

    /// Headerless, path-only tables as used for unlabeled tile classification.
    pub fn unlabeled() -> Self {
        Self {
            has_headers: false,
            labels: LabelMode::Unlabeled,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    pub filename: String,
    pub label: Option<f32>,
}

/// The rows of one dataset split, normalized to (filename, class).
#[derive(Debug, Clone)]
pub struct Manifest {
    source: PathBuf,
    entries: Vec<ManifestEntry>,
    labels: LabelMode,
}

impl Manifest {
    /// Load a manifest table.
    ///
    /// With headers, the path column is `c1sPaths` or `filename` and the label column
    /// is `c1xLabels` or `class`. Without headers, column 0 is the path and column 1
    /// the label. Every image must exist on disk.
    pub fn load(path: impl AsRef<Path>, format: ManifestFormat) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let read_err = |source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = ReaderBuilder::new()
            .has_headers(format.has_headers)
            .flexible(true)
            .trim(Trim::All)
            .from_path(path)
            .map_err(read_err)?;

        let (path_col, label_col) = if format.has_headers {
            let headers = reader.headers().map_err(read_err)?.clone();
            let path_col = find_column(&headers, PATH_COLUMNS).ok_or_else(|| {
                ManifestError::MissingColumn {
                    path: path.to_path_buf(),
                    column: "filename",
                }
            })?;
            (path_col, find_column(&headers, LABEL_COLUMNS))
        } else {
            (0, Some(1))
        };

        if format.labels == LabelMode::Labeled && label_col.is_none() {
            return Err(ManifestError::MissingColumn {
                path: path.to_path_buf(),
                column: "class",
            });
        }

        let mut entries = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let record = record.map_err(read_err)?;
            // 1-based, counting the header line when present
            let row = idx + 1 + usize::from(format.has_headers);

            let filename = match record.get(path_col) {
                Some(name) if !name.is_empty() => name.to_string(),
                _ => {
                    return Err(ManifestError::MissingColumn {
                        path: path.to_path_buf(),
                        column: "filename",
                    })
                }
            };

            let label = match format.labels {
                LabelMode::Unlabeled => None,
                LabelMode::Labeled => {
                    let raw = label_col.and_then(|col| record.get(col)).ok_or_else(|| {
                        ManifestError::MissingColumn {
                            path: path.to_path_buf(),
                            column: "class",
                        }
                    })?;
                    let value = raw.parse::<f32>().map_err(|_| ManifestError::InvalidLabel {
                        path: path.to_path_buf(),
                        row,
                        value: raw.to_string(),
                    })?;
                    Some(value)
                }
            };

            if !Path::new(&filename).is_file() {
                return Err(ManifestError::MissingImage {
                    path: path.to_path_buf(),
                    row,
                    image: PathBuf::from(filename),
                });
            }

            entries.push(ManifestEntry { filename, label });
        }

        log::info!(
            "Loaded {} entries from {} ({:?})",
            entries.len(),
            path.display(),
            format.labels
        );

        Ok(Self {
            source: path.to_path_buf(),
            entries,
            labels: format.labels,
        })
    }

    pub fn from_entries(source: impl Into<PathBuf>, entries: Vec<ManifestEntry>) -> Self {
        let labels = if entries.iter().all(|e| e.label.is_some()) {
            LabelMode::Labeled
        } else {
            LabelMode::Unlabeled
        };
        Self {
            source: source.into(),
            entries,
            labels,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_labeled(&self) -> bool {
        self.labels == LabelMode::Labeled
    }
}

fn find_column(headers: &StringRecord, names: &[&str]) -> Option<usize> {
    headers.iter().position(|h| names.contains(&h))
}
