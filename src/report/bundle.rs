use std::path::Path;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::inference::PredictionSet;

pub(crate) fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| Error::Serialize {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    std::fs::write(path, json).map_err(|e| Error::io(path, e))
}

/// One row per prediction: `filename,truth,confidence`. `truth` is blank when unlabeled.
pub(crate) fn write_predictions_csv(path: &Path, predictions: &PredictionSet) -> Result<()> {
    let csv_err = |e: csv::Error| Error::Serialize {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer
        .write_record(["filename", "truth", "confidence"])
        .map_err(csv_err)?;

    for (i, (filename, confidence)) in predictions
        .filenames
        .iter()
        .zip(&predictions.confidences)
        .enumerate()
    {
        let truth = predictions
            .truth
            .as_ref()
            .and_then(|truth| truth.get(i))
            .map(|t| t.to_string())
            .unwrap_or_default();
        let confidence = confidence.to_string();
        writer
            .write_record([filename.as_str(), truth.as_str(), confidence.as_str()])
            .map_err(csv_err)?;
    }

    writer.flush().map_err(|e| Error::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_rows_mirror_the_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictions.csv");
        let set = PredictionSet {
            filenames: vec!["a.png".into(), "b.png".into()],
            truth: Some(vec![1.0, 0.0]),
            confidences: vec![0.75, 0.25],
        };

        write_predictions_csv(&path, &set).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "filename,truth,confidence\na.png,1,0.75\nb.png,0,0.25\n"
        );
    }

    #[test]
    fn test_csv_unlabeled_truth_is_blank() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictions.csv");
        let set = PredictionSet {
            filenames: vec!["a.png".into()],
            truth: None,
            confidences: vec![0.5],
        };

        write_predictions_csv(&path, &set).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "filename,truth,confidence\na.png,,0.5\n");
    }

    #[test]
    fn test_json_bundle_has_parallel_arrays() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        let set = PredictionSet {
            filenames: vec!["a.png".into()],
            truth: None,
            confidences: vec![0.5],
        };

        write_json(&path, &set).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["filenames"][0], "a.png");
        assert!(value["truth"].is_null());
        assert_eq!(value["confidences"][0], 0.5);
    }
}
