//! One entry point for every experiment kind.
//!
//! A run loads its manifests before touching the filesystem, keeps preview tiles and
//! predictions in memory, and writes everything except the trained model in a final
//! `write results` stage, so a failed run leaves no partial bundle behind.

use std::path::PathBuf;

use burn::module::AutodiffModule;
use burn::optim::AdamConfig;
use burn::tensor::backend::AutodiffBackend;
use image::RgbImage;

use crate::data::{BatchConfig, BatchSource, Manifest, ManifestFormat};
use crate::error::{Error, RunError, Stage};
use crate::inference::{self, PredictionSet};
use crate::model::{build_adapted_model, store, AdaptedModel, AdaptedModelConfig};
use crate::report::ResultWriter;
use crate::training::{ExperimentConfig, StopReason, Trainer, TrainingHistory};

#[derive(Debug, Clone)]
pub struct TrainTask {
    pub train_manifest: PathBuf,
    pub val_manifest: PathBuf,
    pub epochs: usize,
    pub learning_rate: f64,
    pub experiment_name: String,
}

#[derive(Debug, Clone)]
pub struct InferTask {
    pub test_manifest: PathBuf,
    pub model_dir: PathBuf,
    pub format: ManifestFormat,
}

#[derive(Debug, Clone)]
pub enum Task {
    /// Fit a new head on a pretrained backbone, then predict on the validation split.
    Train(TrainTask),
    /// Predict with a model saved by an earlier training run.
    Infer(InferTask),
}

#[derive(Debug, Clone)]
pub struct Experiment {
    pub task: Task,
    pub results_dir: PathBuf,
    pub batch_size: usize,
    pub config: ExperimentConfig,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub results_dir: PathBuf,
    pub predictions: PredictionSet,
    /// Present for training runs.
    pub history: Option<TrainingHistory>,
    pub stop_reason: Option<StopReason>,
    pub artifacts: Vec<PathBuf>,
}

/// Run one experiment to completion.
///
/// The backend must already be seeded (see [`crate::training::RunConfig::apply`]).
pub fn run<B: AutodiffBackend>(
    experiment: &Experiment,
    device: &B::Device,
) -> Result<RunSummary, RunError> {
    match &experiment.task {
        Task::Train(task) => run_training::<B>(experiment, task, device),
        Task::Infer(task) => run_inference::<B::InnerBackend>(experiment, task, device),
    }
}

fn run_training<B: AutodiffBackend>(
    experiment: &Experiment,
    task: &TrainTask,
    device: &B::Device,
) -> Result<RunSummary, RunError> {
    let config = &experiment.config;
    log::info!(
        "Experiment `{}`: training on {}, validating on {}",
        task.experiment_name,
        task.train_manifest.display(),
        task.val_manifest.display()
    );

    let load = |path: &PathBuf| {
        Manifest::load(path, ManifestFormat::labeled())
            .map_err(|e| Error::from(e).at(Stage::LoadManifest))
    };
    let train_manifest = load(&task.train_manifest)?;
    let val_manifest = load(&task.val_manifest)?;

    let (backbone_config, backbone) = config
        .backbone
        .load::<B>(device)
        .map_err(|e| e.at(Stage::Train))?;

    let batch_config = BatchConfig {
        image_size: backbone_config.image_size,
        batch_size: experiment.batch_size,
    };
    let mut train = BatchSource::training(
        &train_manifest,
        batch_config,
        config.augmentation.clone(),
        config.run.seed,
    )
    .map_err(|e| e.at(Stage::BuildBatches))?;
    let mut valid =
        BatchSource::evaluation(&val_manifest, batch_config).map_err(|e| e.at(Stage::BuildBatches))?;
    let train_preview = preview(&train, config.preview_tiles)?;
    let valid_preview = preview(&valid, config.preview_tiles)?;

    let model_config = AdaptedModelConfig {
        backbone: backbone_config,
        head: config.head,
    };
    let model = build_adapted_model(backbone, config.head, device);
    log::info!("{}", model.summary());
    let optimizer = AdamConfig::new().init::<B, AdaptedModel<B>>();
    let trained = Trainer::new(model, optimizer, config.head, task.learning_rate, device.clone())
        .fit(
            &mut train,
            &mut valid,
            task.epochs,
            config.early_stopping.map(|stopping| stopping.init()),
        )
        .map_err(|e| e.at(Stage::Train))?;

    let writer = ResultWriter::create(&experiment.results_dir).map_err(|e| e.at(Stage::Train))?;
    let model = trained.model.valid();
    store::save_model(model.clone(), &model_config, &writer.model_dir())
        .map_err(|e| e.at(Stage::Train))?;

    let predictions = inference::predict(&model, &mut valid, config.head, device)
        .map_err(|e| e.at(Stage::Infer))?;

    let mut artifacts = vec![writer.model_dir()];
    let write = || -> crate::error::Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        written.extend(writer.write_sample_grid("train_images.png", &train_preview)?);
        written.extend(writer.write_sample_grid("validation_images.png", &valid_preview)?);
        if config.plots {
            written.extend(writer.write_history_plots(
                &trained.history,
                config.head,
                &task.experiment_name,
            )?);
        }
        written.push(writer.write_bundle(&predictions)?);
        written.push(writer.write_history(&trained.history)?);
        written.push(writer.write_config(config)?);
        Ok(written)
    };
    artifacts.extend(write().map_err(|e| e.at(Stage::WriteResults))?);

    log::info!(
        "Experiment `{}` finished; results in {}",
        task.experiment_name,
        experiment.results_dir.display()
    );
    Ok(RunSummary {
        results_dir: experiment.results_dir.clone(),
        predictions,
        history: Some(trained.history),
        stop_reason: Some(trained.stop_reason),
        artifacts,
    })
}

fn run_inference<B: burn::prelude::Backend>(
    experiment: &Experiment,
    task: &InferTask,
    device: &B::Device,
) -> Result<RunSummary, RunError> {
    let config = &experiment.config;
    log::info!(
        "Inference on {} with model {}",
        task.test_manifest.display(),
        task.model_dir.display()
    );

    let manifest = Manifest::load(&task.test_manifest, task.format)
        .map_err(|e| Error::from(e).at(Stage::LoadManifest))?;

    let (model_config, model) =
        store::load_model::<B>(&task.model_dir, device).map_err(|e| e.at(Stage::Infer))?;

    let mut test = BatchSource::evaluation(
        &manifest,
        BatchConfig {
            image_size: model_config.backbone.image_size,
            batch_size: experiment.batch_size,
        },
    )
    .map_err(|e| e.at(Stage::BuildBatches))?;
    let test_preview = preview(&test, config.preview_tiles)?;

    let predictions = inference::predict(&model, &mut test, model_config.head, device)
        .map_err(|e| e.at(Stage::Infer))?;

    let write = || -> crate::error::Result<Vec<PathBuf>> {
        let writer = ResultWriter::create(&experiment.results_dir)?;
        let mut written = Vec::new();
        written.extend(writer.write_sample_grid("test_images.png", &test_preview)?);
        written.push(writer.write_bundle(&predictions)?);
        written.push(writer.write_config(config)?);
        Ok(written)
    };
    let artifacts = write().map_err(|e| e.at(Stage::WriteResults))?;

    Ok(RunSummary {
        results_dir: experiment.results_dir.clone(),
        predictions,
        history: None,
        stop_reason: None,
        artifacts,
    })
}

fn preview(source: &BatchSource, count: usize) -> Result<Vec<RgbImage>, RunError> {
    source.preview(count).map_err(|e| e.at(Stage::BuildBatches))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::AugmentationConfig;
    use crate::model::{BackboneSource, TaskHead};
    use crate::test_support::{tiny_backbone, write_manifest_csv, TestAutodiffBackend};
    use crate::training::{EarlyStoppingConfig, RunConfig};

    type B = TestAutodiffBackend;

    fn config(head: TaskHead) -> ExperimentConfig {
        ExperimentConfig {
            run: RunConfig { seed: 123 },
            backbone: BackboneSource::Initialized(tiny_backbone()),
            head,
            augmentation: AugmentationConfig::default(),
            early_stopping: Some(EarlyStoppingConfig::default()),
            preview_tiles: 4,
            plots: false,
        }
    }

    fn train_experiment(root: &std::path::Path, head: TaskHead) -> Experiment {
        let train = write_manifest_csv(root, "train", &[0.0, 1.0, 0.0, 1.0]);
        let val = write_manifest_csv(root, "val", &[1.0, 0.0, 1.0]);
        Experiment {
            task: Task::Train(TrainTask {
                train_manifest: train,
                val_manifest: val,
                epochs: 2,
                learning_rate: 1e-3,
                experiment_name: "smoke".into(),
            }),
            results_dir: root.join("results"),
            batch_size: 2,
            config: config(head),
        }
    }

    #[test]
    fn test_training_run_writes_every_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let mut experiment = train_experiment(dir.path(), TaskHead::Regression);
        experiment.config.plots = true;

        let summary = run::<B>(&experiment, &Default::default()).unwrap();

        let results = dir.path().join("results");
        for name in [
            "model/model.bin",
            "model/config.json",
            "results.json",
            "predictions.csv",
            "history.json",
            "experiment.yaml",
            "train_images.png",
            "validation_images.png",
            "loss_history.png",
            "mae_history.png",
        ] {
            assert!(results.join(name).is_file(), "missing {name}");
        }
        assert_eq!(summary.predictions.len(), 3);
        assert_eq!(summary.predictions.truth, Some(vec![1.0, 0.0, 1.0]));
        assert_eq!(summary.history.unwrap().len(), 2);
    }

    #[test]
    fn test_saved_model_feeds_an_inference_run() {
        let dir = tempfile::tempdir().unwrap();
        let experiment = train_experiment(dir.path(), TaskHead::Classification);
        let trained = run::<B>(&experiment, &Default::default()).unwrap();

        let Task::Train(train_task) = &experiment.task else {
            unreachable!()
        };
        let infer = Experiment {
            task: Task::Infer(InferTask {
                test_manifest: train_task.val_manifest.clone(),
                model_dir: dir.path().join("results").join("model"),
                format: ManifestFormat::labeled(),
            }),
            results_dir: dir.path().join("inference"),
            batch_size: 3,
            config: config(TaskHead::Regression),
        };
        let summary = run::<B>(&infer, &Default::default()).unwrap();

        // The stored head wins over the run config.
        for (a, b) in trained
            .predictions
            .confidences
            .iter()
            .zip(&summary.predictions.confidences)
        {
            assert!((a - b).abs() < 1e-5);
        }
        assert!(dir.path().join("inference/test_images.png").is_file());
        assert!(dir.path().join("inference/results.json").is_file());
        assert!(!dir.path().join("inference/model").exists());
    }

    #[test]
    fn test_missing_label_column_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut experiment = train_experiment(dir.path(), TaskHead::Regression);
        let broken = dir.path().join("broken.csv");
        std::fs::write(&broken, "c1sPaths,other\nx.png,1\n").unwrap();
        if let Task::Train(task) = &mut experiment.task {
            task.train_manifest = broken;
        }

        let err = run::<B>(&experiment, &Default::default()).unwrap_err();
        assert_eq!(err.stage, Stage::LoadManifest);
        assert!(matches!(err.source, Error::Manifest(_)));
        assert!(!dir.path().join("results").exists());
    }

    #[test]
    fn test_zero_batch_size_fails_before_training() {
        let dir = tempfile::tempdir().unwrap();
        let mut experiment = train_experiment(dir.path(), TaskHead::Regression);
        experiment.batch_size = 0;

        let err = run::<B>(&experiment, &Default::default()).unwrap_err();
        assert_eq!(err.stage, Stage::BuildBatches);
        assert!(matches!(err.source, Error::InvalidBatchSize));
        assert!(!dir.path().join("results").exists());
    }

    #[test]
    fn test_missing_model_fails_in_infer_stage() {
        let dir = tempfile::tempdir().unwrap();
        let test = write_manifest_csv(dir.path(), "test", &[1.0]);
        let experiment = Experiment {
            task: Task::Infer(InferTask {
                test_manifest: test,
                model_dir: dir.path().join("no_model"),
                format: ManifestFormat::labeled(),
            }),
            results_dir: dir.path().join("results"),
            batch_size: 1,
            config: config(TaskHead::Regression),
        };

        let err = run::<B>(&experiment, &Default::default()).unwrap_err();
        assert_eq!(err.stage, Stage::Infer);
        assert!(matches!(err.source, Error::ModelLoad { .. }));
        assert!(!dir.path().join("results").exists());
    }
}
