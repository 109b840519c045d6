use std::path::PathBuf;

use anyhow::Context;
use burn::backend::{Autodiff, NdArray};
use clap::{Parser, ValueEnum};

use histo_transfer::model::{BackboneSource, TaskHead};
use histo_transfer::pipeline::{self, Experiment, Task, TrainTask};
use histo_transfer::training::ExperimentConfig;

type MyBackend = Autodiff<NdArray>;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TaskArg {
    Regression,
    Classification,
}

impl From<TaskArg> for TaskHead {
    fn from(task: TaskArg) -> Self {
        match task {
            TaskArg::Regression => TaskHead::Regression,
            TaskArg::Classification => TaskHead::Classification,
        }
    }
}

/// Fine-tune a new output head on a frozen pretrained backbone.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Training manifest (CSV of image path and label)
    train_csv: PathBuf,

    /// Validation manifest; also used for the final predictions
    val_csv: PathBuf,

    /// Directory that receives the model, plots and results bundle
    results_dir: PathBuf,

    epochs: usize,

    learning_rate: f64,

    batch_size: usize,

    /// Name shown in plot titles
    experiment_name: String,

    /// Experiment config (YAML); defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pretrained backbone directory (overrides the config)
    #[arg(long)]
    backbone: Option<PathBuf>,

    /// Output head (overrides the config)
    #[arg(long, value_enum)]
    task: Option<TaskArg>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    anyhow::ensure!(args.batch_size > 0, "batch_size must be positive");

    let mut config = match &args.config {
        Some(path) => ExperimentConfig::from_yaml(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ExperimentConfig::default(),
    };
    if let Some(dir) = args.backbone {
        config.backbone = BackboneSource::Pretrained(dir);
    }
    if let Some(task) = args.task {
        config.head = task.into();
    }

    println!("Transfer learning: {}", args.experiment_name);
    println!("  Train: {}", args.train_csv.display());
    println!("  Validation: {}", args.val_csv.display());
    println!("  Results: {}", args.results_dir.display());
    println!(
        "  Epochs: {}, learning rate: {}, batch size: {}, head: {:?}",
        args.epochs, args.learning_rate, args.batch_size, config.head
    );

    config.run.apply::<MyBackend>();
    let experiment = Experiment {
        task: Task::Train(TrainTask {
            train_manifest: args.train_csv,
            val_manifest: args.val_csv,
            epochs: args.epochs,
            learning_rate: args.learning_rate,
            experiment_name: args.experiment_name,
        }),
        results_dir: args.results_dir,
        batch_size: args.batch_size,
        config,
    };

    let summary = pipeline::run::<MyBackend>(&experiment, &Default::default())?;
    println!(
        "Done: {} epochs ({:?}), {} predictions written to {}",
        summary.history.map(|h| h.len()).unwrap_or(0),
        summary.stop_reason,
        summary.predictions.len(),
        summary.results_dir.display()
    );
    Ok(())
}
