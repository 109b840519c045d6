use std::path::PathBuf;

use anyhow::Context;
use burn::backend::{Autodiff, NdArray};
use clap::Parser;

use histo_transfer::data::ManifestFormat;
use histo_transfer::pipeline::{self, Experiment, InferTask, Task};
use histo_transfer::training::ExperimentConfig;

type MyBackend = Autodiff<NdArray>;

/// Apply a saved model to a test manifest.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Test manifest (CSV of image path and, unless --no-labels, label)
    test_csv: PathBuf,

    /// Directory that receives the results bundle and sample grid
    results_dir: PathBuf,

    batch_size: usize,

    /// Model directory written by `train` (holds model.bin and config.json)
    model_path: PathBuf,

    /// Experiment config (YAML); only seed and preview settings are used
    #[arg(long)]
    config: Option<PathBuf>,

    /// The manifest is a bare list of image paths; implies --no-header
    #[arg(long)]
    no_labels: bool,

    /// The manifest has no header row
    #[arg(long, conflicts_with = "header")]
    no_header: bool,

    /// The manifest has a header row even with --no-labels
    #[arg(long)]
    header: bool,
}

impl Args {
    fn manifest_format(&self) -> ManifestFormat {
        if self.no_labels {
            ManifestFormat {
                has_headers: self.header,
                ..ManifestFormat::unlabeled()
            }
        } else {
            ManifestFormat {
                has_headers: !self.no_header,
                ..ManifestFormat::labeled()
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    anyhow::ensure!(args.batch_size > 0, "batch_size must be positive");

    let config = match &args.config {
        Some(path) => ExperimentConfig::from_yaml(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ExperimentConfig::default(),
    };
    let format = args.manifest_format();

    println!("Inference");
    println!("  Test: {}", args.test_csv.display());
    println!("  Model: {}", args.model_path.display());
    println!("  Results: {}", args.results_dir.display());

    config.run.apply::<MyBackend>();
    let experiment = Experiment {
        task: Task::Infer(InferTask {
            test_manifest: args.test_csv,
            model_dir: args.model_path,
            format,
        }),
        results_dir: args.results_dir,
        batch_size: args.batch_size,
        config,
    };

    let summary = pipeline::run::<MyBackend>(&experiment, &Default::default())?;
    println!(
        "Done: {} predictions written to {}",
        summary.predictions.len(),
        summary.results_dir.display()
    );
    Ok(())
}
