// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `evaluate`.
//
// Most settings live in the YAML pipeline config; the flags
// here only override the handful of values that are commonly
// changed between runs.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::config::TrainingOverrides;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fine-tune the embedding model and compare before/after metrics
    Train(TrainArgs),

    /// Score a saved model on the held-out queries
    Evaluate(EvaluateArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Pipeline configuration file (YAML)
    #[arg(long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Number of full passes through the training pairs
    #[arg(long)]
    pub epochs: Option<usize>,

    /// Pairs per batch; also the number of in-batch negatives + 1
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Peak learning rate after warm-up
    #[arg(long)]
    pub lr: Option<f64>,

    /// Where checkpoints, logs, and the final model are written
    #[arg(long)]
    pub output_path: Option<PathBuf>,

    /// Seed for the train/test split and batch order
    #[arg(long)]
    pub seed: Option<u64>,
}

/// The application layer never sees clap types.
impl From<&TrainArgs> for TrainingOverrides {
    fn from(a: &TrainArgs) -> Self {
        TrainingOverrides {
            epochs:        a.epochs,
            batch_size:    a.batch_size,
            learning_rate: a.lr,
            output_path:   a.output_path.clone(),
            seed:          a.seed,
        }
    }
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Pipeline configuration file (YAML)
    #[arg(long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Model directory to score (defaults to training.output_path)
    #[arg(long)]
    pub model: Option<PathBuf>,
}
