// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, built on clap.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train`    — baseline eval, fine-tune, re-eval, report
//   2. `evaluate` — score a saved model directory
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvaluateArgs, TrainArgs};

use crate::application::config::{PipelineConfig, TrainingOverrides};

#[derive(Parser, Debug)]
#[command(
    name = "embed-finetune",
    version,
    about = "Fine-tune a sentence-embedding model for knowledge-base retrieval."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case.
    pub fn run(self) -> Result<()> {
        match &self.command {
            Commands::Train(args)    => run_train(args),
            Commands::Evaluate(args) => run_evaluate(args),
        }
    }
}

fn run_train(args: &TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    let mut config = PipelineConfig::from_yaml_file(&args.config)?;
    if let Some(training) = config.training.as_mut() {
        TrainingOverrides::from(args).apply(training);
    }
    tracing::info!("Starting fine-tuning with config '{}'", args.config.display());

    let summary = TrainUseCase::new(config).execute()?;

    match (summary.best_epoch, summary.best_score) {
        (Some(epoch), Some(score)) => println!(
            "Training complete. Best epoch {epoch} (score {score:.4}); model saved to '{}'.",
            summary.model_dir.display()
        ),
        _ => println!("Training complete. Model saved to '{}'.", summary.model_dir.display()),
    }
    println!(
        "sequential_score: {:.4} -> {:.4}",
        summary.before.sequential_score()?,
        summary.after.sequential_score()?,
    );
    if summary.published {
        println!("Model pushed to the hub.");
    }
    Ok(())
}

fn run_evaluate(args: &EvaluateArgs) -> Result<()> {
    use crate::application::evaluate_use_case::EvaluateUseCase;

    let config = PipelineConfig::from_yaml_file(&args.config)?;
    EvaluateUseCase::new(config, args.model.clone()).execute()?;
    Ok(())
}
