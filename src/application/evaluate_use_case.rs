// ============================================================
// Layer 2 — Evaluate Use Case
// ============================================================
// Scores an already saved model without training it:
//
//   1. Same preflight checks as `train`
//   2. Load and split the QA rows (same seed → same test set)
//   3. Load the model directory (defaults to output_path)
//   4. Run the retrieval evaluator and print the table

use anyhow::{bail, Result};
use std::path::PathBuf;

use crate::application::config::PipelineConfig;
use crate::application::train_use_case::{evaluate_model, preflight, prepare_data};
use crate::data::splitter::pipeline_rng;
use crate::evaluation::evaluator::{MetricsReport, RetrievalEvaluator};
use crate::infra::{checkpoint::ModelDirectory, report::metrics_table};
use crate::ml::{default_device, InferBackend};

pub struct EvaluateUseCase {
    config:    PipelineConfig,
    model_dir: Option<PathBuf>,
}

impl EvaluateUseCase {
    pub fn new(config: PipelineConfig, model_dir: Option<PathBuf>) -> Self {
        Self { config, model_dir }
    }

    pub fn execute(&self) -> Result<MetricsReport> {
        let inputs = preflight(&self.config)?;
        let cfg    = &inputs.training;

        let model_dir = ModelDirectory::new(
            self.model_dir.clone().unwrap_or_else(|| cfg.output_path.clone()),
        );
        if !model_dir.holds_model() {
            bail!(
                "No saved model in '{}'. Have you run 'train' first?",
                model_dir.path().display()
            );
        }
        if cfg.seed.is_none() {
            tracing::warn!("No training.seed set; the test split will differ from the training run");
        }

        let data      = prepare_data(&inputs, &mut pipeline_rng(cfg.seed))?;
        let evaluator = RetrievalEvaluator::new(data.evaluation, cfg.matryoshka_dimensions.clone());

        let device = default_device();
        let saved  = model_dir.load::<InferBackend>(&device)?;
        cfg.check_dims_fit(saved.config.d_model)?;
        let report = evaluate_model(
            saved.model,
            &saved.tokenizer,
            saved.config.max_seq_len,
            cfg.batch_size,
            &evaluator,
            &device,
        )?;

        println!(
            "{}",
            metrics_table(
                &format!("Evaluation of '{}'", model_dir.path().display()),
                &report,
                evaluator.dims(),
            )?
        );
        Ok(report)
    }
}
