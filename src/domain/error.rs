// ============================================================
// Layer 3 — Pipeline Errors
// ============================================================
// The fatal conditions the pipeline checks explicitly before
// any dataset is read. Everything else (malformed rows,
// backend failures, I/O during training) flows through
// anyhow with context attached at the call site.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Training configuration is required but not provided")]
    MissingTrainingConfig,

    #[error("Training data path is not configured (question_generation.output_path)")]
    MissingTrainingDataPath,

    #[error("Knowledgebase file not found: {}", .0.display())]
    KnowledgeBaseNotFound(PathBuf),

    #[error("Training data file not found: {}", .0.display())]
    TrainingDataNotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Metric '{0}' missing from evaluation results")]
    MissingMetric(String),
}
