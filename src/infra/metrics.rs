// ============================================================
// Layer 6 — Training Log
// ============================================================
// Records one CSV row per training epoch:
//
//   epoch,train_loss,eval_score,learning_rate
//   1,4.812300,0.412000,0.000180
//   2,3.207100,0.488500,0.000110
//
// eval_score is the configured metric_for_best_model (e.g.
// dim_128_cosine_ndcg@10) measured on the held-out queries
// at the end of the epoch. Higher is better.
//
// Output file: {output_path}/training_log.csv

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};
use serde::{Deserialize, Serialize};

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:         usize,
    /// Mean Matryoshka loss over the epoch's batches
    pub train_loss:    f64,
    /// Value of metric_for_best_model after this epoch
    pub eval_score:    f64,
    /// Learning rate at the last optimizer step of the epoch
    pub learning_rate: f64,
}

impl EpochMetrics {
    pub fn new(
        epoch:         usize,
        train_loss:    f64,
        eval_score:    f64,
        learning_rate: f64,
    ) -> Self {
        Self { epoch, train_loss, eval_score, learning_rate }
    }

    /// Returns true if this epoch beats the best eval score so far
    pub fn is_improvement(&self, best_eval_score: Option<f64>) -> bool {
        best_eval_score.map_or(true, |best| self.eval_score > best)
    }
}

/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create a new MetricsLogger, starting a fresh CSV file.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let csv_path = dir.join("training_log.csv");
        let mut f = fs::File::create(&csv_path)
            .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
        writeln!(f, "epoch,train_loss,eval_score,learning_rate")?;
        tracing::debug!("Created training log: '{}'", csv_path.display());

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new row in the CSV.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6}",
            m.epoch,
            m.train_loss,
            m.eval_score,
            m.learning_rate,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, eval_score={:.4}",
            m.epoch,
            m.train_loss,
            m.eval_score,
        );

        Ok(())
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}
