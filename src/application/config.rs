// ============================================================
// Layer 2 — Pipeline Configuration
// ============================================================
// The YAML file shared with the rest of the data pipeline.
// Only three sections matter here; anything else in the file
// is ignored:
//
//   chunker_config:
//     output_path: data/kb.json          ← the KB corpus
//   question_generation:
//     output_path: data/train.jsonl      ← anchor/positive rows
//   training:
//     model_id: models/base
//     output_path: models/finetuned
//     epochs: 4
//     matryoshka_dimensions: [256, 128, 64, 32]
//     ...
//
// Every training field has a default (see Default impls), so a
// `training:` section can be as small as `{}`.
//
// Reference: Rust Book §5 (Structs), serde_yaml docs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};

use crate::domain::error::PipelineError;
use crate::evaluation::evaluator::{known_metric_keys, resolve_metric_name};
use crate::ml::{model::EncoderConfig, trainer::TrainerSettings};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub chunker_config:      ChunkerConfig,
    #[serde(default)]
    pub question_generation: Option<QuestionGenerationConfig>,
    #[serde(default)]
    pub training:            Option<TrainingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Knowledge-base JSON written by the chunker
    pub output_path: PathBuf,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self { output_path: PathBuf::from("data/kb.json") }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionGenerationConfig {
    /// Anchor/positive JSONL written by question generation
    pub output_path: Option<PathBuf>,
}

// ─── Training Configuration ──────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Directory of the base model; a fresh encoder is used if it holds none
    pub model_id:                    PathBuf,
    pub output_path:                 PathBuf,
    pub epochs:                      usize,
    pub learning_rate:               f64,
    pub batch_size:                  usize,
    pub gradient_accumulation_steps: usize,
    pub warmup_ratio:                f64,
    pub matryoshka_dimensions:       Vec<usize>,
    pub metric_for_best_model:       String,
    pub save_total_limit:            usize,
    pub logging_steps:               usize,
    pub test_size:                   f64,
    pub seed:                        Option<u64>,
    pub push_to_hub:                 bool,
    pub hub_model_id:                Option<String>,
    pub hub_private:                 bool,
    /// Upper bound on the word vocabulary built when no base model exists
    pub tokenizer_vocab_size:        usize,
    pub encoder:                     EncoderSettings,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            model_id:                    PathBuf::from("models/base"),
            output_path:                 PathBuf::from("models/finetuned"),
            epochs:                      4,
            learning_rate:               2e-4,
            batch_size:                  32,
            gradient_accumulation_steps: 1,
            warmup_ratio:                0.1,
            matryoshka_dimensions:       vec![256, 128, 64, 32],
            metric_for_best_model:       "eval_dim_128_cosine_ndcg@10".to_string(),
            save_total_limit:            3,
            logging_steps:               10,
            test_size:                   0.1,
            seed:                        None,
            push_to_hub:                 false,
            hub_model_id:                None,
            hub_private:                 false,
            tokenizer_vocab_size:        30522,
            encoder:                     EncoderSettings::default(),
        }
    }
}

/// Architecture used when no base model is found.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderSettings {
    pub max_seq_len: usize,
    pub d_model:     usize,
    pub num_heads:   usize,
    pub num_layers:  usize,
    pub d_ff:        usize,
    pub dropout:     f64,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            max_seq_len: 128,
            d_model:     256,
            num_heads:   4,
            num_layers:  4,
            d_ff:        1024,
            dropout:     0.1,
        }
    }
}

impl PipelineConfig {
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file '{}'", path.display()))?;
        Self::from_yaml_str(&text)
            .with_context(|| format!("Invalid YAML in '{}'", path.display()))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// The configured training file, if there is one.
    pub fn training_data_path(&self) -> Option<&Path> {
        self.question_generation
            .as_ref()
            .and_then(|q| q.output_path.as_deref())
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |msg: String| -> Result<(), PipelineError> { Err(PipelineError::InvalidConfig(msg)) };
        let dims = &self.matryoshka_dimensions;
        let d_model = self.encoder.d_model;

        if dims.is_empty() {
            return invalid("matryoshka_dimensions must not be empty".into());
        }
        if dims.contains(&0) {
            return invalid("matryoshka dimensions must be at least 1".into());
        }
        if self.batch_size == 0 {
            return invalid("batch_size must be at least 1".into());
        }
        if self.epochs == 0 {
            return invalid("epochs must be at least 1".into());
        }
        if self.gradient_accumulation_steps == 0 {
            return invalid("gradient_accumulation_steps must be at least 1".into());
        }
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return invalid(format!("test_size {} must be in (0, 1)", self.test_size));
        }
        if self.encoder.max_seq_len < 2 {
            return invalid(format!(
                "encoder.max_seq_len {} cannot hold [CLS] and [SEP]",
                self.encoder.max_seq_len,
            ));
        }
        if self.encoder.num_heads == 0 || d_model % self.encoder.num_heads != 0 {
            return invalid(format!(
                "encoder.d_model {d_model} is not divisible by encoder.num_heads {}",
                self.encoder.num_heads,
            ));
        }
        let metric = resolve_metric_name(&self.metric_for_best_model);
        if !known_metric_keys(dims).iter().any(|k| k == metric) {
            return invalid(format!("unknown metric_for_best_model '{}'", self.metric_for_best_model));
        }
        Ok(())
    }

    /// Every Matryoshka dimension must fit the width of the model in use,
    /// which is only known once the base model is loaded or built.
    pub fn check_dims_fit(&self, width: usize) -> Result<(), PipelineError> {
        match self.matryoshka_dimensions.iter().find(|&&d| d > width) {
            Some(bad) => Err(PipelineError::InvalidConfig(format!(
                "matryoshka dimension {bad} is wider than the model ({width})"
            ))),
            None => Ok(()),
        }
    }

    /// Architecture for a fresh encoder over a vocabulary of `vocab_size` ids.
    pub fn encoder_config(&self, vocab_size: usize) -> EncoderConfig {
        let e = &self.encoder;
        EncoderConfig::new(vocab_size)
            .with_max_seq_len(e.max_seq_len)
            .with_d_model(e.d_model)
            .with_num_heads(e.num_heads)
            .with_num_layers(e.num_layers)
            .with_d_ff(e.d_ff)
            .with_dropout(e.dropout)
    }

    /// Trainer hyperparameters; `max_seq_len` comes from the loaded model.
    pub fn trainer_settings(&self, max_seq_len: usize) -> TrainerSettings {
        TrainerSettings {
            epochs:                      self.epochs,
            learning_rate:               self.learning_rate,
            batch_size:                  self.batch_size,
            gradient_accumulation_steps: self.gradient_accumulation_steps,
            warmup_ratio:                self.warmup_ratio,
            matryoshka_dims:             self.matryoshka_dimensions.clone(),
            metric_for_best_model:       self.metric_for_best_model.clone(),
            save_total_limit:            self.save_total_limit,
            logging_steps:               self.logging_steps,
            max_seq_len,
        }
    }
}

// ─── CLI Overrides ────────────────────────────────────────────────────────────
/// Values given on the command line win over the YAML file.
#[derive(Debug, Clone, Default)]
pub struct TrainingOverrides {
    pub epochs:        Option<usize>,
    pub batch_size:    Option<usize>,
    pub learning_rate: Option<f64>,
    pub output_path:   Option<PathBuf>,
    pub seed:          Option<u64>,
}

impl TrainingOverrides {
    pub fn apply(&self, cfg: &mut TrainingConfig) {
        if let Some(v) = self.epochs        { cfg.epochs = v; }
        if let Some(v) = self.batch_size    { cfg.batch_size = v; }
        if let Some(v) = self.learning_rate { cfg.learning_rate = v; }
        if let Some(v) = &self.output_path  { cfg.output_path = v.clone(); }
        if let Some(v) = self.seed          { cfg.seed = Some(v); }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
chunker_config:
  output_path: kb/chunks.json
  chunk_size: 512
question_generation:
  output_path: qa/train.jsonl
  model: some-llm
training:
  model_id: models/base
  output_path: out/model
  epochs: 2
  matryoshka_dimensions: [64, 32]
  metric_for_best_model: eval_dim_32_cosine_ndcg@10
  encoder:
    d_model: 64
    num_heads: 4
"#;

    #[test]
    fn test_parses_and_fills_defaults() {
        let cfg = PipelineConfig::from_yaml_str(YAML).unwrap();
        assert_eq!(cfg.chunker_config.output_path, PathBuf::from("kb/chunks.json"));
        assert_eq!(cfg.training_data_path(), Some(Path::new("qa/train.jsonl")));

        let t = cfg.training.unwrap();
        assert_eq!(t.epochs, 2);
        assert_eq!(t.batch_size, 32);
        assert_eq!(t.encoder.d_model, 64);
        assert_eq!(t.encoder.num_layers, 4);
        assert!(t.validate().is_ok());
    }

    #[test]
    fn test_missing_sections_are_none() {
        let cfg = PipelineConfig::from_yaml_str("chunker_config:\n  output_path: kb.json\n").unwrap();
        assert!(cfg.training.is_none());
        assert!(cfg.training_data_path().is_none());
    }

    fn rejects(mutate: impl FnOnce(&mut TrainingConfig)) -> bool {
        let mut cfg = TrainingConfig::default();
        mutate(&mut cfg);
        matches!(cfg.validate(), Err(PipelineError::InvalidConfig(_)))
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(TrainingConfig::default().validate().is_ok());

        assert!(rejects(|c| c.matryoshka_dimensions.clear()));
        assert!(rejects(|c| c.matryoshka_dimensions = vec![0]));
        assert!(rejects(|c| c.batch_size = 0));
        assert!(rejects(|c| c.epochs = 0));
        assert!(rejects(|c| c.gradient_accumulation_steps = 0));
        assert!(rejects(|c| c.test_size = 1.0));
        assert!(rejects(|c| c.encoder.num_heads = 3));
        assert!(rejects(|c| c.encoder.max_seq_len = 1));
        assert!(rejects(|c| c.encoder.max_seq_len = 0));
        assert!(rejects(|c| c.metric_for_best_model = "eval_dim_100_cosine_ndcg@10".into()));
    }

    #[test]
    fn test_dims_are_checked_against_model_width() {
        let cfg = TrainingConfig {
            matryoshka_dimensions: vec![512, 256],
            metric_for_best_model: "eval_dim_256_cosine_ndcg@10".into(),
            ..TrainingConfig::default()
        };
        // Wider than encoder.d_model, which only matters for a fresh encoder
        assert!(cfg.validate().is_ok());
        assert!(cfg.check_dims_fit(512).is_ok());
        assert!(matches!(cfg.check_dims_fit(384), Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn test_sequential_score_is_a_valid_metric() {
        let cfg = TrainingConfig {
            metric_for_best_model: "eval_sequential_score".into(),
            ..TrainingConfig::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_overrides_win() {
        let mut cfg = TrainingConfig::default();
        TrainingOverrides {
            epochs: Some(1),
            seed: Some(9),
            output_path: Some(PathBuf::from("elsewhere")),
            ..Default::default()
        }
        .apply(&mut cfg);
        assert_eq!(cfg.epochs, 1);
        assert_eq!(cfg.seed, Some(9));
        assert_eq!(cfg.output_path, PathBuf::from("elsewhere"));
        assert_eq!(cfg.batch_size, 32);
    }
}
