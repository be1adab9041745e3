// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full fine-tuning pipeline in order:
//
//   Step 0: Preflight checks           (config + input files)
//   Step 1: Load KB + QA rows          (Layer 4 - data)
//   Step 2: Shuffle and split          (Layer 4 - data)
//   Step 3: Build evaluator            (Layer 4 - evaluation)
//   Step 4: Load or init base model    (Layer 6 - infra, Layer 5 - ml)
//   Step 5: Baseline evaluation        (Layer 4 - evaluation)
//   Step 6: Train                      (Layer 5 - ml)
//   Step 7: Save, reload, re-evaluate  (Layer 6 - infra)
//   Step 8: Comparison file + card     (Layer 6 - infra)
//   Step 9: Publish (optional)         (Layer 6 - infra)
//
// Each step runs to completion before the next starts. The
// preflight checks run before any file is read, so a bad
// config fails fast with a typed PipelineError.
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::{bail, Result};
use burn::{module::AutodiffModule, prelude::*};
use rand::Rng;
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

use crate::application::config::{PipelineConfig, TrainingConfig};
use crate::data::{
    dataset::PairDataset,
    eval_structures::{build_evaluation_structures, EvaluationSet},
    loader::{KnowledgeBaseLoader, QaPairLoader},
    splitter::{pipeline_rng, split_train_test},
};
use crate::domain::{
    error::PipelineError, kb_chunk::KbChunk, qa_pair::QaPair, traits::ModelPublisher,
};
use crate::evaluation::evaluator::{MetricsReport, RetrievalEvaluator};
use crate::infra::{
    checkpoint::{ModelDirectory, SavedModel},
    hub::HubClient,
    report::{metrics_table, model_card, write_comparison, ModelCardInfo, MODEL_CARD_FILE},
    tokenizer_store::{model_vocab_size, TokenizerStore},
};
use crate::ml::{
    default_device, embedder::Embedder, model::EmbeddingEncoder, trainer::run_training,
    InferBackend, TrainBackend,
};

const COMPARISON_FILE: &str = "metrics_comparison.txt";

// ─── Preflight ────────────────────────────────────────────────────────────────
/// Everything the pipeline needs once the config has been checked.
#[derive(Debug, Clone)]
pub struct TrainingInputs {
    pub kb_path:    PathBuf,
    pub train_path: PathBuf,
    pub training:   TrainingConfig,
}

/// Check the config and input files without reading any dataset.
///
/// Order: training section, KB file, training data path,
/// training file, then field validation.
pub fn preflight(cfg: &PipelineConfig) -> Result<TrainingInputs, PipelineError> {
    let training = cfg.training.clone().ok_or(PipelineError::MissingTrainingConfig)?;

    let kb_path = cfg.chunker_config.output_path.clone();
    if !kb_path.is_file() {
        return Err(PipelineError::KnowledgeBaseNotFound(kb_path));
    }

    let train_path = cfg
        .training_data_path()
        .ok_or(PipelineError::MissingTrainingDataPath)?
        .to_path_buf();
    if !train_path.is_file() {
        return Err(PipelineError::TrainingDataNotFound(train_path));
    }
    training.validate()?;

    Ok(TrainingInputs { kb_path, train_path, training })
}

// ─── Data ─────────────────────────────────────────────────────────────────────
pub struct PreparedData {
    pub kb:         Vec<KbChunk>,
    pub train:      Vec<QaPair>,
    pub test:       Vec<QaPair>,
    pub evaluation: EvaluationSet,
}

impl PreparedData {
    /// Every KB and QA text, used to build a tokenizer from scratch.
    pub fn all_texts(&self) -> Vec<String> {
        self.kb
            .iter()
            .map(|c| c.text.clone())
            .chain(self.train.iter().chain(&self.test).flat_map(|p| [p.anchor.clone(), p.positive.clone()]))
            .collect()
    }
}

/// Load both files, split the QA rows, and build the evaluation maps.
pub fn prepare_data<R: Rng>(inputs: &TrainingInputs, rng: &mut R) -> Result<PreparedData> {
    let kb   = KnowledgeBaseLoader::new(&inputs.kb_path).load()?;
    let rows = QaPairLoader::new(&inputs.train_path).load()?;
    tracing::info!("Loaded {} KB chunks and {} QA rows", kb.len(), rows.len());

    let (train, test) = split_train_test(rows, inputs.training.test_size, rng);
    if train.is_empty() || test.is_empty() {
        bail!(
            "Train/test split left an empty side ({} train, {} test); add more QA rows",
            train.len(),
            test.len(),
        );
    }
    tracing::info!("Split: {} train, {} test", train.len(), test.len());

    let evaluation = build_evaluation_structures(&kb, &test);
    Ok(PreparedData { kb, train, test, evaluation })
}

// ─── Model ────────────────────────────────────────────────────────────────────
/// Load the base model from `model_id`, or build a tokenizer under
/// `output_path` and initialise a fresh encoder when none is saved there.
///
/// The Matryoshka dimensions are checked against the width of whichever
/// encoder is used: the saved one, or `training.encoder.d_model`.
pub fn load_base_model<B: Backend>(
    training: &TrainingConfig,
    texts:    &[String],
    device:   &B::Device,
) -> Result<SavedModel<B>> {
    let base_dir = ModelDirectory::new(&training.model_id);
    if base_dir.holds_model() {
        let saved = base_dir.load(device)?;
        training.check_dims_fit(saved.config.d_model)?;
        return Ok(saved);
    }
    training.check_dims_fit(training.encoder.d_model)?;

    tracing::warn!(
        "No saved model in '{}'; starting from a freshly initialised encoder",
        training.model_id.display(),
    );
    let tokenizer = TokenizerStore::new(&training.output_path)
        .load_or_build(texts, training.tokenizer_vocab_size)?;
    let config = training.encoder_config(model_vocab_size(&tokenizer));
    let model  = config.init::<B>(device);
    Ok(SavedModel { model, config, tokenizer })
}

/// Score `model` with the retrieval evaluator.
pub fn evaluate_model<B: Backend>(
    model:       EmbeddingEncoder<B>,
    tokenizer:   &Tokenizer,
    max_seq_len: usize,
    batch_size:  usize,
    evaluator:   &RetrievalEvaluator,
    device:      &B::Device,
) -> Result<MetricsReport> {
    let embedder = Embedder::new(model, tokenizer.clone(), device.clone(), max_seq_len, batch_size);
    evaluator.evaluate(&embedder)
}

// ─── Publishing ───────────────────────────────────────────────────────────────
/// Push `model_dir` if the config asks for it. Returns whether an upload ran.
pub fn publish_if_configured(
    training:  &TrainingConfig,
    model_dir: &Path,
    publisher: &dyn ModelPublisher,
) -> Result<bool> {
    if !training.push_to_hub {
        return Ok(false);
    }
    let Some(repo_id) = training.hub_model_id.as_deref().filter(|id| !id.trim().is_empty()) else {
        tracing::warn!("push_to_hub is set but hub_model_id is missing; skipping upload");
        return Ok(false);
    };

    publisher.publish(repo_id, model_dir, training.hub_private)?;
    tracing::info!("Model pushed to '{}'", repo_id);
    Ok(true)
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
/// What a finished run produced.
#[derive(Debug)]
pub struct TrainSummary {
    pub model_dir:  PathBuf,
    pub best_epoch: Option<usize>,
    pub best_score: Option<f64>,
    pub before:     MetricsReport,
    pub after:      MetricsReport,
    pub published:  bool,
}

pub struct TrainUseCase {
    config: PipelineConfig,
}

impl TrainUseCase {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<TrainSummary> {
        // ── Step 0: Preflight ─────────────────────────────────────────────────
        let inputs = preflight(&self.config)?;
        let cfg    = &inputs.training;
        let dims   = &cfg.matryoshka_dimensions;
        let mut rng = pipeline_rng(cfg.seed);

        // ── Steps 1-3: Data and evaluator ─────────────────────────────────────
        let data      = prepare_data(&inputs, &mut rng)?;
        let evaluator = RetrievalEvaluator::new(data.evaluation.clone(), dims.clone());

        // ── Step 4: Base model ────────────────────────────────────────────────
        let device = default_device();
        tracing::info!("Using WGPU device: {:?}", device);
        let SavedModel { model, config: encoder_config, tokenizer } =
            load_base_model::<TrainBackend>(cfg, &data.all_texts(), &device)?;
        let max_seq_len = encoder_config.max_seq_len;

        // ── Step 5: Baseline ──────────────────────────────────────────────────
        let before = evaluate_model(
            model.valid(), &tokenizer, max_seq_len, cfg.batch_size, &evaluator, &device,
        )?;
        println!("{}", metrics_table("Base Model Evaluation Results", &before, dims)?);

        // ── Step 6: Train ─────────────────────────────────────────────────────
        let train_set = PairDataset::from_pairs(&data.train, &tokenizer, max_seq_len)?;
        let outcome = run_training(
            &cfg.trainer_settings(max_seq_len),
            model,
            &tokenizer,
            &train_set,
            &evaluator,
            &cfg.output_path,
            &mut rng,
            &device,
        )?;

        // ── Step 7: Save, reload, re-evaluate ─────────────────────────────────
        let model_dir = ModelDirectory::new(&cfg.output_path);
        model_dir.save(&outcome.model, &encoder_config, &tokenizer)?;

        let saved = model_dir.load::<InferBackend>(&device)?;
        let after = evaluate_model(
            saved.model, &saved.tokenizer, saved.config.max_seq_len, cfg.batch_size, &evaluator, &device,
        )?;
        println!("{}", metrics_table("Fine-Tuned Model Evaluation Results", &after, dims)?);

        // ── Step 8: Reports ───────────────────────────────────────────────────
        write_comparison(&before, &after, dims, &cfg.output_path.join(COMPARISON_FILE))?;

        let card = model_card(
            &ModelCardInfo {
                model_name: cfg.hub_model_id.as_deref().unwrap_or("embed-finetune model"),
                base_model: &cfg.model_id.display().to_string(),
                dims,
                epochs:     cfg.epochs,
            },
            &after,
        )?;
        std::fs::write(cfg.output_path.join(MODEL_CARD_FILE), card)?;

        // ── Step 9: Publish ───────────────────────────────────────────────────
        let published = if cfg.push_to_hub {
            publish_if_configured(cfg, model_dir.path(), &HubClient::from_env()?)?
        } else {
            false
        };

        Ok(TrainSummary {
            model_dir: model_dir.path().to_path_buf(),
            best_epoch: outcome.best_epoch,
            best_score: outcome.best_score,
            before,
            after,
            published,
        })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::config::{ChunkerConfig, QuestionGenerationConfig};
    use burn::backend::NdArray;
    use std::{cell::RefCell, fs};

    const KB: &str = r#"[
        {"id": 1, "text": "the library opens at nine"},
        {"id": 2, "text": "parking is free on weekends"},
        {"id": 3, "text": "exams start in june"}
    ]"#;

    fn write_inputs(dir: &Path, rows: usize) -> (PathBuf, PathBuf) {
        let kb = dir.join("kb.json");
        fs::write(&kb, KB).unwrap();

        let train = dir.join("train.jsonl");
        let lines: Vec<String> = (0..rows)
            .map(|i| {
                let chunk = i % 3 + 1;
                format!(r#"{{"anchor": "question {i}", "positive": "answer {chunk}", "chunk_id": {chunk}}}"#)
            })
            .collect();
        fs::write(&train, lines.join("\n")).unwrap();
        (kb, train)
    }

    fn pipeline(kb: PathBuf, train: Option<PathBuf>, training: Option<TrainingConfig>) -> PipelineConfig {
        PipelineConfig {
            chunker_config:      ChunkerConfig { output_path: kb },
            question_generation: Some(QuestionGenerationConfig { output_path: train }),
            training,
        }
    }

    #[test]
    fn test_preflight_requires_training_section() {
        let dir = tempfile::tempdir().unwrap();
        let (kb, train) = write_inputs(dir.path(), 5);
        let err = preflight(&pipeline(kb, Some(train), None)).unwrap_err();
        assert!(matches!(err, PipelineError::MissingTrainingConfig));
    }

    #[test]
    fn test_preflight_requires_training_data_path() {
        let dir = tempfile::tempdir().unwrap();
        let (kb, _) = write_inputs(dir.path(), 5);

        let err = preflight(&pipeline(kb.clone(), None, Some(TrainingConfig::default()))).unwrap_err();
        assert!(matches!(err, PipelineError::MissingTrainingDataPath));

        let mut cfg = pipeline(kb, None, Some(TrainingConfig::default()));
        cfg.question_generation = None;
        assert!(matches!(preflight(&cfg).unwrap_err(), PipelineError::MissingTrainingDataPath));
    }

    #[test]
    fn test_preflight_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let (kb, train) = write_inputs(dir.path(), 5);
        let missing = dir.path().join("nope.json");

        let err = preflight(&pipeline(missing.clone(), Some(train), Some(TrainingConfig::default()))).unwrap_err();
        assert!(matches!(err, PipelineError::KnowledgeBaseNotFound(p) if p == missing));

        let err = preflight(&pipeline(kb, Some(missing.clone()), Some(TrainingConfig::default()))).unwrap_err();
        assert!(matches!(err, PipelineError::TrainingDataNotFound(p) if p == missing));
    }

    #[test]
    fn test_preflight_checks_kb_before_training_data_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        let mut cfg = pipeline(missing.clone(), None, Some(TrainingConfig::default()));
        cfg.question_generation = None;

        let err = preflight(&cfg).unwrap_err();
        assert!(matches!(err, PipelineError::KnowledgeBaseNotFound(p) if p == missing));
    }

    #[test]
    fn test_execute_fails_before_loading_when_kb_missing() {
        let dir = tempfile::tempdir().unwrap();
        let (_, train) = write_inputs(dir.path(), 5);
        let cfg = pipeline(dir.path().join("absent.json"), Some(train), Some(TrainingConfig::default()));

        let err = TrainUseCase::new(cfg).execute().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::KnowledgeBaseNotFound(_))
        ));
    }

    #[test]
    fn test_preflight_validates_training_fields() {
        let dir = tempfile::tempdir().unwrap();
        let (kb, train) = write_inputs(dir.path(), 5);
        let training = TrainingConfig { batch_size: 0, ..TrainingConfig::default() };
        let err = preflight(&pipeline(kb, Some(train), Some(training))).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn test_prepare_data_splits_and_builds_maps() {
        let dir = tempfile::tempdir().unwrap();
        let (kb, train) = write_inputs(dir.path(), 20);
        let inputs = preflight(&pipeline(kb, Some(train), Some(TrainingConfig::default()))).unwrap();

        let data = prepare_data(&inputs, &mut pipeline_rng(Some(3))).unwrap();
        assert_eq!(data.kb.len(), 3);
        assert_eq!(data.test.len(), 2);
        assert_eq!(data.train.len(), 18);
        assert_eq!(data.evaluation.corpus.len(), 3);
        assert_eq!(data.evaluation.scorable_query_ids().len(), 2);
    }

    #[test]
    fn test_prepare_data_rejects_empty_train_split() {
        let dir = tempfile::tempdir().unwrap();
        let (kb, train) = write_inputs(dir.path(), 1);
        let inputs = preflight(&pipeline(kb, Some(train), Some(TrainingConfig::default()))).unwrap();
        assert!(prepare_data(&inputs, &mut pipeline_rng(Some(3))).is_err());
    }

    #[test]
    fn test_fresh_base_model_uses_configured_architecture() {
        let dir = tempfile::tempdir().unwrap();
        let mut training = TrainingConfig {
            model_id:    dir.path().join("no-model-here"),
            output_path: dir.path().join("out"),
            ..TrainingConfig::default()
        };
        training.encoder.d_model    = 16;
        training.encoder.num_heads  = 2;
        training.encoder.num_layers = 1;
        training.encoder.d_ff       = 32;
        training.matryoshka_dimensions = vec![16, 8];

        let device = Default::default();
        let texts  = vec!["alpha beta".to_string(), "gamma".to_string()];
        let base   = load_base_model::<NdArray>(&training, &texts, &device).unwrap();

        assert_eq!(base.config.d_model, 16);
        assert_eq!(base.config.vocab_size, model_vocab_size(&base.tokenizer));
        assert!(training.output_path.join("tokenizer.json").is_file());

        // Once saved, the same directory is picked up as a base model
        let saved_dir = ModelDirectory::new(&training.model_id);
        saved_dir.save(&base.model, &base.config, &base.tokenizer).unwrap();
        let reloaded = load_base_model::<NdArray>(&training, &[], &device).unwrap();
        assert_eq!(reloaded.config.d_model, 16);
    }

    #[test]
    fn test_saved_base_model_width_governs_dimension_check() {
        let dir = tempfile::tempdir().unwrap();
        let mut narrow = TrainingConfig {
            model_id:    dir.path().join("base"),
            output_path: dir.path().join("out"),
            ..TrainingConfig::default()
        };
        narrow.encoder.d_model    = 16;
        narrow.encoder.num_heads  = 2;
        narrow.encoder.num_layers = 1;
        narrow.encoder.d_ff       = 32;
        narrow.matryoshka_dimensions = vec![16, 8];
        narrow.metric_for_best_model = "eval_dim_8_cosine_ndcg@10".into();

        let device = Default::default();
        let texts  = vec!["alpha beta".to_string()];
        let base   = load_base_model::<NdArray>(&narrow, &texts, &device).unwrap();
        ModelDirectory::new(&narrow.model_id)
            .save(&base.model, &base.config, &base.tokenizer)
            .unwrap();

        // The configured encoder is wider than the saved one; the saved width wins.
        let mut training = TrainingConfig {
            model_id:    narrow.model_id.clone(),
            output_path: narrow.output_path.clone(),
            matryoshka_dimensions: vec![16, 8],
            metric_for_best_model: "eval_dim_8_cosine_ndcg@10".into(),
            ..TrainingConfig::default()
        };
        assert_eq!(training.encoder.d_model, 256);
        training.validate().unwrap();
        assert_eq!(load_base_model::<NdArray>(&training, &[], &device).unwrap().config.d_model, 16);

        training.matryoshka_dimensions = vec![32, 8];
        training.validate().unwrap();
        let err = load_base_model::<NdArray>(&training, &[], &device).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_fresh_base_model_rejects_dims_wider_than_encoder() {
        let dir = tempfile::tempdir().unwrap();
        let mut training = TrainingConfig {
            model_id:    dir.path().join("no-model-here"),
            output_path: dir.path().join("out"),
            ..TrainingConfig::default()
        };
        training.encoder.d_model   = 16;
        training.encoder.num_heads = 2;

        let err = load_base_model::<NdArray>(&training, &["a b".to_string()], &Default::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::InvalidConfig(_))
        ));
        assert!(!training.output_path.join("tokenizer.json").exists());
    }

    // ── Publishing ────────────────────────────────────────────────────────────
    #[derive(Default)]
    struct RecordingPublisher {
        calls: RefCell<Vec<(String, PathBuf, bool)>>,
    }

    impl ModelPublisher for RecordingPublisher {
        fn publish(&self, repo_id: &str, model_dir: &Path, private: bool) -> Result<()> {
            self.calls.borrow_mut().push((repo_id.to_string(), model_dir.to_path_buf(), private));
            Ok(())
        }
    }

    #[test]
    fn test_publish_skipped_when_disabled() {
        let publisher = RecordingPublisher::default();
        let training  = TrainingConfig { hub_model_id: Some("acme/model".into()), ..TrainingConfig::default() };
        assert!(!publish_if_configured(&training, Path::new("out"), &publisher).unwrap());
        assert!(publisher.calls.borrow().is_empty());
    }

    #[test]
    fn test_publish_skipped_without_repo_id() {
        let publisher = RecordingPublisher::default();
        let training  = TrainingConfig { push_to_hub: true, ..TrainingConfig::default() };
        assert!(!publish_if_configured(&training, Path::new("out"), &publisher).unwrap());
        assert!(publisher.calls.borrow().is_empty());
    }

    #[test]
    fn test_publish_forwards_repo_and_visibility() {
        let publisher = RecordingPublisher::default();
        let training  = TrainingConfig {
            push_to_hub:  true,
            hub_model_id: Some("acme/model".into()),
            hub_private:  true,
            ..TrainingConfig::default()
        };
        assert!(publish_if_configured(&training, Path::new("out"), &publisher).unwrap());
        assert_eq!(
            publisher.calls.borrow().as_slice(),
            &[("acme/model".to_string(), PathBuf::from("out"), true)]
        );
    }
}
