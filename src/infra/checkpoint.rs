// ============================================================
// Layer 6 — Checkpoints and Model Directories
// ============================================================
// Two kinds of on-disk state, both written with Burn's
// CompactRecorder (MessagePack + gzip):
//
// 1. Epoch checkpoints (CheckpointManager), under output_path:
//
//      output/
//        checkpoint-1/model.mpk.gz
//        checkpoint-2/model.mpk.gz
//
//    After each save the oldest checkpoints are deleted until
//    at most `save_total_limit` remain. The best checkpoint so
//    far is never deleted, so it can be reloaded at the end.
//
// 2. A self-contained model directory (ModelDirectory):
//
//      model/
//        model.mpk.gz             ← encoder weights
//        encoder_config.json      ← architecture to rebuild the encoder
//        tokenizer.json           ← vocabulary the weights were trained with
//
//    This is both what `training.model_id` may point at and
//    what the pipeline writes when training finishes.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use std::{fs, path::{Path, PathBuf}};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use tokenizers::Tokenizer;

use crate::infra::tokenizer_store::TokenizerStore;
use crate::ml::model::{EmbeddingEncoder, EncoderConfig};

const CHECKPOINT_PREFIX: &str = "checkpoint-";
const WEIGHTS_STEM: &str      = "model";
const WEIGHTS_FILE: &str      = "model.mpk.gz";
const CONFIG_FILE: &str       = "encoder_config.json";
const TOKENIZER_FILE: &str    = "tokenizer.json";

/// The files that make up a saved model directory.
pub const MODEL_FILES: [&str; 3] = [WEIGHTS_FILE, CONFIG_FILE, TOKENIZER_FILE];

// ─── CheckpointManager ────────────────────────────────────────────────────────
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create the manager, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    fn epoch_dir(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("{CHECKPOINT_PREFIX}{epoch}"))
    }

    /// Save model weights for a given epoch.
    pub fn save_epoch<B: Backend>(
        &self,
        model: &EmbeddingEncoder<B>,
        epoch: usize,
    ) -> Result<PathBuf> {
        let dir = self.epoch_dir(epoch);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;

        let path = dir.join(WEIGHTS_STEM);
        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| {
                format!("Failed to save checkpoint to '{}'", path.display())
            })?;

        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(dir)
    }

    /// Restore the weights saved for `epoch` into `model`.
    pub fn load_epoch<B: Backend>(
        &self,
        model:  EmbeddingEncoder<B>,
        epoch:  usize,
        device: &B::Device,
    ) -> Result<EmbeddingEncoder<B>> {
        let path = self.epoch_dir(epoch).join(WEIGHTS_STEM);
        tracing::info!("Loading checkpoint from epoch {}", epoch);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| format!("Cannot load checkpoint '{}'", path.display()))?;
        Ok(model.load_record(record))
    }

    /// Epoch numbers of the checkpoints on disk, ascending.
    pub fn list_epochs(&self) -> Result<Vec<usize>> {
        let mut epochs: Vec<usize> = fs::read_dir(&self.dir)
            .with_context(|| format!("Cannot read '{}'", self.dir.display()))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                entry.file_name()
                    .to_str()?
                    .strip_prefix(CHECKPOINT_PREFIX)?
                    .parse::<usize>()
                    .ok()
            })
            .collect();
        epochs.sort_unstable();
        Ok(epochs)
    }

    /// Delete the oldest checkpoints until at most `limit` remain,
    /// never deleting `keep`. Returns the deleted epochs.
    pub fn rotate(&self, limit: usize, keep: Option<usize>) -> Result<Vec<usize>> {
        let epochs = self.list_epochs()?;
        let mut excess = epochs.len().saturating_sub(limit.max(1));
        let mut deleted = Vec::new();

        for epoch in epochs {
            if excess == 0 {
                break;
            }
            if Some(epoch) == keep {
                continue;
            }
            let dir = self.epoch_dir(epoch);
            fs::remove_dir_all(&dir)
                .with_context(|| format!("Cannot delete old checkpoint '{}'", dir.display()))?;
            tracing::debug!("Deleted checkpoint for epoch {}", epoch);
            deleted.push(epoch);
            excess -= 1;
        }

        Ok(deleted)
    }
}

// ─── ModelDirectory ───────────────────────────────────────────────────────────
/// A saved encoder with everything needed to use it again.
#[derive(Debug)]
pub struct SavedModel<B: Backend> {
    pub model:     EmbeddingEncoder<B>,
    pub config:    EncoderConfig,
    pub tokenizer: Tokenizer,
}

pub struct ModelDirectory {
    dir: PathBuf,
}

impl ModelDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// True when weights, config, and tokenizer are all present.
    pub fn holds_model(&self) -> bool {
        MODEL_FILES
            .iter()
            .all(|f| self.dir.join(f).is_file())
    }

    pub fn save<B: Backend>(
        &self,
        model:     &EmbeddingEncoder<B>,
        config:    &EncoderConfig,
        tokenizer: &Tokenizer,
    ) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create model directory '{}'", self.dir.display()))?;

        let weights = self.dir.join(WEIGHTS_STEM);
        CompactRecorder::new()
            .record(model.clone().into_record(), weights.clone())
            .with_context(|| format!("Failed to save model to '{}'", weights.display()))?;

        let config_path = self.dir.join(CONFIG_FILE);
        config.save(&config_path)
            .with_context(|| format!("Cannot write '{}'", config_path.display()))?;

        TokenizerStore::new(&self.dir).save(tokenizer)?;

        tracing::info!("Saved model to '{}'", self.dir.display());
        Ok(())
    }

    pub fn load<B: Backend>(&self, device: &B::Device) -> Result<SavedModel<B>> {
        let config_path = self.dir.join(CONFIG_FILE);
        let config = EncoderConfig::load(&config_path)
            .map_err(|e| anyhow::anyhow!("Cannot read '{}': {e:?}", config_path.display()))?;

        let tokenizer = TokenizerStore::new(&self.dir).load()?;

        let weights = self.dir.join(WEIGHTS_STEM);
        let record = CompactRecorder::new()
            .load(weights.clone(), device)
            .with_context(|| format!("Cannot load model weights '{}'", weights.display()))?;
        let model = config.init::<B>(device).load_record(record);

        tracing::info!("Loaded model from '{}'", self.dir.display());
        Ok(SavedModel { model, config, tokenizer })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::tokenizer_store::model_vocab_size;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn tiny(vocab_size: usize) -> EncoderConfig {
        EncoderConfig::new(vocab_size)
            .with_max_seq_len(8)
            .with_d_model(8)
            .with_num_heads(2)
            .with_num_layers(1)
            .with_d_ff(16)
    }

    #[test]
    fn test_rotation_keeps_limit_and_best() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = CheckpointManager::new(dir.path()).unwrap();
        for epoch in 1..=5 {
            fs::create_dir_all(dir.path().join(format!("checkpoint-{epoch}"))).unwrap();
        }
        fs::create_dir_all(dir.path().join("not-a-checkpoint")).unwrap();

        let deleted = mgr.rotate(3, Some(1)).unwrap();
        assert_eq!(deleted, vec![2, 3]);
        assert_eq!(mgr.list_epochs().unwrap(), vec![1, 4, 5]);
    }

    #[test]
    fn test_rotation_under_limit_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = CheckpointManager::new(dir.path()).unwrap();
        fs::create_dir_all(dir.path().join("checkpoint-1")).unwrap();
        assert!(mgr.rotate(3, None).unwrap().is_empty());
    }

    #[test]
    fn test_epoch_checkpoint_round_trip() {
        let dir    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let mgr    = CheckpointManager::new(dir.path()).unwrap();

        let model: EmbeddingEncoder<TestBackend> = tiny(120).init(&device);
        mgr.save_epoch(&model, 2).unwrap();
        assert_eq!(mgr.list_epochs().unwrap(), vec![2]);

        let fresh: EmbeddingEncoder<TestBackend> = tiny(120).init(&device);
        let restored = mgr.load_epoch(fresh, 2, &device).unwrap();

        let a: Vec<f32> = model.token_embedding.weight.val().into_data().to_vec().unwrap();
        let b: Vec<f32> = restored.token_embedding.weight.val().into_data().to_vec().unwrap();
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-2, "{x} vs {y}");
        }
    }

    #[test]
    fn test_model_directory_round_trip() {
        let dir    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let tokenizer = TokenizerStore::new(dir.path().join("tok"))
            .load_or_build(&["hello world".to_string()], 200)
            .unwrap();
        let config = tiny(model_vocab_size(&tokenizer));
        let model: EmbeddingEncoder<TestBackend> = config.init(&device);

        let model_dir = ModelDirectory::new(dir.path().join("model"));
        assert!(!model_dir.holds_model());
        model_dir.save(&model, &config, &tokenizer).unwrap();
        assert!(model_dir.holds_model());

        let saved = model_dir.load::<TestBackend>(&device).unwrap();
        assert_eq!(saved.config.d_model, 8);
        assert_eq!(saved.tokenizer.token_to_id("hello"), tokenizer.token_to_id("hello"));
    }
}
