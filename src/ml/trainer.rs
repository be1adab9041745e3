// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Contrastive fine-tuning with in-batch negatives.
//
// One epoch:
//   1. The no-duplicates sampler cuts the training pairs into
//      batches with no repeated anchor or positive text.
//   2. Each batch is padded, anchors and positives go through
//      the same encoder, and the Matryoshka ranking loss is
//      computed over every truncation dimension.
//   3. Gradients are accumulated over
//      `gradient_accumulation_steps` batches (each loss scaled
//      by 1/accum), then AdamW takes one step at the learning
//      rate given by the warm-up + cosine schedule.
//   4. At the end of the epoch the model (dropout off, no
//      autodiff) is scored by the retrieval evaluator, the
//      epoch is logged, `checkpoint-<epoch>` is written, and old
//      checkpoints are rotated out. The best epoch is kept.
//
// When all epochs are done the best checkpoint is loaded back
// into the model, so the caller always gets the best weights.
//
// Key Burn insight:
//   - Training runs on an AutodiffBackend so loss.backward() works
//   - model.valid() gives the same weights on B::InnerBackend,
//     which shares the device type, for evaluation
//
// Reference: Burn Book §5, Loshchilov & Hutter (2019) AdamW

use anyhow::Result;
use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    module::AutodiffModule,
    optim::{AdamWConfig, GradientsAccumulator, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use rand::Rng;
use std::path::Path;
use tokenizers::Tokenizer;

use crate::data::{
    batcher::PairBatcher,
    dataset::{PairDataset, PairSample},
    sampler::NoDuplicatesBatchSampler,
};
use crate::domain::error::PipelineError;
use crate::evaluation::evaluator::{resolve_metric_name, RetrievalEvaluator};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::{
    embedder::Embedder,
    loss::MatryoshkaRankingLoss,
    model::EmbeddingEncoder,
    schedule::WarmupCosineSchedule,
};

const WEIGHT_DECAY: f32 = 0.01;

/// Hyperparameters for one training run.
#[derive(Debug, Clone)]
pub struct TrainerSettings {
    pub epochs:                      usize,
    pub learning_rate:               f64,
    pub batch_size:                  usize,
    pub gradient_accumulation_steps: usize,
    pub warmup_ratio:                f64,
    pub matryoshka_dims:             Vec<usize>,
    /// Metric key used to pick the best epoch; `eval_` prefix allowed
    pub metric_for_best_model:       String,
    pub save_total_limit:            usize,
    pub logging_steps:               usize,
    pub max_seq_len:                 usize,
}

#[derive(Debug)]
pub struct TrainingOutcome<B: AutodiffBackend> {
    /// Weights of the best epoch (or the input weights if no epoch ran)
    pub model:      EmbeddingEncoder<B>,
    pub best_epoch: Option<usize>,
    pub best_score: Option<f64>,
}

pub fn run_training<B: AutodiffBackend, R: Rng>(
    settings:   &TrainerSettings,
    mut model:  EmbeddingEncoder<B>,
    tokenizer:  &Tokenizer,
    train_set:  &PairDataset,
    evaluator:  &RetrievalEvaluator,
    output_dir: &Path,
    rng:        &mut R,
    device:     &B::Device,
) -> Result<TrainingOutcome<B>> {
    let accum     = settings.gradient_accumulation_steps.max(1);
    let sampler   = NoDuplicatesBatchSampler::new(settings.batch_size);
    let batcher   = PairBatcher::<B>::new(device.clone());
    let loss_fn   = MatryoshkaRankingLoss::new(settings.matryoshka_dims.clone());
    let metric    = resolve_metric_name(&settings.metric_for_best_model).to_string();
    let samples   = train_set.samples();

    if let Some(&too_wide) = loss_fn.dims().iter().find(|&&d| d == 0 || d > model.d_model) {
        return Err(PipelineError::InvalidConfig(format!(
            "matryoshka dimension {too_wide} is outside 1..={} for this model",
            model.d_model,
        ))
        .into());
    }

    let steps_per_epoch = sampler.estimated_batches(samples.len()).div_ceil(accum);
    let schedule = WarmupCosineSchedule::new(
        settings.learning_rate,
        steps_per_epoch * settings.epochs,
        settings.warmup_ratio,
    );

    let ckpt   = CheckpointManager::new(output_dir)?;
    let logger = MetricsLogger::new(output_dir)?;

    let mut optim = AdamWConfig::new()
        .with_weight_decay(WEIGHT_DECAY)
        .init();

    tracing::info!(
        "Training on {} pairs: {} epochs, batch {}, accumulation {}, {} optimizer steps, {} warm-up",
        samples.len(),
        settings.epochs,
        settings.batch_size,
        accum,
        steps_per_epoch * settings.epochs,
        schedule.warmup_steps(),
    );

    let mut global_step = 0usize;
    let mut current_lr  = schedule.lr_at(0);
    let mut best_epoch: Option<usize> = None;
    let mut best_score: Option<f64>   = None;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=settings.epochs {
        let batches   = sampler.batches(samples, rng);
        let n_batches = batches.len();

        let mut accumulator  = GradientsAccumulator::new();
        let mut pending      = 0usize;
        let mut loss_sum     = 0.0f64;
        let mut window_sum   = 0.0f64;
        let mut window_count = 0usize;

        for (i, indices) in batches.into_iter().enumerate() {
            let items: Vec<PairSample> = indices.iter().filter_map(|&idx| train_set.get(idx)).collect();
            let batch = batcher.batch(items, &batcher.device);

            let anchors   = model.forward(batch.anchors.input_ids, batch.anchors.attention_mask);
            let positives = model.forward(batch.positives.input_ids, batch.positives.attention_mask);
            let loss      = loss_fn.forward(anchors, positives);

            let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
            loss_sum     += loss_val;
            window_sum   += loss_val;
            window_count += 1;

            let grads = loss.div_scalar(accum as f64).backward();
            let grads = GradientsParams::from_grads(grads, &model);
            accumulator.accumulate(&model, grads);
            pending += 1;

            // Step on a full accumulation window or the epoch's last batch
            if pending == accum || i + 1 == n_batches {
                current_lr = schedule.lr_at(global_step);
                model = optim.step(current_lr, model, accumulator.grads());
                global_step += 1;
                pending = 0;

                if settings.logging_steps > 0 && global_step % settings.logging_steps == 0 {
                    tracing::info!(
                        "step {:>6} | epoch {} | loss={:.4} | lr={:.3e}",
                        global_step,
                        epoch,
                        window_sum / window_count as f64,
                        current_lr,
                    );
                    window_sum   = 0.0;
                    window_count = 0;
                }
            }
        }

        let train_loss = if n_batches > 0 { loss_sum / n_batches as f64 } else { f64::NAN };

        // ── Evaluation phase ──────────────────────────────────────────────────
        let embedder = Embedder::new(
            model.valid(),
            tokenizer.clone(),
            device.clone(),
            settings.max_seq_len,
            settings.batch_size,
        );
        let report = evaluator.evaluate(&embedder)?;
        let score  = report.get(&metric)?;

        let row = EpochMetrics::new(epoch, train_loss, score, current_lr);
        logger.log(&row)?;

        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | {}={:.4} | lr={:.3e}",
            epoch, settings.epochs, train_loss, metric, score, current_lr,
        );

        ckpt.save_epoch(&model, epoch)?;
        if row.is_improvement(best_score) {
            tracing::info!("New best {} = {:.4} at epoch {}", metric, score, epoch);
            best_score = Some(score);
            best_epoch = Some(epoch);
        }
        let deleted = ckpt.rotate(settings.save_total_limit, best_epoch)?;
        if !deleted.is_empty() {
            tracing::debug!("Rotated out checkpoints {:?}", deleted);
        }
    }

    if let Some(epoch) = best_epoch {
        model = ckpt.load_epoch(model, epoch, device)?;
        tracing::info!("Loaded best model from epoch {} ({} = {:.4})", epoch, metric, best_score.unwrap_or_default());
    }

    tracing::info!(
        "Training complete after {} optimizer steps; log in '{}'",
        global_step,
        logger.csv_path().display(),
    );
    Ok(TrainingOutcome { model, best_epoch, best_score })
}
