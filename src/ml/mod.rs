// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All Burn-specific model code lives here.
//
//   model.rs    — Transformer encoder + masked mean pooling.
//                 Produces one d_model-wide sentence embedding
//                 per input; the first k components form the
//                 k-dimensional Matryoshka embedding.
//
//   loss.rs     — Multiple-negatives ranking loss (in-batch
//                 negatives, scaled cosine logits) wrapped in a
//                 Matryoshka loss summed over every configured
//                 truncation dimension.
//
//   schedule.rs — Linear warm-up then cosine decay for the
//                 learning rate.
//
//   trainer.rs  — Epoch loop: no-duplicate batches, gradient
//                 accumulation, AdamW, per-epoch retrieval
//                 evaluation, checkpoint rotation, best-model
//                 reload.
//
//   embedder.rs — Wraps a trained model + tokenizer as a
//                 TextEncoder for the evaluator.
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Kusupati et al. (2022) Matryoshka Representation Learning
//            Henderson et al. (2017) Efficient Natural Language Response Suggestion

use burn::backend::{wgpu::WgpuDevice, Autodiff, Wgpu};

/// Transformer encoder sentence-embedding architecture
pub mod model;

/// Ranking + Matryoshka contrastive loss
pub mod loss;

/// Learning-rate schedule
pub mod schedule;

/// Full training loop with evaluation and checkpointing
pub mod trainer;

/// TextEncoder implementation over a Burn model
pub mod embedder;

/// Backend used for training (gradients tracked)
pub type TrainBackend = Autodiff<Wgpu>;

/// Backend used for evaluation and reloading saved models
pub type InferBackend = Wgpu;

pub fn default_device() -> WgpuDevice {
    WgpuDevice::default()
}
