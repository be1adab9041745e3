// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// File formats and external services used by several layers:
//
//   checkpoint.rs      — Epoch checkpoints with rotation, and
//                        self-contained model directories
//                        (weights + encoder config + tokenizer)
//
//   tokenizer_store.rs — Word-level tokenizer build / save / load
//
//   metrics.rs         — Per-epoch training log (CSV)
//
//   report.rs          — Metrics tables, the before/after
//                        comparison file, and the model card
//
//   hub.rs             — HTTP client that pushes a model
//                        directory to a model hub
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving, rotation, and loading
pub mod checkpoint;

/// Tokenizer training, saving, and loading
pub mod tokenizer_store;

/// Training metrics CSV logger
pub mod metrics;

/// Metrics tables, comparison file, model card
pub mod report;

/// Model hub upload client
pub mod hub;
