// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// TextEncoder  — anything that turns texts into embeddings.
//                Implemented by the Burn-backed Embedder in
//                Layer 5; tests use a tiny deterministic fake.
//
// ModelPublisher — anything that can push a saved model
//                directory to a remote hub. Implemented by
//                HubClient in Layer 6.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use std::path::Path;

// ─── TextEncoder ──────────────────────────────────────────────────────────────
/// Encodes a batch of texts into fixed-width embedding vectors.
///
/// Every returned vector has exactly `embedding_dim()` elements and
/// the output order matches the input order.
pub trait TextEncoder {
    /// Width of the full (untruncated) embedding
    fn embedding_dim(&self) -> usize;

    /// Encode all texts, preserving order
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

// ─── ModelPublisher ───────────────────────────────────────────────────────────
/// Uploads a model directory to a remote repository.
pub trait ModelPublisher {
    /// Publish every file under `model_dir` to `repo_id`.
    /// An already existing repository is not an error.
    fn publish(&self, repo_id: &str, model_dir: &Path, private: bool) -> Result<()>;
}
