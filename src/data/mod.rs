// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from the two input files to GPU-ready batches.
//
//   kb.json / train.jsonl
//       │
//       ▼
//   loader            → KbChunk / QaPair rows (ids normalised,
//       │               chunk_id renamed to global_chunk_id)
//       ▼
//   splitter          → shuffled train / test split
//       │
//       ├──────────────► eval_structures → corpus, queries,
//       │                                  relevant_docs
//       ▼
//   PairDataset       → tokenised anchor/positive samples
//       │
//       ▼
//   NoDuplicatesBatchSampler → index batches with no repeated text
//       │
//       ▼
//   PairBatcher       → padded tensor batches
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads the knowledge base JSON and the training JSON lines file
pub mod loader;

/// Shuffles and splits rows into train/test sets
pub mod splitter;

/// Builds the corpus / queries / relevant-docs lookup maps
pub mod eval_structures;

/// Implements Burn's Dataset trait for tokenised pairs
pub mod dataset;

/// Implements Burn's Batcher trait with dynamic padding
pub mod batcher;

/// Batch sampler that keeps in-batch negatives unique
pub mod sampler;
