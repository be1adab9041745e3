// ============================================================
// Layer 4 — Retrieval Evaluation
// ============================================================
// Scores how well an embedding model retrieves the right KB
// chunk for each held-out question, separately at every
// Matryoshka dimension.
//
//   retrieval.rs — per-query ranking metrics
//                  (accuracy / precision / recall @k, MRR@10,
//                   NDCG@10, MAP@100) and their averages
//
//   evaluator.rs — encodes queries + corpus once, truncates
//                  to each dimension, ranks by cosine
//                  similarity, and collects everything into a
//                  MetricsReport keyed `dim_{d}_cosine_{metric}`
//
// No Burn types here: the evaluator only sees the TextEncoder
// trait, so it runs the same against the real model and
// against a fake in tests. It sits beside the data pipeline
// and consumes its EvaluationSet.

/// Ranking metrics for a single query and their averages
pub mod retrieval;

/// Multi-dimension evaluator and the metrics report
pub mod evaluator;
