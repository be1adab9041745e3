// ============================================================
// Layer 4 — Information Retrieval Evaluator
// ============================================================
// Encodes the held-out queries and the corpus once, then for
// each Matryoshka dimension truncates, re-normalises and ranks
// the corpus by cosine similarity. Equal scores rank by corpus
// id. Queries without relevant documents are left out of the
// averages.

use anyhow::{bail, Result};
use std::collections::BTreeMap;

use crate::data::eval_structures::EvaluationSet;
use crate::domain::error::PipelineError;
use crate::domain::traits::TextEncoder;
use crate::evaluation::retrieval::{max_rank_depth, RankingMetrics, METRIC_NAMES};

/// Key under which the aggregate score of a full evaluation is stored.
pub const SEQUENTIAL_SCORE: &str = "sequential_score";

/// Metric that the aggregate score is taken from (at the last dimension).
const PRIMARY_METRIC: &str = "ndcg@10";

/// Trainer-style metric names may carry an `eval_` prefix.
const EVAL_PREFIX: &str = "eval_";

/// Report key for one metric at one dimension.
pub fn metric_key(dim: usize, metric: &str) -> String {
    format!("dim_{dim}_cosine_{metric}")
}

/// Every key an evaluation over `dims` produces.
pub fn known_metric_keys(dims: &[usize]) -> Vec<String> {
    let mut keys: Vec<String> = dims
        .iter()
        .flat_map(|&d| METRIC_NAMES.iter().map(move |m| metric_key(d, m)))
        .collect();
    keys.push(SEQUENTIAL_SCORE.to_string());
    keys
}

/// Strip the optional `eval_` prefix used by `metric_for_best_model`.
pub fn resolve_metric_name(name: &str) -> &str {
    name.strip_prefix(EVAL_PREFIX).unwrap_or(name)
}

// ─── MetricsReport ────────────────────────────────────────────────────────────
/// Flat metric dictionary produced by one evaluation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsReport {
    values: BTreeMap<String, f64>,
}

impl MetricsReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        self.values.insert(key.into(), value);
    }

    /// Look up a metric; accepts the `eval_` prefix.
    pub fn get(&self, key: &str) -> Result<f64, PipelineError> {
        let key = resolve_metric_name(key);
        self.values
            .get(key)
            .copied()
            .ok_or_else(|| PipelineError::MissingMetric(key.to_string()))
    }

    pub fn sequential_score(&self) -> Result<f64, PipelineError> {
        self.get(SEQUENTIAL_SCORE)
    }

}

// ─── RetrievalEvaluator ───────────────────────────────────────────────────────
/// Cosine-similarity retrieval evaluator run at several truncation widths.
///
/// Queries and corpus are encoded once per call; each dimension then
/// truncates the same embeddings, re-normalises, and ranks the corpus.
/// Ties in score are broken by corpus id order.
pub struct RetrievalEvaluator {
    set:  EvaluationSet,
    dims: Vec<usize>,
}

impl RetrievalEvaluator {
    pub fn new(set: EvaluationSet, dims: Vec<usize>) -> Self {
        Self { set, dims }
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn evaluate(&self, encoder: &dyn TextEncoder) -> Result<MetricsReport> {
        let full_dim = encoder.embedding_dim();
        if let Some(&too_wide) = self.dims.iter().find(|&&d| d == 0 || d > full_dim) {
            bail!("Evaluation dimension {too_wide} is outside 1..={full_dim}");
        }

        let corpus_ids: Vec<&String>   = self.set.corpus.keys().collect();
        let corpus_texts: Vec<String>  = self.set.corpus.values().cloned().collect();
        let query_ids: Vec<&String>    = self.set.scorable_query_ids();
        let query_texts: Vec<String>   = query_ids.iter().map(|id| self.set.queries[*id].clone()).collect();

        if query_ids.is_empty() {
            tracing::warn!("No evaluation queries have relevant documents; all metrics will be 0");
        }
        tracing::info!(
            "Evaluating {} queries against {} corpus chunks at dims {:?}",
            query_ids.len(),
            corpus_ids.len(),
            self.dims,
        );

        let corpus_emb = encoder.encode(&corpus_texts)?;
        let query_emb  = encoder.encode(&query_texts)?;

        let mut report = MetricsReport::new();
        let mut primary = 0.0;

        for &dim in &self.dims {
            let corpus_t: Vec<Vec<f32>> = corpus_emb.iter().map(|v| truncate_normalize(v, dim)).collect();

            let per_query: Vec<RankingMetrics> = query_emb
                .iter()
                .zip(&query_ids)
                .map(|(q, qid)| {
                    let q = truncate_normalize(q, dim);
                    let ranked = rank_corpus(&q, &corpus_t, max_rank_depth());
                    let ranked_ids: Vec<&str> = ranked.iter().map(|&i| corpus_ids[i].as_str()).collect();
                    RankingMetrics::for_query(&ranked_ids, &self.set.relevant_docs[*qid])
                })
                .collect();

            let mean = RankingMetrics::mean(&per_query);
            for (name, value) in mean.named() {
                report.insert(metric_key(dim, name), value);
            }
            primary = mean.ndcg;
            tracing::debug!("dim {dim}: {PRIMARY_METRIC}={primary:.4}");
        }

        report.insert(SEQUENTIAL_SCORE, primary);
        Ok(report)
    }
}

/// First `dim` components, scaled to unit length (zero vectors stay zero).
fn truncate_normalize(v: &[f32], dim: usize) -> Vec<f32> {
    let head = &v[..dim.min(v.len())];
    let norm = head.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        head.iter().map(|x| x / norm).collect()
    } else {
        head.to_vec()
    }
}

/// Indices of the `top_k` corpus rows most similar to `query`, best first.
fn rank_corpus(query: &[f32], corpus: &[Vec<f32>], top_k: usize) -> Vec<usize> {
    let mut scored: Vec<(usize, f32)> = corpus
        .iter()
        .enumerate()
        .map(|(i, doc)| (i, doc.iter().zip(query).map(|(a, b)| a * b).sum()))
        .collect();
    // Stable sort keeps ascending index (corpus id order) among equal scores
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(top_k);
    scored.into_iter().map(|(i, _)| i).collect()
}
