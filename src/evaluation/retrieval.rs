// ============================================================
// Layer 4 — Ranking Metrics
// ============================================================
// Per-query metrics over a ranked list of corpus ids.

use std::collections::BTreeSet;

/// Cut-offs for accuracy / precision / recall.
pub const K_VALUES: [usize; 4] = [1, 3, 5, 10];
pub const MRR_AT_K: usize  = 10;
pub const NDCG_AT_K: usize = 10;
pub const MAP_AT_K: usize  = 100;

/// Metric names in report order.
pub const METRIC_NAMES: [&str; 15] = [
    "ndcg@10", "mrr@10", "map@100",
    "accuracy@1", "accuracy@3", "accuracy@5", "accuracy@10",
    "precision@1", "precision@3", "precision@5", "precision@10",
    "recall@1", "recall@3", "recall@5", "recall@10",
];

/// Longest prefix of a ranking any metric looks at.
pub fn max_rank_depth() -> usize {
    MAP_AT_K.max(NDCG_AT_K).max(MRR_AT_K).max(K_VALUES[K_VALUES.len() - 1])
}

/// Retrieval metrics for one query, or an average over many.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankingMetrics {
    pub accuracy:  [f64; 4],
    pub precision: [f64; 4],
    pub recall:    [f64; 4],
    pub mrr:       f64,
    pub ndcg:      f64,
    pub map:       f64,
}

impl RankingMetrics {
    /// Score one ranked list of corpus ids against the relevant set.
    /// `ranked` is best-first and may be shorter than any cut-off.
    pub fn for_query(ranked: &[&str], relevant: &BTreeSet<String>) -> Self {
        let hits: Vec<bool> = ranked.iter().map(|id| relevant.contains(*id)).collect();
        let hits_in = |k: usize| hits.iter().take(k).filter(|&&h| h).count();

        let mut m = Self::default();
        for (slot, &k) in K_VALUES.iter().enumerate() {
            let correct = hits_in(k);
            m.accuracy[slot]  = if correct > 0 { 1.0 } else { 0.0 };
            m.precision[slot] = correct as f64 / k as f64;
            m.recall[slot]    = correct as f64 / relevant.len().max(1) as f64;
        }

        m.mrr = hits
            .iter()
            .take(MRR_AT_K)
            .position(|&h| h)
            .map_or(0.0, |rank| 1.0 / (rank + 1) as f64);

        let predicted: Vec<f64> = hits.iter().take(NDCG_AT_K).map(|&h| if h { 1.0 } else { 0.0 }).collect();
        let ideal = vec![1.0; relevant.len()];
        let idcg  = dcg_at_k(&ideal, NDCG_AT_K);
        m.ndcg = if idcg > 0.0 { dcg_at_k(&predicted, NDCG_AT_K) / idcg } else { 0.0 };

        let mut correct = 0usize;
        let mut sum_precisions = 0.0;
        for (rank, &hit) in hits.iter().take(MAP_AT_K).enumerate() {
            if hit {
                correct += 1;
                sum_precisions += correct as f64 / (rank + 1) as f64;
            }
        }
        let denom = MAP_AT_K.min(relevant.len()).max(1);
        m.map = sum_precisions / denom as f64;

        m
    }

    /// Element-wise mean over per-query metrics. Empty input gives zeros.
    pub fn mean(per_query: &[Self]) -> Self {
        let mut acc = Self::default();
        if per_query.is_empty() {
            return acc;
        }
        for m in per_query {
            for slot in 0..K_VALUES.len() {
                acc.accuracy[slot]  += m.accuracy[slot];
                acc.precision[slot] += m.precision[slot];
                acc.recall[slot]    += m.recall[slot];
            }
            acc.mrr  += m.mrr;
            acc.ndcg += m.ndcg;
            acc.map  += m.map;
        }

        let n = per_query.len() as f64;
        for slot in 0..K_VALUES.len() {
            acc.accuracy[slot]  /= n;
            acc.precision[slot] /= n;
            acc.recall[slot]    /= n;
        }
        acc.mrr  /= n;
        acc.ndcg /= n;
        acc.map  /= n;
        acc
    }

    /// (metric name, value) pairs in `METRIC_NAMES` order.
    pub fn named(&self) -> Vec<(&'static str, f64)> {
        let mut out = vec![
            (METRIC_NAMES[0], self.ndcg),
            (METRIC_NAMES[1], self.mrr),
            (METRIC_NAMES[2], self.map),
        ];
        for slot in 0..K_VALUES.len() {
            out.push((METRIC_NAMES[3 + slot], self.accuracy[slot]));
        }
        for slot in 0..K_VALUES.len() {
            out.push((METRIC_NAMES[7 + slot], self.precision[slot]));
        }
        for slot in 0..K_VALUES.len() {
            out.push((METRIC_NAMES[11 + slot], self.recall[slot]));
        }
        out
    }
}

/// Discounted cumulative gain over the first `k` relevances.
fn dcg_at_k(relevances: &[f64], k: usize) -> f64 {
    relevances
        .iter()
        .take(k)
        .enumerate()
        .map(|(i, rel)| rel / ((i + 2) as f64).log2())
        .sum()
}
