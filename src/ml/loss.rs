// ============================================================
// Layer 5 — Matryoshka Ranking Loss
// ============================================================
// Multiple-negatives ranking loss (MNRL):
//
//   scores[i][j] = scale * cos(anchor_i, positive_j)     [B, B]
//   loss         = CrossEntropy(scores, target = i)
//
// Each anchor must pick out its own positive among all the
// positives in the batch; the other rows act as negatives for
// free. The no-duplicates sampler keeps those negatives honest.
//
// Matryoshka wrapper: the same loss is computed on the first
// d components of each embedding for every configured d, and
// the results are summed with equal weight. The model learns
// to front-load information so truncated embeddings still
// retrieve well.

use burn::{nn::loss::CrossEntropyLossConfig, prelude::*};

/// Cosine-similarity multiplier applied before the softmax
pub const DEFAULT_SCALE: f64 = 20.0;

/// Scale each row to unit L2 norm.
pub fn l2_normalize<B: Backend>(x: Tensor<B, 2>) -> Tensor<B, 2> {
    let [rows, cols] = x.dims();
    let norm = x.clone()
        .powf_scalar(2.0)
        .sum_dim(1)
        .sqrt()
        .clamp_min(1e-12)
        .expand([rows, cols]);
    x / norm
}

/// In-batch-negatives ranking loss over row-aligned anchors and positives.
pub fn multiple_negatives_ranking_loss<B: Backend>(
    anchors:   Tensor<B, 2>,
    positives: Tensor<B, 2>,
    scale:     f64,
) -> Tensor<B, 1> {
    let [batch_size, _] = anchors.dims();
    let device = anchors.device();

    let scores = l2_normalize(anchors)
        .matmul(l2_normalize(positives).transpose())
        .mul_scalar(scale); // [batch, batch]

    let targets = Tensor::<B, 1, Int>::arange(0..batch_size as i64, &device);
    CrossEntropyLossConfig::new()
        .init(&device)
        .forward(scores, targets)
}

/// Sum of the ranking loss at every truncation dimension.
///
/// Every dimension must be at most the embedding width; the
/// trainer checks this against the model before the first batch.
#[derive(Debug, Clone)]
pub struct MatryoshkaRankingLoss {
    dims: Vec<usize>,
}

impl MatryoshkaRankingLoss {
    pub fn new(dims: Vec<usize>) -> Self {
        Self { dims }
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn forward<B: Backend>(&self, anchors: Tensor<B, 2>, positives: Tensor<B, 2>) -> Tensor<B, 1> {
        let [batch_size, _] = anchors.dims();

        let per_dim = self.dims.iter().map(|&dim| {
            multiple_negatives_ranking_loss(
                anchors.clone().slice([0..batch_size, 0..dim]),
                positives.clone().slice([0..batch_size, 0..dim]),
                DEFAULT_SCALE,
            )
        });

        per_dim
            .reduce(|total, loss| total + loss)
            .unwrap_or_else(|| multiple_negatives_ranking_loss(anchors, positives, DEFAULT_SCALE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn matrix(rows: usize, cols: usize, values: &[f32]) -> Tensor<TestBackend, 2> {
        Tensor::<TestBackend, 1>::from_floats(values, &Default::default()).reshape([rows, cols])
    }

    fn scalar(t: Tensor<TestBackend, 1>) -> f64 {
        t.into_scalar().elem::<f64>()
    }

    #[test]
    fn test_matching_pairs_give_low_loss() {
        let eye = matrix(3, 3, &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        let loss = scalar(multiple_negatives_ranking_loss(eye.clone(), eye, DEFAULT_SCALE));
        assert!(loss < 1e-3, "loss {loss}");
    }

    #[test]
    fn test_swapped_pairs_give_high_loss() {
        let anchors   = matrix(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        let positives = matrix(2, 2, &[0.0, 1.0, 1.0, 0.0]);
        let loss = scalar(multiple_negatives_ranking_loss(anchors, positives, DEFAULT_SCALE));
        assert!(loss > 10.0, "loss {loss}");
    }

    #[test]
    fn test_matryoshka_sums_each_dimension() {
        let anchors   = matrix(2, 4, &[1.0, 0.5, 0.0, 0.2, 0.1, 1.0, 0.3, 0.0]);
        let positives = matrix(2, 4, &[0.9, 0.4, 0.1, 0.0, 0.0, 0.8, 0.5, 0.1]);

        let full  = scalar(multiple_negatives_ranking_loss(anchors.clone(), positives.clone(), DEFAULT_SCALE));
        let half  = scalar(multiple_negatives_ranking_loss(
            anchors.clone().slice([0..2, 0..2]),
            positives.clone().slice([0..2, 0..2]),
            DEFAULT_SCALE,
        ));
        let total = scalar(MatryoshkaRankingLoss::new(vec![4, 2]).forward(anchors, positives));
        assert!((total - (full + half)).abs() < 1e-4);
    }

    #[test]
    fn test_l2_normalize_rows() {
        let v: Vec<f32> = l2_normalize(matrix(1, 2, &[3.0, 4.0])).into_data().to_vec().unwrap();
        assert!((v[0] - 0.6).abs() < 1e-6 && (v[1] - 0.8).abs() < 1e-6);
    }
}
