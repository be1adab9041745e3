// ============================================================
// Layer 4 — No-Duplicates Batch Sampler
// ============================================================
// The ranking loss treats every other positive in a batch as a
// negative for each anchor. If the same text appears twice in
// one batch, a "negative" is actually a positive and the loss
// pushes apart two identical embeddings.
//
// This sampler walks a shuffled index order and fills each
// batch greedily, skipping any row whose anchor or positive is
// already in the current batch. Skipped rows stay in the pool
// for later batches. The last batch may be short; nothing is
// dropped.
//
// Every pass removes at least one row (the first remaining row
// always fits an empty batch), so the loop terminates.

use rand::{seq::SliceRandom, Rng};
use std::collections::HashSet;

use crate::data::dataset::PairSample;

pub struct NoDuplicatesBatchSampler {
    batch_size: usize,
}

impl NoDuplicatesBatchSampler {
    pub fn new(batch_size: usize) -> Self {
        Self { batch_size: batch_size.max(1) }
    }

    /// Produce one epoch of index batches over `samples`.
    pub fn batches<R: Rng + ?Sized>(&self, samples: &[PairSample], rng: &mut R) -> Vec<Vec<usize>> {
        let mut remaining: Vec<usize> = (0..samples.len()).collect();
        remaining.shuffle(rng);

        let mut batches = Vec::new();
        while !remaining.is_empty() {
            let mut seen: HashSet<&str> = HashSet::new();
            let mut batch = Vec::with_capacity(self.batch_size);

            for &index in &remaining {
                let sample = &samples[index];
                if seen.contains(sample.anchor.as_str()) || seen.contains(sample.positive.as_str()) {
                    continue;
                }
                batch.push(index);
                if batch.len() == self.batch_size {
                    break;
                }
                seen.insert(sample.anchor.as_str());
                seen.insert(sample.positive.as_str());
            }

            let taken: HashSet<usize> = batch.iter().copied().collect();
            remaining.retain(|i| !taken.contains(i));
            batches.push(batch);
        }

        batches
    }

    /// Upper-bound estimate of batches per epoch, used for the LR schedule.
    pub fn estimated_batches(&self, n_samples: usize) -> usize {
        n_samples.div_ceil(self.batch_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::splitter::pipeline_rng;

    fn sample(anchor: &str, positive: &str) -> PairSample {
        PairSample {
            anchor:       anchor.to_string(),
            positive:     positive.to_string(),
            anchor_ids:   vec![],
            positive_ids: vec![],
        }
    }

    #[test]
    fn test_every_index_used_once() {
        let samples: Vec<PairSample> = (0..23)
            .map(|i| sample(&format!("q{i}"), &format!("p{i}")))
            .collect();
        let batches = NoDuplicatesBatchSampler::new(5).batches(&samples, &mut pipeline_rng(Some(3)));

        let mut all: Vec<usize> = batches.iter().flatten().copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..23).collect::<Vec<_>>());
        assert!(batches.iter().all(|b| b.len() <= 5));
        assert_eq!(batches.len(), 5);
    }

    #[test]
    fn test_no_duplicate_texts_within_a_batch() {
        // Four questions about the same chunk: they share one positive
        let mut samples: Vec<PairSample> = (0..4)
            .map(|i| sample(&format!("question {i}"), "shared chunk"))
            .collect();
        samples.push(sample("other", "other chunk"));

        let batches = NoDuplicatesBatchSampler::new(4).batches(&samples, &mut pipeline_rng(Some(11)));
        for batch in &batches {
            let shared = batch.iter().filter(|&&i| samples[i].positive == "shared chunk").count();
            assert!(shared <= 1, "batch {batch:?} repeats a positive");
        }
        assert_eq!(batches.iter().map(Vec::len).sum::<usize>(), 5);
    }

    #[test]
    fn test_estimated_batches_rounds_up() {
        assert_eq!(NoDuplicatesBatchSampler::new(4).estimated_batches(9), 3);
        assert_eq!(NoDuplicatesBatchSampler::new(4).estimated_batches(0), 0);
    }
}
