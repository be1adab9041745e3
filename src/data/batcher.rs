// ============================================================
// Layer 4 — Text and Pair Batchers
// ============================================================
// Implements Burn's Batcher trait to turn token id sequences
// into tensors.
//
// Unlike fixed-length span samples, anchors and positives have
// very different lengths, so each batch is padded to the
// longest sequence *in that batch* (dynamic padding):
//
//   [CLS] when is it [SEP]            → 101 w i i 102 0 0 0
//   [CLS] the term starts on ... [SEP]→ 101 t t s o . . 102
//
// The attention mask marks real tokens with 1 and padding
// with 0; the encoder uses it both to mask attention and to
// exclude padding from mean pooling.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::{PairSample, PAD_ID};

// ─── TextBatch ────────────────────────────────────────────────────────────────
/// A padded batch of token sequences.
#[derive(Debug, Clone)]
pub struct TextBatch<B: Backend> {
    /// Token ids — shape: [batch_size, longest_seq]
    pub input_ids: Tensor<B, 2, Int>,

    /// 1 = real token, 0 = padding — shape: [batch_size, longest_seq]
    pub attention_mask: Tensor<B, 2, Int>,
}

/// Anchors and their positives, row-aligned: row i of `positives`
/// is the positive for row i of `anchors`.
#[derive(Debug, Clone)]
pub struct PairBatch<B: Backend> {
    pub anchors:   TextBatch<B>,
    pub positives: TextBatch<B>,
}

/// Pad `sequences` to their longest member and build the tensors.
pub fn pad_sequences<B: Backend>(sequences: &[&[u32]], device: &B::Device) -> TextBatch<B> {
    let batch_size = sequences.len();
    let seq_len    = sequences.iter().map(|s| s.len()).max().unwrap_or(0).max(1);

    let mut ids_flat  = Vec::with_capacity(batch_size * seq_len);
    let mut mask_flat = Vec::with_capacity(batch_size * seq_len);

    for seq in sequences {
        ids_flat.extend(seq.iter().map(|&x| x as i32));
        mask_flat.extend(std::iter::repeat(1i32).take(seq.len()));

        let pad = seq_len - seq.len();
        ids_flat.extend(std::iter::repeat(PAD_ID as i32).take(pad));
        mask_flat.extend(std::iter::repeat(0i32).take(pad));
    }

    let input_ids = Tensor::<B, 1, Int>::from_ints(ids_flat.as_slice(), device)
        .reshape([batch_size, seq_len]);
    let attention_mask = Tensor::<B, 1, Int>::from_ints(mask_flat.as_slice(), device)
        .reshape([batch_size, seq_len]);

    TextBatch { input_ids, attention_mask }
}

// ─── TextBatcher ──────────────────────────────────────────────────────────────
/// Batches plain token sequences (used when encoding the corpus and queries).
#[derive(Clone, Debug)]
pub struct TextBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> TextBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<B, Vec<u32>, TextBatch<B>> for TextBatcher<B> {
    fn batch(&self, items: Vec<Vec<u32>>, _device: &B::Device) -> TextBatch<B> {
        let refs: Vec<&[u32]> = items.iter().map(Vec::as_slice).collect();
        pad_sequences(&refs, &self.device)
    }
}

// ─── PairBatcher ──────────────────────────────────────────────────────────────
/// Batches anchor/positive samples for the contrastive loss.
#[derive(Clone, Debug)]
pub struct PairBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> PairBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<B, PairSample, PairBatch<B>> for PairBatcher<B> {
    fn batch(&self, items: Vec<PairSample>, _device: &B::Device) -> PairBatch<B> {
        let anchors: Vec<&[u32]>   = items.iter().map(|s| s.anchor_ids.as_slice()).collect();
        let positives: Vec<&[u32]> = items.iter().map(|s| s.positive_ids.as_slice()).collect();

        PairBatch {
            anchors:   pad_sequences(&anchors, &self.device),
            positives: pad_sequences(&positives, &self.device),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_pads_to_longest_in_batch() {
        let device  = Default::default();
        let batcher = TextBatcher::<TestBackend>::new(device);
        let batch   = batcher.batch(vec![vec![101, 5, 102], vec![101, 5, 6, 7, 102]], &batcher.device);

        assert_eq!(batch.input_ids.dims(), [2, 5]);
        let mask: Vec<i64> = batch.attention_mask
            .into_data()
            .convert::<i64>()
            .to_vec()
            .unwrap();
        assert_eq!(mask, vec![1, 1, 1, 0, 0, 1, 1, 1, 1, 1]);
    }

    #[test]
    fn test_pair_batch_rows_align() {
        let device  = Default::default();
        let batcher = PairBatcher::<TestBackend>::new(device);
        let sample  = |a: Vec<u32>, p: Vec<u32>| PairSample {
            anchor: String::new(), positive: String::new(), anchor_ids: a, positive_ids: p,
        };
        let batch = batcher.batch(vec![
            sample(vec![101, 1, 102], vec![101, 2, 3, 102]),
            sample(vec![101, 102],    vec![101, 4, 102]),
        ], &batcher.device);
        assert_eq!(batch.anchors.input_ids.dims(),   [2, 3]);
        assert_eq!(batch.positives.input_ids.dims(), [2, 4]);
    }
}
