// ============================================================
// Layer 5 — Embedder
// ============================================================
// Adapts a Burn encoder + tokenizer to the domain TextEncoder
// trait. Texts are tokenised, batched with dynamic padding,
// run through the encoder, and copied back to host memory.
//
// Use it with a model on a non-autodiff backend (e.g. the
// result of `model.valid()`): no graph is recorded and
// dropout is inactive.

use anyhow::Result;
use burn::{data::dataloader::batcher::Batcher, prelude::*};
use tokenizers::Tokenizer;

use crate::data::{batcher::TextBatcher, dataset::encode_sequence};
use crate::domain::traits::TextEncoder;
use crate::ml::model::EmbeddingEncoder;

pub struct Embedder<B: Backend> {
    model:       EmbeddingEncoder<B>,
    tokenizer:   Tokenizer,
    batcher:     TextBatcher<B>,
    max_seq_len: usize,
    batch_size:  usize,
}

impl<B: Backend> Embedder<B> {
    pub fn new(
        model:       EmbeddingEncoder<B>,
        tokenizer:   Tokenizer,
        device:      B::Device,
        max_seq_len: usize,
        batch_size:  usize,
    ) -> Self {
        Self {
            model,
            tokenizer,
            batcher: TextBatcher::new(device),
            max_seq_len,
            batch_size: batch_size.max(1),
        }
    }
}

impl<B: Backend> TextEncoder for Embedder<B> {
    fn embedding_dim(&self) -> usize {
        self.model.d_model
    }

    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let dim = self.embedding_dim();
        let mut out = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(self.batch_size) {
            let ids = chunk
                .iter()
                .map(|t| encode_sequence(&self.tokenizer, t, self.max_seq_len))
                .collect::<Result<Vec<_>>>()?;

            let batch = self.batcher.batch(ids, &self.batcher.device);
            let embeddings = self.model.forward(batch.input_ids, batch.attention_mask);

            let flat: Vec<f32> = embeddings
                .into_data()
                .convert::<f32>()
                .to_vec::<f32>()
                .map_err(|e| anyhow::anyhow!("Cannot read embeddings back from device: {e:?}"))?;

            out.extend(flat.chunks(dim).map(<[f32]>::to_vec));
        }

        tracing::debug!("Encoded {} texts", out.len());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::tokenizer_store::{model_vocab_size, TokenizerStore};
    use crate::ml::model::EncoderConfig;
    use burn::backend::NdArray;

    #[test]
    fn test_encode_preserves_order_and_width() {
        let dir   = tempfile::tempdir().unwrap();
        let texts: Vec<String> = ["alpha beta", "gamma", "delta epsilon zeta"]
            .iter().map(|s| s.to_string()).collect();
        let tokenizer = TokenizerStore::new(dir.path()).load_or_build(&texts, 200).unwrap();

        let device = Default::default();
        let model = EncoderConfig::new(model_vocab_size(&tokenizer))
            .with_max_seq_len(8)
            .with_d_model(8)
            .with_num_heads(2)
            .with_num_layers(1)
            .with_d_ff(16)
            .init::<NdArray>(&device);

        // Batch size 2 forces two forward passes with different padding
        let embedder = Embedder::new(model, tokenizer, device, 8, 2);
        let all = embedder.encode(&texts).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|v| v.len() == 8));

        let single = embedder.encode(&texts[2..].to_vec()).unwrap();
        for (x, y) in all[2].iter().zip(&single[0]) {
            assert!((x - y).abs() < 1e-4);
        }
    }
}
