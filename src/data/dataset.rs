use anyhow::Result;
use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};
use tokenizers::Tokenizer;

use crate::domain::qa_pair::QaPair;

/// BERT-convention ids; the tokenizer store reserves these slots.
pub const PAD_ID: u32 = 0;
pub const CLS_ID: u32 = 101;
pub const SEP_ID: u32 = 102;

/// Tokenise one text as `[CLS] tokens [SEP]`, truncated to `max_seq_len`.
/// Padding is left to the batcher so each batch pads to its own longest row.
pub fn encode_sequence(tokenizer: &Tokenizer, text: &str, max_seq_len: usize) -> Result<Vec<u32>> {
    let enc = tokenizer
        .encode(text, false)
        .map_err(|e| anyhow::anyhow!("Tokenisation error: {e}"))?;

    let cls = tokenizer.token_to_id("[CLS]").unwrap_or(CLS_ID);
    let sep = tokenizer.token_to_id("[SEP]").unwrap_or(SEP_ID);

    let budget = max_seq_len.saturating_sub(2);
    let mut ids = Vec::with_capacity(budget + 2);
    ids.push(cls);
    ids.extend(enc.get_ids().iter().take(budget));
    ids.push(sep);
    Ok(ids)
}

/// One tokenised training pair. The raw texts are kept for the
/// no-duplicates sampler, which compares texts rather than ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairSample {
    pub anchor:       String,
    pub positive:     String,
    pub anchor_ids:   Vec<u32>,
    pub positive_ids: Vec<u32>,
}

pub struct PairDataset {
    samples: Vec<PairSample>,
}

impl PairDataset {
    /// Tokenise the anchor and positive of every pair.
    pub fn from_pairs(pairs: &[QaPair], tokenizer: &Tokenizer, max_seq_len: usize) -> Result<Self> {
        let samples = pairs
            .iter()
            .map(|pair| {
                Ok(PairSample {
                    anchor:       pair.anchor.clone(),
                    positive:     pair.positive.clone(),
                    anchor_ids:   encode_sequence(tokenizer, &pair.anchor, max_seq_len)?,
                    positive_ids: encode_sequence(tokenizer, &pair.positive, max_seq_len)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { samples })
    }

    pub fn samples(&self) -> &[PairSample] { &self.samples }
}

impl Dataset<PairSample> for PairDataset {
    fn get(&self, index: usize) -> Option<PairSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
