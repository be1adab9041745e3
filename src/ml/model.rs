use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct EncoderConfig {
    pub vocab_size:  usize,
    #[config(default = 128)]
    pub max_seq_len: usize,
    #[config(default = 256)]
    pub d_model:     usize,
    #[config(default = 4)]
    pub num_heads:   usize,
    #[config(default = 4)]
    pub num_layers:  usize,
    #[config(default = 1024)]
    pub d_ff:        usize,
    #[config(default = 0.1)]
    pub dropout:     f64,
}

impl EncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> EmbeddingEncoder<B> {
        let token_embedding    = EmbeddingConfig::new(self.vocab_size, self.d_model).init(device);
        let position_embedding = EmbeddingConfig::new(self.max_seq_len, self.d_model).init(device);
        let layers: Vec<EncoderBlock<B>> = (0..self.num_layers)
            .map(|_| self.build_encoder_block(device))
            .collect();
        let final_norm = LayerNormConfig::new(self.d_model).init(device);
        let dropout    = DropoutConfig::new(self.dropout).init();
        EmbeddingEncoder {
            token_embedding, position_embedding, layers,
            final_norm, dropout,
            d_model: self.d_model,
        }
    }

    fn build_encoder_block<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        let self_attn   = MultiHeadAttentionConfig::new(self.d_model, self.num_heads)
            .with_dropout(self.dropout)
            .init(device);
        let ffn_linear1 = LinearConfig::new(self.d_model, self.d_ff).init(device);
        let ffn_linear2 = LinearConfig::new(self.d_ff, self.d_model).init(device);
        let norm1   = LayerNormConfig::new(self.d_model).init(device);
        let norm2   = LayerNormConfig::new(self.d_model).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        EncoderBlock { self_attn, ffn_linear1, ffn_linear2, norm1, norm2, dropout }
    }
}

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    /// `pad_mask` is true at padding positions, which attention ignores.
    pub fn forward(&self, x: Tensor<B, 3>, pad_mask: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let attn_output = self.self_attn
            .forward(MhaInput::self_attn(x.clone()).mask_pad(pad_mask))
            .context;
        let x = self.norm1.forward(x + self.dropout.forward(attn_output));
        let ffn_out = self.ffn_linear2.forward(
            burn::tensor::activation::gelu(self.ffn_linear1.forward(x.clone()))
        );
        self.norm2.forward(x + self.dropout.forward(ffn_out))
    }
}

#[derive(Module, Debug)]
pub struct EmbeddingEncoder<B: Backend> {
    pub token_embedding:    Embedding<B>,
    pub position_embedding: Embedding<B>,
    pub layers:             Vec<EncoderBlock<B>>,
    pub final_norm:         LayerNorm<B>,
    pub dropout:            Dropout,
    pub d_model:            usize,
}

impl<B: Backend> EmbeddingEncoder<B> {
    /// input_ids, attention_mask: [batch, seq_len] → embeddings: [batch, d_model]
    pub fn forward(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
    ) -> Tensor<B, 2> {
        let [batch_size, seq_len] = input_ids.dims();

        let tok_emb = self.token_embedding.forward(input_ids);

        // Self-attention is permutation-invariant, so position must be injected explicitly.
        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &tok_emb.device())
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        let pos_emb = self.position_embedding.forward(positions);

        let pad_mask = attention_mask.clone().equal_elem(0);

        let mut x = self.dropout.forward(tok_emb + pos_emb);
        for layer in &self.layers {
            x = layer.forward(x, pad_mask.clone());
        }
        let x = self.final_norm.forward(x); // [batch, seq_len, d_model]

        mean_pool(x, attention_mask)
    }
}

/// Average token states over real (mask = 1) positions only.
pub fn mean_pool<B: Backend>(hidden: Tensor<B, 3>, attention_mask: Tensor<B, 2, Int>) -> Tensor<B, 2> {
    let [batch_size, seq_len, d_model] = hidden.dims();

    let mask = attention_mask
        .float()
        .unsqueeze_dim::<3>(2)
        .expand([batch_size, seq_len, d_model]);

    let summed = (hidden * mask.clone()).sum_dim(1).reshape([batch_size, d_model]);
    let counts = mask.sum_dim(1).reshape([batch_size, d_model]).clamp_min(1e-9);

    summed / counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn tiny_config() -> EncoderConfig {
        EncoderConfig::new(50)
            .with_max_seq_len(8)
            .with_d_model(16)
            .with_num_heads(2)
            .with_num_layers(1)
            .with_d_ff(32)
            .with_dropout(0.0)
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model: EmbeddingEncoder<TestBackend> = tiny_config().init(&device);

        let ids  = Tensor::<TestBackend, 1, Int>::from_ints([101, 5, 6, 102, 101, 7, 102, 0].as_slice(), &device)
            .reshape([2, 4]);
        let mask = Tensor::<TestBackend, 1, Int>::from_ints([1, 1, 1, 1, 1, 1, 1, 0].as_slice(), &device)
            .reshape([2, 4]);

        let emb = model.forward(ids, mask);
        assert_eq!(emb.dims(), [2, 16]);
    }

    #[test]
    fn test_mean_pool_ignores_padding() {
        let device = Default::default();
        // One sequence of 3 positions, the last is padding holding a large value
        let hidden = Tensor::<TestBackend, 1>::from_floats([1.0, 2.0, 3.0, 4.0, 100.0, 100.0].as_slice(), &device)
            .reshape([1, 3, 2]);
        let mask = Tensor::<TestBackend, 1, Int>::from_ints([1, 1, 0].as_slice(), &device)
            .reshape([1, 3]);

        let pooled: Vec<f32> = mean_pool(hidden, mask).into_data().to_vec().unwrap();
        assert_eq!(pooled, vec![2.0, 3.0]);
    }

    #[test]
    fn test_padding_does_not_change_embedding() {
        let device = Default::default();
        let model: EmbeddingEncoder<TestBackend> = tiny_config().init(&device);

        let short_ids  = Tensor::<TestBackend, 1, Int>::from_ints([101, 5, 102].as_slice(), &device).reshape([1, 3]);
        let short_mask = Tensor::<TestBackend, 1, Int>::from_ints([1, 1, 1].as_slice(), &device).reshape([1, 3]);
        let long_ids   = Tensor::<TestBackend, 1, Int>::from_ints([101, 5, 102, 0, 0].as_slice(), &device).reshape([1, 5]);
        let long_mask  = Tensor::<TestBackend, 1, Int>::from_ints([1, 1, 1, 0, 0].as_slice(), &device).reshape([1, 5]);

        let a: Vec<f32> = model.forward(short_ids, short_mask).into_data().to_vec().unwrap();
        let b: Vec<f32> = model.forward(long_ids, long_mask).into_data().to_vec().unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-4, "{x} vs {y}");
        }
    }
}
