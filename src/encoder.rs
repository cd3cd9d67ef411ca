//! # Query encoder
//!
//! Turns text into a dense vector in the same space as the stored corpus.
//!
//! [`SentenceEmbeddingsModel`] runs a BERT sentence-transformer with Candle
//! (pure Rust, CPU): tokenize, forward pass, attention-masked mean pooling,
//! L2 normalisation. Weights, tokenizer and config are fetched from the
//! Hugging Face Hub on first use and cached by `hf-hub`.
//!
//! The rest of the crate only sees the [`TextEncoder`] trait, so the session
//! can check `dimension()` against the corpus before any query is run.
//!
//! ```no_run
//! use embedding_atlas::encoder::{SentenceEmbeddingsModel, TextEncoder};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let model = SentenceEmbeddingsModel::load("sentence-transformers/all-MiniLM-L6-v2", "main")?;
//! let v = model.encode("Rust is great!")?;
//! assert_eq!(v.len(), model.dimension());
//! # Ok(()) }
//! ```

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, DTYPE};
use hf_hub::{Repo, RepoType, api::sync::Api};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::error::AtlasError;

/// Default model: 384-dimensional MiniLM sentence embeddings.
pub const DEFAULT_MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Anything that maps text to a fixed-length vector.
pub trait TextEncoder {
    /// Length of every vector [`encode`](TextEncoder::encode) returns.
    fn dimension(&self) -> usize;

    fn encode(&self, text: &str) -> Result<Vec<f32>, AtlasError>;
}

/// Sentence embeddings model using Candle (pure Rust)
pub struct SentenceEmbeddingsModel {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dimension: usize,
}

impl SentenceEmbeddingsModel {
    /// Load a BERT-family sentence-transformer from the Hugging Face Hub.
    ///
    /// # Errors
    /// [`AtlasError::Encoder`] if the download, tokenizer or weights fail to load.
    pub fn load(model_id: &str, revision: &str) -> Result<Self, AtlasError> {
        let device = Device::Cpu;
        info!(model_id, revision, "loading sentence embedding model");

        let repo = Repo::with_revision(model_id.to_string(), RepoType::Model, revision.to_string());
        let api = Api::new().map_err(encoder_err)?;
        let api_repo = api.repo(repo);

        let config_filename = api_repo.get("config.json").map_err(encoder_err)?;
        let tokenizer_filename = api_repo.get("tokenizer.json").map_err(encoder_err)?;
        let weights_filename = api_repo.get("model.safetensors").map_err(encoder_err)?;

        let raw = std::fs::read_to_string(config_filename)?;
        let config: Config = serde_json::from_str(&raw).map_err(encoder_err)?;
        let dimension = hidden_size(&raw)?;

        let tokenizer = Tokenizer::from_file(tokenizer_filename)
            .map_err(|e| AtlasError::Encoder(format!("failed to load tokenizer: {e}")))?;

        // SAFETY: the safetensors file is owned by the hf-hub cache and not
        // modified while mapped.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_filename], DTYPE, &device)? };
        let model = BertModel::load(vb, &config)?;

        debug!(dimension, "model ready");
        Ok(Self {
            model,
            tokenizer,
            device,
            dimension,
        })
    }

    /// Mean pooling over token embeddings, considering attention mask
    fn mean_pooling(&self, embeddings: &Tensor, attention_mask: &[u32]) -> Result<Tensor, AtlasError> {
        // embeddings: [1, seq_len, hidden]; mask: [1, seq_len, 1]
        let mask = Tensor::new(attention_mask, &self.device)?
            .to_dtype(DType::F32)?
            .unsqueeze(0)?
            .unsqueeze(2)?;

        let sum = embeddings.broadcast_mul(&mask)?.sum(1)?;
        let count = mask.sum(1)?.clamp(1f32, f32::INFINITY)?;
        Ok(sum.broadcast_div(&count)?.squeeze(0)?)
    }

    /// L2 normalize the embedding vector
    fn normalize(&self, tensor: &Tensor) -> Result<Tensor, AtlasError> {
        let norm = tensor.sqr()?.sum_all()?.sqrt()?;
        Ok(tensor.broadcast_div(&norm)?)
    }
}

impl TextEncoder for SentenceEmbeddingsModel {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn encode(&self, text: &str) -> Result<Vec<f32>, AtlasError> {
        let tokens = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| AtlasError::Encoder(format!("tokenization error: {e}")))?;

        let token_ids = Tensor::new(tokens.get_ids(), &self.device)?.unsqueeze(0)?;
        let token_type_ids = Tensor::new(tokens.get_type_ids(), &self.device)?.unsqueeze(0)?;

        let output = self.model.forward(&token_ids, &token_type_ids, None)?;
        let pooled = self.mean_pooling(&output, tokens.get_attention_mask())?;
        let embedding = self.normalize(&pooled)?;

        Ok(embedding.to_vec1::<f32>()?)
    }
}

/// Output dimensionality, read from the raw `config.json`.
fn hidden_size(raw_config: &str) -> Result<usize, AtlasError> {
    let value: serde_json::Value = serde_json::from_str(raw_config).map_err(encoder_err)?;
    value
        .get("hidden_size")
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .ok_or_else(|| AtlasError::Encoder("model config has no hidden_size".into()))
}

fn encoder_err(e: impl std::fmt::Display) -> AtlasError {
    AtlasError::Encoder(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_size_from_config() {
        let raw = r#"{"hidden_size": 1024, "num_attention_heads": 16}"#;
        assert_eq!(hidden_size(raw).unwrap(), 1024);
        assert!(hidden_size("{}").is_err());
    }

    #[test]
    #[ignore = "downloads model weights from the Hugging Face Hub"]
    fn test_encode_dimension_and_norm() -> Result<(), AtlasError> {
        let model = SentenceEmbeddingsModel::load(DEFAULT_MODEL_ID, "main")?;
        assert_eq!(model.dimension(), 384);

        let v = model.encode("Rust is cool.")?;
        assert_eq!(v.len(), 384);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
        Ok(())
    }
}
