//! Local BERT embeddings via Candle
//!
//! Weights, config and tokenizer are fetched from the HuggingFace Hub on first
//! use and cached by `hf-hub`. Inference is CPU-bound, so `embed_batch` runs
//! on the blocking pool.

use super::Embedder;
use crate::errors::{RagError, Result};
use anyhow::Context;
use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};
use hf_hub::{api::sync::Api, Repo, RepoType};
use std::sync::Arc;
use tokenizers::Tokenizer;

pub const DEFAULT_CANDLE_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

struct Inner {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

/// Sentence embedder running a BERT-family model in process
pub struct CandleEmbedder {
    inner: Arc<Inner>,
    model_id: String,
}

impl CandleEmbedder {
    /// Download (if needed) and load a model from the Hub
    ///
    /// Blocking; call from `spawn_blocking` inside async code.
    pub fn load(model_id: &str) -> Result<Self> {
        Self::load_inner(model_id).map_err(|e| {
            RagError::EmbeddingFailure(format!("failed to load {}: {:#}", model_id, e))
        })
    }

    fn load_inner(model_id: &str) -> anyhow::Result<Self> {
        let device = Device::Cpu;

        let api = Api::new().context("Failed to create HuggingFace API client")?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

        let config_path = repo.get("config.json").context("Failed to download model config")?;
        let tokenizer_path = repo.get("tokenizer.json").context("Failed to download tokenizer")?;
        let weights_path = repo
            .get("model.safetensors")
            .context("Failed to download model weights")?;

        let config: Config = serde_json::from_str(
            &std::fs::read_to_string(config_path).context("Failed to read config file")?,
        )
        .context("Failed to parse model config")?;

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;

        // SAFETY: the safetensors file is owned by the hf-hub cache and not mutated while mapped
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)
                .context("Failed to load model weights")?
        };
        let model = BertModel::load(vb, &config).context("Failed to create BERT model")?;

        Ok(Self {
            inner: Arc::new(Inner {
                model,
                tokenizer,
                device,
            }),
            model_id: format!("candle:{}", model_id),
        })
    }
}

impl Inner {
    fn embed_batch(&self, texts: Vec<String>) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts, true)
            .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;

        let batch_size = encodings.len();
        let max_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);

        let mut flat_ids = vec![0u32; batch_size * max_len];
        let mut flat_mask = vec![0u32; batch_size * max_len];
        for (row, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let offset = row * max_len;
            flat_ids[offset..offset + ids.len()].copy_from_slice(ids);
            flat_mask[offset..offset + mask.len()].copy_from_slice(mask);
        }

        let token_ids = Tensor::from_vec(flat_ids, (batch_size, max_len), &self.device)?;
        let attention_mask = Tensor::from_vec(flat_mask, (batch_size, max_len), &self.device)?;
        let token_type_ids = token_ids.zeros_like()?;

        let hidden = self
            .model
            .forward(&token_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = mean_pool(&hidden, &attention_mask)?;
        let normalized = pooled.broadcast_div(&pooled.sqr()?.sum_keepdim(1)?.sqrt()?.clamp(1e-12, f64::MAX)?)?;

        Ok(normalized.to_vec2::<f32>()?)
    }
}

/// Mean over the sequence axis, ignoring padding
fn mean_pool(hidden: &Tensor, attention_mask: &Tensor) -> anyhow::Result<Tensor> {
    let mask = attention_mask
        .unsqueeze(2)?
        .expand(hidden.shape())?
        .to_dtype(hidden.dtype())?;

    let summed = (hidden * &mask)?.sum(1)?;
    let counts = mask.sum(1)?.clamp(1e-9, f64::MAX)?;
    Ok(summed.broadcast_div(&counts)?)
}

#[async_trait]
impl Embedder for CandleEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let inner = Arc::clone(&self.inner);
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || inner.embed_batch(texts))
            .await
            .map_err(|e| RagError::EmbeddingFailure(format!("embedding task failed: {}", e)))?
            .map_err(|e| RagError::EmbeddingFailure(format!("{:#}", e)))
    }
}
