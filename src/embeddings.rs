use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::hash::Hasher;
use twox_hash::XxHash64;

use crate::gemini::GeminiClient;
use crate::local::LocalModelClient;

/// Representation of a vector embedding
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
}

/// Anything that maps text to fixed-dimension vectors
#[allow(async_fn_in_trait)]
pub trait Embedder {
    /// Length of every vector this embedder produces
    fn dimension(&self) -> usize;

    /// Embed each text, preserving input order
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Embedding>>;
}

/// Offline embedder based on feature hashing of lowercase word tokens.
///
/// Deterministic and dependency-free at runtime; texts sharing words land close
/// together under cosine similarity.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        HashEmbedder { dim: dim.max(1) }
    }

    pub fn embed_text(&self, text: &str) -> Embedding {
        let mut values = vec![0f32; self.dim];

        for token in tokenize(text) {
            let mut hasher = XxHash64::with_seed(0);
            hasher.write(token.as_bytes());
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            // Top bit picks the sign so unrelated tokens cancel out on average
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            values[idx] += sign;
        }

        let norm = values.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut values {
                *x /= norm;
            }
        }

        Embedding { values }
    }
}

impl Embedder for HashEmbedder {
    fn dimension(&self) -> usize {
        self.dim
    }

    async fn embed(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

/// Embedding backend chosen at startup
pub enum EmbeddingBackend {
    Gemini(GeminiClient),
    Local(LocalModelClient),
    Hash(HashEmbedder),
}

impl Embedder for EmbeddingBackend {
    fn dimension(&self) -> usize {
        match self {
            EmbeddingBackend::Gemini(client) => Embedder::dimension(client),
            EmbeddingBackend::Local(client) => Embedder::dimension(client),
            EmbeddingBackend::Hash(embedder) => embedder.dimension(),
        }
    }

    async fn embed(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        match self {
            EmbeddingBackend::Gemini(client) => client.embed(texts).await,
            EmbeddingBackend::Local(client) => client.embed(texts).await,
            EmbeddingBackend::Hash(embedder) => embedder.embed(texts).await,
        }
    }
}
