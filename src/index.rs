use anyhow::{anyhow, Result};
use log::{debug, info};

use crate::chunking::Chunk;
use crate::database::{IndexedPoint, SearchHit, VectorStore};
use crate::embeddings::{Embedder, Embedding};

/// Embedding model plus vector store: indexes chunks and answers nearest-neighbour queries
pub struct EmbeddingIndex<E, S> {
    embedder: E,
    store: S,
}

impl<E: Embedder, S: VectorStore> EmbeddingIndex<E, S> {
    pub fn new(embedder: E, store: S) -> Self {
        EmbeddingIndex { embedder, store }
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Embed texts, checking that the model returned one vector of the right size per text
    pub async fn embed(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let embeddings = self.embedder.embed(texts).await?;
        if embeddings.len() != texts.len() {
            return Err(anyhow!(
                "Embedder returned {} vectors for {} texts",
                embeddings.len(),
                texts.len()
            ));
        }

        let dimension = self.embedder.dimension();
        if let Some(bad) = embeddings.iter().find(|e| e.values.len() != dimension) {
            return Err(anyhow!(
                "Embedding dimension mismatch: expected {}, got {}",
                dimension,
                bad.values.len()
            ));
        }

        Ok(embeddings)
    }

    /// Replace the whole index with `chunks`, numbered 0.. in order
    pub async fn build_index(&mut self, chunks: Vec<Chunk>) -> Result<()> {
        self.store.recreate(self.embedder.dimension()).await?;

        let texts: Vec<&str> = chunks.iter().map(|chunk| chunk.content.as_str()).collect();
        let embeddings = self.embed(&texts).await?;

        let points: Vec<IndexedPoint> = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(idx, (chunk, embedding))| IndexedPoint {
                id: idx as u64,
                embedding,
                chunk,
            })
            .collect();

        info!("Indexing {} chunks", points.len());
        self.store.upsert(points).await
    }

    /// The `k` chunks most similar to `text`, best first
    pub async fn query(&self, text: &str, k: u64) -> Result<Vec<SearchHit>> {
        let query_embedding = self
            .embed(&[text])
            .await?
            .pop()
            .ok_or_else(|| anyhow!("Embedder returned no vector for the query"))?;

        let hits = self.store.search(&query_embedding, k).await?;
        debug!("Query returned {} hits", hits.len());
        Ok(hits)
    }
}
