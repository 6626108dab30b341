use anyhow::{anyhow, Result};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::chunking::Chunk;
use crate::embeddings::Embedding;
use crate::qdrant::QdrantStore;

/// A chunk stored in the vector index under a sequential id
#[derive(Debug, Clone)]
pub struct IndexedPoint {
    pub id: u64,
    pub embedding: Embedding,
    pub chunk: Chunk,
}

/// One nearest-neighbour result with the payload it was stored with
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: u64,
    /// Cosine similarity to the query vector
    pub score: f32,
    pub content: String,
    pub source: String,
    /// Missing when the stored payload has no page
    pub page: Option<u32>,
}

/// Storage for embedded chunks searchable by cosine similarity
#[allow(async_fn_in_trait)]
pub trait VectorStore {
    /// Drop everything stored so far and prepare for vectors of `dimension`
    async fn recreate(&mut self, dimension: usize) -> Result<()>;

    /// Insert points, replacing any with the same id
    async fn upsert(&mut self, points: Vec<IndexedPoint>) -> Result<()>;

    /// The `limit` most similar points, highest similarity first
    async fn search(&self, query: &Embedding, limit: u64) -> Result<Vec<SearchHit>>;
}

/// In-process store with brute-force cosine search
#[derive(Debug, Default)]
pub struct MemoryStore {
    dimension: usize,
    points: Vec<IndexedPoint>,
    /// Position of each id in `points`
    positions: HashMap<u64, usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl VectorStore for MemoryStore {
    async fn recreate(&mut self, dimension: usize) -> Result<()> {
        self.dimension = dimension;
        self.points.clear();
        self.positions.clear();
        Ok(())
    }

    async fn upsert(&mut self, points: Vec<IndexedPoint>) -> Result<()> {
        for point in points {
            if point.embedding.values.len() != self.dimension {
                return Err(anyhow!(
                    "Dimension mismatch: expected {}, got {}",
                    self.dimension,
                    point.embedding.values.len()
                ));
            }
            match self.positions.get(&point.id) {
                Some(&position) => self.points[position] = point,
                None => {
                    self.positions.insert(point.id, self.points.len());
                    self.points.push(point);
                }
            }
        }
        Ok(())
    }

    async fn search(&self, query: &Embedding, limit: u64) -> Result<Vec<SearchHit>> {
        let mut scored: Vec<(f32, &IndexedPoint)> = self
            .points
            .iter()
            .map(|point| (cosine_similarity(&query.values, &point.embedding.values), point))
            .collect();

        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(limit as usize)
            .map(|(score, point)| SearchHit {
                id: point.id,
                score,
                content: point.chunk.content.clone(),
                source: point.chunk.source.clone(),
                page: Some(point.chunk.page),
            })
            .collect())
    }
}

/// Cosine similarity; 0 for mismatched, empty or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot_product = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;

    for (x, y) in a.iter().zip(b.iter()) {
        dot_product += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = (norm_a * norm_b).sqrt();
    if denominator == 0.0 {
        return 0.0;
    }

    dot_product / denominator
}

/// Vector store chosen at startup
pub enum StoreBackend {
    Memory(MemoryStore),
    Qdrant(QdrantStore),
}

impl VectorStore for StoreBackend {
    async fn recreate(&mut self, dimension: usize) -> Result<()> {
        match self {
            StoreBackend::Memory(store) => store.recreate(dimension).await,
            StoreBackend::Qdrant(store) => store.recreate(dimension).await,
        }
    }

    async fn upsert(&mut self, points: Vec<IndexedPoint>) -> Result<()> {
        match self {
            StoreBackend::Memory(store) => store.upsert(points).await,
            StoreBackend::Qdrant(store) => store.upsert(points).await,
        }
    }

    async fn search(&self, query: &Embedding, limit: u64) -> Result<Vec<SearchHit>> {
        match self {
            StoreBackend::Memory(store) => store.search(query, limit).await,
            StoreBackend::Qdrant(store) => store.search(query, limit).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: u64, values: Vec<f32>, source: &str) -> IndexedPoint {
        IndexedPoint {
            id,
            embedding: Embedding { values },
            chunk: Chunk {
                content: format!("chunk {}", id),
                source: source.to_string(),
                page: id as u32 + 1,
            },
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 3.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let mut store = MemoryStore::new();
        store.recreate(2).await.unwrap();
        store
            .upsert(vec![
                point(0, vec![0.0, 1.0], "a.pdf"),
                point(1, vec![1.0, 0.1], "b.pdf"),
                point(2, vec![1.0, 1.0], "c.pdf"),
            ])
            .await
            .unwrap();

        let hits = store.search(&Embedding { values: vec![1.0, 0.0] }, 2).await.unwrap();
        let ids: Vec<u64> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(hits[0].source, "b.pdf");
        assert_eq!(hits[0].page, Some(2));
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_empty_store_returns_no_hits() {
        let mut store = MemoryStore::new();
        store.recreate(3).await.unwrap();
        let hits = store.search(&Embedding { values: vec![1.0, 0.0, 0.0] }, 1).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_recreate_discards_previous_points() {
        let mut store = MemoryStore::new();
        store.recreate(2).await.unwrap();
        store.upsert(vec![point(0, vec![1.0, 0.0], "old.pdf")]).await.unwrap();
        assert_eq!(store.len(), 1);

        store.recreate(2).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_id_and_checks_dimension() {
        let mut store = MemoryStore::new();
        store.recreate(2).await.unwrap();
        store.upsert(vec![point(0, vec![1.0, 0.0], "old.pdf")]).await.unwrap();
        store.upsert(vec![point(0, vec![0.0, 1.0], "new.pdf")]).await.unwrap();
        assert_eq!(store.len(), 1);

        let hits = store.search(&Embedding { values: vec![0.0, 1.0] }, 5).await.unwrap();
        assert_eq!(hits[0].source, "new.pdf");

        let err = store.upsert(vec![point(1, vec![1.0, 0.0, 0.0], "x.pdf")]).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_replaced_point_keeps_its_position() {
        let mut store = MemoryStore::new();
        store.recreate(2).await.unwrap();
        store
            .upsert(vec![
                point(0, vec![1.0, 0.0], "a.pdf"),
                point(1, vec![1.0, 0.0], "b.pdf"),
                point(2, vec![1.0, 0.0], "c.pdf"),
            ])
            .await
            .unwrap();
        store
            .upsert(vec![point(1, vec![1.0, 0.0], "b2.pdf"), point(3, vec![1.0, 0.0], "d.pdf")])
            .await
            .unwrap();
        assert_eq!(store.len(), 4);

        // Equal scores come back in insertion order
        let hits = store.search(&Embedding { values: vec![1.0, 0.0] }, 10).await.unwrap();
        let sources: Vec<&str> = hits.iter().map(|h| h.source.as_str()).collect();
        assert_eq!(sources, vec!["a.pdf", "b2.pdf", "c.pdf", "d.pdf"]);

        store.recreate(2).await.unwrap();
        store.upsert(vec![point(1, vec![0.0, 1.0], "fresh.pdf")]).await.unwrap();
        assert_eq!(store.len(), 1);
    }
}
