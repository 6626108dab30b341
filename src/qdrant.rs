use anyhow::{Context, Result};
use log::{debug, info};
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, ScoredPoint, SearchPointsBuilder,
    UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::json;
use std::env;

use crate::database::{IndexedPoint, SearchHit, VectorStore};
use crate::embeddings::Embedding;

const DEFAULT_COLLECTION: &str = "docs";

/// Configuration for Qdrant
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
}

impl QdrantConfig {
    /// Configuration from environment variables, `None` when `QDRANT_URL` is unset
    pub fn from_env() -> Option<Self> {
        let url = env::var("QDRANT_URL").ok()?;
        let api_key = env::var("QDRANT_API_KEY").ok();
        let collection =
            env::var("QDRANT_COLLECTION").unwrap_or_else(|_| DEFAULT_COLLECTION.to_string());

        Some(QdrantConfig {
            url,
            api_key,
            collection,
        })
    }
}

/// Vector store backed by a single Qdrant collection
pub struct QdrantStore {
    client: Qdrant,
    collection: String,
}

impl QdrantStore {
    /// Create a new Qdrant client
    pub fn new(config: QdrantConfig) -> Result<Self> {
        let config_builder = Qdrant::from_url(&config.url);
        let config_builder = if let Some(api_key) = config.api_key {
            config_builder.api_key(api_key)
        } else {
            config_builder
        };

        let client = config_builder
            .build()
            .context("Failed to initialize Qdrant client")?;

        Ok(QdrantStore {
            client,
            collection: config.collection,
        })
    }

    /// Check if the collection exists
    pub async fn collection_exists(&self) -> Result<bool> {
        self.client
            .collection_exists(self.collection.clone())
            .await
            .with_context(|| format!("Failed to check collection {}", self.collection))
    }
}

impl VectorStore for QdrantStore {
    async fn recreate(&mut self, dimension: usize) -> Result<()> {
        if self.collection_exists().await? {
            debug!("Dropping existing collection {}", self.collection);
            self.client
                .delete_collection(self.collection.clone())
                .await
                .with_context(|| format!("Failed to delete collection {}", self.collection))?;
        }

        let create_collection = CreateCollectionBuilder::new(self.collection.clone())
            .vectors_config(VectorParamsBuilder::new(dimension as u64, Distance::Cosine));

        self.client
            .create_collection(create_collection)
            .await
            .with_context(|| format!("Failed to create collection {}", self.collection))?;

        info!("Created collection {} ({} dims)", self.collection, dimension);
        Ok(())
    }

    async fn upsert(&mut self, points: Vec<IndexedPoint>) -> Result<()> {
        // Qdrant rejects an upsert without points
        if points.is_empty() {
            return Ok(());
        }

        let points = points
            .into_iter()
            .map(|point| {
                let payload = Payload::try_from(json!({
                    "content": point.chunk.content,
                    "source": point.chunk.source,
                    "page": point.chunk.page,
                }))?;
                Ok(PointStruct::new(point.id, point.embedding.values, payload))
            })
            .collect::<Result<Vec<PointStruct>>>()?;

        let upsert_request = UpsertPointsBuilder::new(self.collection.clone(), points).wait(true);

        self.client
            .upsert_points(upsert_request)
            .await
            .with_context(|| {
                format!("Failed to upsert points in collection {}", self.collection)
            })?;

        Ok(())
    }

    async fn search(&self, query: &Embedding, limit: u64) -> Result<Vec<SearchHit>> {
        let search_request =
            SearchPointsBuilder::new(self.collection.clone(), query.values.clone(), limit)
                .with_payload(true);

        let search_response = self
            .client
            .search_points(search_request)
            .await
            .with_context(|| format!("Failed to search collection {}", self.collection))?;

        Ok(search_response
            .result
            .into_iter()
            .filter_map(hit_from_scored_point)
            .collect())
    }
}

/// Convert a scored point back into a hit; points without text are dropped
fn hit_from_scored_point(scored_point: ScoredPoint) -> Option<SearchHit> {
    let payload = scored_point.payload;
    let content = payload.get("content")?.as_str()?.to_string();
    let source = payload
        .get("source")
        .and_then(|v| v.as_str())
        .cloned()
        .unwrap_or_default();
    let page = payload
        .get("page")
        .and_then(|v| v.as_integer())
        .and_then(|v| u32::try_from(v).ok());

    let id = match scored_point.id.and_then(|id| id.point_id_options) {
        Some(PointIdOptions::Num(num)) => num,
        _ => 0,
    };

    Some(SearchHit {
        id,
        score: scored_point.score,
        content,
        source,
        page,
    })
}
