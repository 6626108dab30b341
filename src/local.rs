//! Client for a locally served model behind an OpenAI-compatible HTTP API
//! (llama.cpp, mistral.rs, text-embeddings-inference, ...).
//!
//! Generation goes through `/completions` rather than the chat endpoint so the
//! model continues the raw prompt, like a plain causal language model.

use anyhow::{anyhow, Context, Result};
use log::debug;
use serde::Deserialize;
use serde_json::{json, Value};
use std::env;

use crate::answer::Generator;
use crate::config::parse_var;
use crate::embeddings::{Embedder, Embedding};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080/v1";
const DEFAULT_COMPLETION_MODEL: &str = "tiiuae/falcon-rw-1b";
const DEFAULT_EMBEDDING_MODEL: &str = "BAAI/bge-small-en";
const DEFAULT_EMBEDDING_DIM: usize = 384;

/// Configuration for the local model server
#[derive(Debug, Clone)]
pub struct LocalModelConfig {
    pub base_url: String,
    pub completion_model: String,
    pub embedding_model: String,
    pub embedding_dim: usize,
}

impl Default for LocalModelConfig {
    fn default() -> Self {
        LocalModelConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            completion_model: DEFAULT_COMPLETION_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dim: DEFAULT_EMBEDDING_DIM,
        }
    }
}

impl LocalModelConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = LocalModelConfig::default();
        Ok(LocalModelConfig {
            base_url: env::var("LOCAL_MODEL_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            completion_model: env::var("LOCAL_COMPLETION_MODEL")
                .unwrap_or(defaults.completion_model),
            embedding_model: env::var("LOCAL_EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            embedding_dim: parse_var("LOCAL_EMBEDDING_DIM", defaults.embedding_dim)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct LocalModelClient {
    config: LocalModelConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    text: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

impl LocalModelClient {
    pub fn new(config: LocalModelConfig) -> Self {
        LocalModelClient {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn completion_request(&self, prompt: &str, max_tokens: u32) -> Value {
        json!({
            "model": self.config.completion_model,
            "prompt": prompt,
            "max_tokens": max_tokens,
            "temperature": 0.0,
            "top_p": 1.0,
            "n": 1,
            "stream": false
        })
    }

    async fn post_json(&self, path: &str, payload: &Value) -> Result<reqwest::Response> {
        let url = format!("{}/{}", self.config.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .with_context(|| format!("Failed to reach local model server at {}", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!("Local model request failed: {} {}", status, error_text));
        }

        Ok(response)
    }

    /// Continue `prompt` with greedy decoding
    pub async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let payload = self.completion_request(prompt, max_tokens);
        let response: CompletionResponse = self.post_json("completions", &payload).await?.json().await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.text)
            .ok_or_else(|| anyhow!("No choices returned from local model server"))
    }
}

impl Embedder for LocalModelClient {
    fn dimension(&self) -> usize {
        self.config.embedding_dim
    }

    async fn embed(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let payload = json!({
            "model": self.config.embedding_model,
            "input": texts,
        });
        let response: EmbeddingsResponse = self.post_json("embeddings", &payload).await?.json().await?;
        let embeddings = order_embeddings(response, texts.len())?;

        debug!("Embedded {} texts with {}", embeddings.len(), self.config.embedding_model);
        Ok(embeddings)
    }
}

impl Generator for LocalModelClient {
    async fn generate(&self, prompt: &str, max_new_tokens: u32) -> Result<String> {
        self.complete(prompt, max_new_tokens).await
    }
}

/// Servers may return items out of order; put them back by `index`
fn order_embeddings(response: EmbeddingsResponse, expected: usize) -> Result<Vec<Embedding>> {
    if response.data.len() != expected {
        return Err(anyhow!(
            "Expected {} embeddings, server returned {}",
            expected,
            response.data.len()
        ));
    }

    let mut items = response.data;
    items.sort_by_key(|item| item.index);
    Ok(items
        .into_iter()
        .map(|item| Embedding {
            values: item.embedding,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_request_is_greedy_single_prompt() {
        let client = LocalModelClient::new(LocalModelConfig::default());
        let request = client.completion_request("Question: x\nAnswer:", 2000);

        assert_eq!(request["model"], "tiiuae/falcon-rw-1b");
        assert_eq!(request["prompt"], "Question: x\nAnswer:");
        assert_eq!(request["max_tokens"], 2000);
        assert_eq!(request["temperature"], 0.0);
        assert_eq!(request["n"], 1);
    }

    #[test]
    fn test_embeddings_are_reordered_by_index() {
        let raw = r#"{"data":[{"index":1,"embedding":[0.0,1.0]},{"index":0,"embedding":[1.0,0.0]}]}"#;
        let response: EmbeddingsResponse = serde_json::from_str(raw).unwrap();
        let embeddings = order_embeddings(response, 2).unwrap();
        assert_eq!(embeddings[0].values, vec![1.0, 0.0]);
        assert_eq!(embeddings[1].values, vec![0.0, 1.0]);
    }

    #[test]
    fn test_embedding_count_mismatch_is_an_error() {
        let raw = r#"{"data":[{"index":0,"embedding":[1.0]}]}"#;
        let response: EmbeddingsResponse = serde_json::from_str(raw).unwrap();
        assert!(order_embeddings(response, 2).is_err());
    }
}
