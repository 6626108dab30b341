use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::env;

use crate::answer::Generator;
use crate::embeddings::{Embedder, Embedding};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const EMBEDDING_MODEL: &str = "models/text-embedding-004";
const GENERATION_MODEL: &str = "models/gemini-2.0-flash";
/// Output dimension of text-embedding-004
const EMBEDDING_DIM: usize = 768;

/// Configuration for Gemini API
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub embeddings_url: String,
    pub generate_url: String,
}

impl GeminiConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("GEMINI_API_KEY").context("GEMINI_API_KEY not set")?;
        let embeddings_url = env::var("GEMINI_EMBEDDINGS_URL")
            .unwrap_or_else(|_| format!("{}/{}:embedContent", DEFAULT_BASE_URL, EMBEDDING_MODEL));
        let generate_url = env::var("GEMINI_GENERATE_URL")
            .unwrap_or_else(|_| format!("{}/{}:generateContent", DEFAULT_BASE_URL, GENERATION_MODEL));

        Ok(GeminiConfig {
            api_key,
            embeddings_url,
            generate_url,
        })
    }
}

/// Client for interacting with Gemini API
#[derive(Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(config: GeminiConfig) -> Self {
        let client = reqwest::Client::new();
        GeminiClient { config, client }
    }

    /// Get the client configuration
    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    /// Generate embeddings for a text
    pub async fn get_embedding(&self, text: &str) -> Result<Embedding> {
        let request = EmbeddingRequest {
            model: EMBEDDING_MODEL,
            content: EmbeddingContent {
                parts: vec![Part { text }],
            },
        };

        let url = format!("{}?key={}", self.config.embeddings_url, self.config.api_key);

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow::anyhow!(
                "API request failed: {} {}",
                status,
                error_text
            ));
        }

        let response_data: EmbeddingResponse = response.json().await?;

        Ok(Embedding {
            values: response_data.embedding.values,
        })
    }

    /// Generate text with greedy decoding (temperature 0, top-k 1)
    pub async fn generate_text(&self, prompt: &str, max_output_tokens: u32) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content::new_with_role(prompt, "user")],
            generation_config: GenerationConfig::greedy(max_output_tokens),
        };

        let url = format!("{}?key={}", self.config.generate_url, self.config.api_key);

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow::anyhow!("API request failed: {}", error_text));
        }

        let response_data: GenerateResponse = response.json().await?;

        // Extract the generated text from the response
        response_data
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<String>()
            })
            .ok_or_else(|| anyhow::anyhow!("No response generated"))
    }
}

impl Embedder for GeminiClient {
    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }

    async fn embed(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.get_embedding(text).await?);
        }
        debug!("Embedded {} texts with Gemini", embeddings.len());
        Ok(embeddings)
    }
}

impl Generator for GeminiClient {
    async fn generate(&self, prompt: &str, max_new_tokens: u32) -> Result<String> {
        self.generate_text(prompt, max_new_tokens).await
    }
}

// Shared request/response structures for the Gemini API

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'static str,
    content: EmbeddingContent<'a>,
}

#[derive(Serialize)]
struct EmbeddingContent<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Deserialize, Debug)]
struct EmbeddingResponse {
    embedding: EmbeddingData,
}

#[derive(Deserialize, Debug)]
struct EmbeddingData {
    values: Vec<f32>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
    role: &'static str,
}

impl<'a> Content<'a> {
    fn new_with_role(text: &'a str, role: &'static str) -> Self {
        Content {
            parts: vec![Part { text }],
            role,
        }
    }
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize, Debug, PartialEq)]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: u32,
}

impl GenerationConfig {
    fn greedy(max_output_tokens: u32) -> Self {
        GenerationConfig {
            temperature: 0.0,
            top_p: 1.0,
            top_k: 1,
            max_output_tokens,
        }
    }
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Deserialize, Debug)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generate_request_uses_greedy_decoding() {
        let request = GenerateRequest {
            contents: vec![Content::new_with_role("hi", "user")],
            generation_config: GenerationConfig::greedy(64),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "contents": [{"parts": [{"text": "hi"}], "role": "user"}],
                "generation_config": {
                    "temperature": 0.0,
                    "top_p": 1.0,
                    "top_k": 1,
                    "max_output_tokens": 64
                }
            })
        );
    }

    #[test]
    fn test_response_parts_are_joined() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"Answer: "},{"text":"42"}]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(raw).unwrap();
        let text: String = parsed.candidates[0]
            .content
            .parts
            .iter()
            .map(|p| p.text.as_str())
            .collect();
        assert_eq!(text, "Answer: 42");
    }
}
