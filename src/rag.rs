use anyhow::{Context, Result};
use log::info;
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use tokio::task;

use crate::answer::{AnswerGenerator, GenerationBackend, Generator};
use crate::chunking::chunk_documents;
use crate::config::{EmbedderKind, GeneratorKind, RagConfig};
use crate::database::{MemoryStore, StoreBackend, VectorStore};
use crate::document::{load_directory, load_uploads, Document, UploadedFile};
use crate::embeddings::{Embedder, EmbeddingBackend, HashEmbedder};
use crate::gemini::{GeminiClient, GeminiConfig};
use crate::index::EmbeddingIndex;
use crate::local::{LocalModelClient, LocalModelConfig};
use crate::qdrant::{QdrantConfig, QdrantStore};

/// Returned when retrieval finds nothing to answer from
pub const NOT_FOUND_ANSWER: &str = "Answer not found in the documents.";

/// Answer text plus the citation of the chunk it was generated from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RagAnswer {
    pub answer: String,
    pub source: Option<String>,
}

impl RagAnswer {
    fn not_found() -> Self {
        RagAnswer {
            answer: NOT_FOUND_ANSWER.to_string(),
            source: None,
        }
    }
}

/// `"<source> | Page <page>"`, with `?` for an unknown page
pub fn format_citation(source: &str, page: Option<u32>) -> String {
    match page {
        Some(page) => format!("{} | Page {}", source, page),
        None => format!("{} | Page ?", source),
    }
}

/// RAG (Retrieval-Augmented Generation) pipeline
pub struct RagPipeline<E, G, S> {
    config: RagConfig,
    index: EmbeddingIndex<E, S>,
    answerer: AnswerGenerator<G>,
}

/// Pipeline over the backends selectable at runtime
pub type DefaultPipeline = RagPipeline<EmbeddingBackend, GenerationBackend, StoreBackend>;

impl<E: Embedder, G: Generator, S: VectorStore> RagPipeline<E, G, S> {
    /// Create a new RAG pipeline
    pub fn new(config: RagConfig, embedder: E, generator: G, store: S) -> Self {
        let answerer = AnswerGenerator::new(generator, config.max_new_tokens);
        RagPipeline {
            config,
            index: EmbeddingIndex::new(embedder, store),
            answerer,
        }
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Answer one query: load, chunk, rebuild the index, retrieve, generate.
    ///
    /// Uploaded files replace the data directory when any are given. Finding
    /// nothing is not an error; backend failures are.
    pub async fn answer(&mut self, query: &str, uploads: &[UploadedFile]) -> Result<RagAnswer> {
        let documents = load_documents(self.config.data_dir.clone(), uploads.to_vec()).await?;

        let chunks = chunk_documents(&documents, &self.config.chunking);
        self.index
            .build_index(chunks)
            .await
            .context("Failed to build vector index")?;

        let hits = self.index.query(query, self.config.top_k).await?;
        let Some(top) = hits.into_iter().next() else {
            info!("No relevant information found for query");
            return Ok(RagAnswer::not_found());
        };

        info!(
            "Answering from {} (score {:.3})",
            format_citation(&top.source, top.page),
            top.score
        );
        let answer = self
            .answerer
            .generate_answer(query, &top.content)
            .await
            .context("Failed to generate answer")?;

        Ok(RagAnswer {
            answer,
            source: Some(format_citation(&top.source, top.page)),
        })
    }

    /// Interactive question loop over the data directory
    pub async fn run_query_loop(&mut self) -> Result<()> {
        println!(
            "Ready to answer questions about {}. Type 'exit' to quit.",
            self.config.data_dir.display()
        );

        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let mut buffer = String::new();

        loop {
            print!("\nYour question: ");
            stdout.flush()?;

            buffer.clear();
            if stdin.read_line(&mut buffer)? == 0 {
                break;
            }

            let question = buffer.trim();

            if question.to_lowercase() == "exit" {
                println!("Goodbye!");
                break;
            }
            if question.is_empty() {
                continue;
            }

            let result = self.answer(question, &[]).await?;
            println!("\n{}", result.answer);
            if let Some(source) = result.source {
                println!("Source: {}", source);
            }
        }

        Ok(())
    }
}

/// Parse the uploads, or the data directory when there are none, off the async workers
async fn load_documents(data_dir: PathBuf, uploads: Vec<UploadedFile>) -> Result<Vec<Document>> {
    task::spawn_blocking(move || {
        if uploads.is_empty() {
            load_directory(&data_dir)
        } else {
            load_uploads(&uploads)
        }
    })
    .await
    .context("Document loading task failed")?
}

/// Build the pipeline with the backends named in `config` and the environment
pub fn build_pipeline(config: RagConfig) -> Result<DefaultPipeline> {
    let embedder = match config.embedder {
        EmbedderKind::Gemini => EmbeddingBackend::Gemini(GeminiClient::new(
            GeminiConfig::from_env().context("Gemini embedder selected")?,
        )),
        EmbedderKind::Local => {
            EmbeddingBackend::Local(LocalModelClient::new(LocalModelConfig::from_env()?))
        }
        EmbedderKind::Hash => EmbeddingBackend::Hash(HashEmbedder::new(config.hash_dim)),
    };

    let generator = match config.generator {
        GeneratorKind::Gemini => GenerationBackend::Gemini(GeminiClient::new(
            GeminiConfig::from_env().context("Gemini generator selected")?,
        )),
        GeneratorKind::Local => {
            GenerationBackend::Local(LocalModelClient::new(LocalModelConfig::from_env()?))
        }
    };

    let store = match QdrantConfig::from_env() {
        Some(qdrant_config) => {
            info!("Using Qdrant at {}", qdrant_config.url);
            StoreBackend::Qdrant(QdrantStore::new(qdrant_config)?)
        }
        None => StoreBackend::Memory(MemoryStore::new()),
    };

    info!(
        "Pipeline: embedder={:?} generator={:?} data_dir={}",
        config.embedder,
        config.generator,
        config.data_dir.display()
    );
    Ok(RagPipeline::new(config, embedder, generator, store))
}
