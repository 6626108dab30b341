use anyhow::{anyhow, Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::chunking::ChunkConfig;

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_TOP_K: u64 = 1;
const DEFAULT_MAX_NEW_TOKENS: u32 = 2000;
const DEFAULT_HASH_DIM: usize = 384;

/// Which embedding backend turns text into vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedderKind {
    Gemini,
    Local,
    Hash,
}

impl FromStr for EmbedderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(EmbedderKind::Gemini),
            "local" => Ok(EmbedderKind::Local),
            "hash" => Ok(EmbedderKind::Hash),
            other => Err(anyhow!("Unknown embedder '{}' (expected gemini, local or hash)", other)),
        }
    }
}

/// Which text generation backend answers questions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    Gemini,
    Local,
}

impl FromStr for GeneratorKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(GeneratorKind::Gemini),
            "local" => Ok(GeneratorKind::Local),
            other => Err(anyhow!("Unknown generator '{}' (expected gemini or local)", other)),
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct RagConfig {
    /// Folder scanned for .pdf/.docx files when nothing is uploaded
    pub data_dir: PathBuf,
    pub chunking: ChunkConfig,
    /// Number of nearest chunks fetched per query (only the first is used)
    pub top_k: u64,
    /// Output token budget for the answer generator
    pub max_new_tokens: u32,
    pub embedder: EmbedderKind,
    pub generator: GeneratorKind,
    /// Dimension of the offline hashing embedder
    pub hash_dim: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        RagConfig {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            chunking: ChunkConfig::default(),
            top_k: DEFAULT_TOP_K,
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
            embedder: EmbedderKind::Hash,
            generator: GeneratorKind::Gemini,
            hash_dim: DEFAULT_HASH_DIM,
        }
    }
}

impl RagConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = RagConfig::default();

        let data_dir = env::var("RAG_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let chunk_size = parse_var("RAG_CHUNK_SIZE", defaults.chunking.chunk_size())?;
        let overlap = parse_var("RAG_CHUNK_OVERLAP", defaults.chunking.overlap())?;
        let chunking = ChunkConfig::new(chunk_size, overlap)
            .context("Invalid RAG_CHUNK_SIZE / RAG_CHUNK_OVERLAP")?;

        let top_k = parse_var("RAG_TOP_K", defaults.top_k)?;
        if top_k == 0 {
            return Err(anyhow!("RAG_TOP_K must be at least 1"));
        }

        // Without an API key the hosted embedder cannot work, so fall back to hashing
        let default_embedder = if env::var("GEMINI_API_KEY").is_ok() {
            EmbedderKind::Gemini
        } else {
            EmbedderKind::Hash
        };

        Ok(RagConfig {
            data_dir,
            chunking,
            top_k,
            max_new_tokens: parse_var("RAG_MAX_NEW_TOKENS", defaults.max_new_tokens)?,
            embedder: parse_var("RAG_EMBEDDER", default_embedder)?,
            generator: parse_var("RAG_GENERATOR", defaults.generator)?,
            hash_dim: parse_var("RAG_HASH_DIM", defaults.hash_dim)?,
        })
    }
}

/// Read an environment variable, falling back to `default` when it is unset.
/// A value that is present but unparseable is an error.
pub(crate) fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("Invalid value for {}: '{}' ({})", name, raw, e)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kinds_parse_case_insensitively() {
        assert_eq!("Gemini".parse::<EmbedderKind>().unwrap(), EmbedderKind::Gemini);
        assert_eq!(" hash ".parse::<EmbedderKind>().unwrap(), EmbedderKind::Hash);
        assert_eq!("LOCAL".parse::<GeneratorKind>().unwrap(), GeneratorKind::Local);
        assert!("openai".parse::<GeneratorKind>().is_err());
    }

    #[test]
    fn test_parse_var_defaults_and_rejects_garbage() {
        env::remove_var("DOCRAG_TEST_UNSET_VAR");
        assert_eq!(parse_var("DOCRAG_TEST_UNSET_VAR", 7usize).unwrap(), 7);

        env::set_var("DOCRAG_TEST_BAD_VAR", "lots");
        assert!(parse_var("DOCRAG_TEST_BAD_VAR", 7usize).is_err());

        env::set_var("DOCRAG_TEST_GOOD_VAR", " 42 ");
        assert_eq!(parse_var("DOCRAG_TEST_GOOD_VAR", 7usize).unwrap(), 42);
    }

    #[test]
    fn test_default_config_matches_pipeline_defaults() {
        let config = RagConfig::default();
        assert_eq!(config.chunking.chunk_size(), 500);
        assert_eq!(config.chunking.overlap(), 100);
        assert_eq!(config.top_k, 1);
        assert_eq!(config.data_dir, PathBuf::from("data"));
    }
}
