use anyhow::Result;
use log::debug;

use crate::gemini::GeminiClient;
use crate::local::LocalModelClient;

/// Marker after which the model's answer starts
pub const ANSWER_MARKER: &str = "Answer:";

/// A causal text model that continues a prompt
#[allow(async_fn_in_trait)]
pub trait Generator {
    /// Continue `prompt` deterministically, emitting at most `max_new_tokens` tokens
    async fn generate(&self, prompt: &str, max_new_tokens: u32) -> Result<String>;
}

/// Generation backend chosen at startup
pub enum GenerationBackend {
    Gemini(GeminiClient),
    Local(LocalModelClient),
}

impl Generator for GenerationBackend {
    async fn generate(&self, prompt: &str, max_new_tokens: u32) -> Result<String> {
        match self {
            GenerationBackend::Gemini(client) => client.generate(prompt, max_new_tokens).await,
            GenerationBackend::Local(client) => client.generate(prompt, max_new_tokens).await,
        }
    }
}

/// Fill the fixed question-answering template
pub fn build_prompt(query: &str, context: &str) -> String {
    format!(
        "You are a helpful assistant. Use only the information provided in the context below to answer the question.\n\nContext:\n{}\n\nQuestion: {}\n{}",
        context, query, ANSWER_MARKER
    )
}

/// Text after the last `Answer:` marker, or the whole output, trimmed
pub fn extract_answer(decoded: &str) -> &str {
    match decoded.rfind(ANSWER_MARKER) {
        Some(pos) => decoded[pos + ANSWER_MARKER.len()..].trim(),
        None => decoded.trim(),
    }
}

/// Answers a question from a single retrieved context
pub struct AnswerGenerator<G> {
    generator: G,
    max_new_tokens: u32,
}

impl<G: Generator> AnswerGenerator<G> {
    pub fn new(generator: G, max_new_tokens: u32) -> Self {
        AnswerGenerator {
            generator,
            max_new_tokens,
        }
    }

    pub async fn generate_answer(&self, query: &str, context: &str) -> Result<String> {
        let prompt = build_prompt(query, context);
        let decoded = self.generator.generate(&prompt, self.max_new_tokens).await?;
        debug!("Model produced {} characters", decoded.len());
        Ok(extract_answer(&decoded).to_string())
    }
}
