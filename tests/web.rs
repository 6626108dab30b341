mod common;

use anyhow::{anyhow, Result};
use axum::http::StatusCode;
use tokio::sync::Mutex;

use docrag::answer::Generator;
use docrag::config::RagConfig;
use docrag::database::MemoryStore;
use docrag::embeddings::HashEmbedder;
use docrag::rag::RagPipeline;
use docrag::session::{ChatSession, Role};
use docrag::web::submit_query;

use common::write_docx;

/// Echoes the prompt followed by a fixed continuation
struct EchoGenerator(&'static str);

impl Generator for EchoGenerator {
    async fn generate(&self, prompt: &str, _max_new_tokens: u32) -> Result<String> {
        Ok(format!("{}{}", prompt, self.0))
    }
}

struct FailingGenerator;

impl Generator for FailingGenerator {
    async fn generate(&self, _prompt: &str, _max_new_tokens: u32) -> Result<String> {
        Err(anyhow!("model unavailable"))
    }
}

fn pipeline<G: Generator>(
    dir: &std::path::Path,
    generator: G,
) -> Mutex<RagPipeline<HashEmbedder, G, MemoryStore>> {
    let config = RagConfig {
        data_dir: dir.to_path_buf(),
        ..RagConfig::default()
    };
    Mutex::new(RagPipeline::new(
        config,
        HashEmbedder::new(384),
        generator,
        MemoryStore::new(),
    ))
}

#[tokio::test]
async fn test_submitted_query_appends_one_exchange() {
    let dir = tempfile::tempdir().unwrap();
    write_docx(dir.path(), "boiling.docx", &["Water boils at 100 degrees."]);
    let pipeline = pipeline(dir.path(), EchoGenerator(" 100 degrees"));
    let session = Mutex::new(ChatSession::new());

    submit_query(&pipeline, &session, "  When does water boil?  ", &[], "09:30 AM")
        .await
        .unwrap();

    let session = session.lock().await;
    let messages = session.messages();
    assert_eq!(messages.len(), 2);

    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].text, "When does water boil?");
    assert_eq!(messages[0].time, "09:30 AM");

    assert_eq!(messages[1].role, Role::Bot);
    assert_eq!(messages[1].text, "100 degrees");
    assert_eq!(messages[1].source.as_deref(), Some("boiling.docx | Page 1"));
}

#[tokio::test]
async fn test_blank_query_leaves_transcript_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    write_docx(dir.path(), "boiling.docx", &["Water boils at 100 degrees."]);
    let pipeline = pipeline(dir.path(), EchoGenerator(" 100 degrees"));
    let session = Mutex::new(ChatSession::new());

    submit_query(&pipeline, &session, "", &[], "09:30 AM").await.unwrap();
    submit_query(&pipeline, &session, "   \n\t", &[], "09:31 AM").await.unwrap();

    assert!(session.lock().await.messages().is_empty());
}

#[tokio::test]
async fn test_not_found_answer_is_recorded_without_citation() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(dir.path(), EchoGenerator(" unused"));
    let session = Mutex::new(ChatSession::new());

    submit_query(&pipeline, &session, "Anything there?", &[], "10:00 PM")
        .await
        .unwrap();

    let session = session.lock().await;
    assert_eq!(session.messages().len(), 2);
    assert_eq!(session.messages()[1].text, "Answer not found in the documents.");
    assert_eq!(session.messages()[1].source, None);
}

#[tokio::test]
async fn test_failed_query_returns_500_and_records_nothing() {
    let dir = tempfile::tempdir().unwrap();
    write_docx(dir.path(), "boiling.docx", &["Water boils at 100 degrees."]);
    let pipeline = pipeline(dir.path(), FailingGenerator);
    let session = Mutex::new(ChatSession::new());

    let (status, body) = submit_query(&pipeline, &session, "When does water boil?", &[], "09:30 AM")
        .await
        .unwrap_err();

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("model unavailable"));
    assert!(session.lock().await.messages().is_empty());
}
