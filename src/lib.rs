pub mod answer;
pub mod chunking;
pub mod config;
pub mod database;
pub mod document;
pub mod docx;
pub mod embeddings;
pub mod gemini;
pub mod index;
pub mod local;
pub mod qdrant;
pub mod rag;
pub mod session;
pub mod web;
