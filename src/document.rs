use anyhow::{Context, Result};
use log::{debug, info, warn};
use mime_guess::from_path;
use pdf_extract::extract_text_by_pages;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::docx::extract_paragraph_text;

const PDF_MIME: &str = "application/pdf";
const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Text extracted from one PDF page or one whole DOCX file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// The extracted text
    pub content: String,
    /// File name the text came from
    pub source: String,
    /// 1-based page number (always 1 for DOCX)
    pub page: u32,
}

/// An in-memory file handed over by the UI
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        UploadedFile {
            name: name.into(),
            bytes,
        }
    }
}

/// Kinds of files the loader knows how to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
}

impl DocumentKind {
    /// Classify a path by its extension; `None` means the file is skipped
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let mime = from_path(path.as_ref()).first()?;
        match mime.essence_str() {
            PDF_MIME => Some(DocumentKind::Pdf),
            DOCX_MIME => Some(DocumentKind::Docx),
            _ => None,
        }
    }
}

/// Load every PDF/DOCX directly inside `data_dir` (non-recursive).
///
/// Files are visited in name order. A missing directory behaves like an empty one.
pub fn load_directory<P: AsRef<Path>>(data_dir: P) -> Result<Vec<Document>> {
    let dir = data_dir.as_ref();
    if !dir.is_dir() {
        warn!("Data directory {} does not exist, no documents loaded", dir.display());
        return Ok(Vec::new());
    }

    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read data directory: {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    let mut documents = Vec::new();
    for path in paths {
        documents.extend(load_file(&path)?);
    }

    info!("Loaded {} documents from {}", documents.len(), dir.display());
    Ok(documents)
}

/// Persist uploaded files to a temporary directory, then load them like files on disk.
///
/// The temporary directory is removed once loading finishes.
pub fn load_uploads(files: &[UploadedFile]) -> Result<Vec<Document>> {
    let upload_dir = tempfile::Builder::new()
        .prefix("docrag-uploads")
        .tempdir()
        .context("Failed to create upload directory")?;

    let mut documents = Vec::new();
    for file in files {
        let file_name = sanitize_file_name(&file.name);
        let path = upload_dir.path().join(&file_name);
        fs::write(&path, &file.bytes)
            .with_context(|| format!("Failed to persist upload: {}", file_name))?;

        documents.extend(load_file(&path)?);
    }

    info!("Loaded {} documents from {} uploads", documents.len(), files.len());
    Ok(documents)
}

/// Load one file. Unsupported extensions yield no documents.
pub fn load_file<P: AsRef<Path>>(file_path: P) -> Result<Vec<Document>> {
    let path = file_path.as_ref();
    let file_name = path
        .file_name()
        .context("Invalid file name")?
        .to_str()
        .context("Invalid file name encoding")?
        .to_string();

    match DocumentKind::from_path(path) {
        Some(DocumentKind::Pdf) => read_pdf_pages(path, &file_name),
        Some(DocumentKind::Docx) => read_docx(path, &file_name).map(|doc| vec![doc]),
        None => {
            debug!("Skipping unsupported file: {}", path.display());
            Ok(Vec::new())
        }
    }
}

/// One document per PDF page, numbered from 1
fn read_pdf_pages(path: &Path, file_name: &str) -> Result<Vec<Document>> {
    info!("Processing PDF document: {}", path.display());
    let pages = extract_text_by_pages(path)
        .with_context(|| format!("Failed to extract text from PDF: {}", path.display()))?;

    let documents = pages
        .iter()
        .enumerate()
        .map(|(idx, text)| {
            // PDF extraction can sometimes include excessive whitespace
            let content = normalize_whitespace(text);
            if content.is_empty() {
                warn!("Page {} of {} has no extractable text", idx + 1, file_name);
            }
            Document {
                content,
                source: file_name.to_string(),
                page: idx as u32 + 1,
            }
        })
        .collect();

    Ok(documents)
}

fn read_docx(path: &Path, file_name: &str) -> Result<Document> {
    info!("Processing DOCX document: {}", path.display());
    let content = extract_paragraph_text(path)
        .with_context(|| format!("Failed to extract text from DOCX: {}", path.display()))?;

    Ok(Document {
        content,
        source: file_name.to_string(),
        page: 1,
    })
}

/// Keep only the final path component of an uploaded name
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    if base.is_empty() || base == "." || base == ".." {
        "upload".to_string()
    } else {
        base.to_string()
    }
}

/// Normalize whitespace in text (remove multiple consecutive spaces, newlines, etc.)
fn normalize_whitespace(text: &str) -> String {
    let result = text.replace('\r', "");

    let mut prev_char = ' ';
    let mut newline_count = 0;
    let mut normalized = String::with_capacity(result.len());

    for c in result.chars() {
        if c == '\n' {
            newline_count += 1;
            continue;
        }

        if newline_count > 0 {
            // Keep at most a paragraph break
            normalized.push_str(if newline_count >= 2 { "\n\n" } else { "\n" });
            newline_count = 0;
            prev_char = '\n';
        }

        if !(c == ' ' && (prev_char == ' ' || prev_char == '\n')) {
            normalized.push(c);
        }
        prev_char = c;
    }

    normalized.trim().to_string()
}
