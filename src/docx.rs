//! Plain-text extraction from Word (.docx) files.
//!
//! A DOCX file is a zip archive; the body lives in `word/document.xml`. Only
//! top-level body paragraphs are collected, paragraphs nested in tables are skipped.

use anyhow::{Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

const DOCUMENT_PART: &str = "word/document.xml";

/// Join all body paragraphs of a DOCX file with newlines
pub fn extract_paragraph_text<P: AsRef<Path>>(path: P) -> Result<String> {
    let file = File::open(path.as_ref())?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file)).context("Not a zip archive")?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .with_context(|| format!("Missing {}", DOCUMENT_PART))?
        .read_to_string(&mut xml)?;

    Ok(paragraphs_from_xml(&xml)?.join("\n"))
}

/// Collect the text of every top-level `w:p` element in document order
pub fn paragraphs_from_xml(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut paragraphs = Vec::new();
    let mut current: Option<String> = None;
    let mut table_depth = 0usize;
    let mut in_text = false;
    // Tab stops inside paragraph properties are also spelled <w:tab/>
    let mut in_properties = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"w:tbl" => table_depth += 1,
                b"w:p" if table_depth == 0 => current = Some(String::new()),
                b"w:t" => in_text = true,
                b"w:pPr" => in_properties = true,
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                if table_depth == 0 && !in_properties {
                    handle_empty(e, &mut current, &mut paragraphs);
                }
            }
            Ok(Event::Text(e)) => {
                if in_text {
                    if let Some(paragraph) = current.as_mut() {
                        paragraph.push_str(&e.unescape()?);
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"w:tbl" => table_depth = table_depth.saturating_sub(1),
                b"w:p" => {
                    if let Some(paragraph) = current.take() {
                        paragraphs.push(paragraph);
                    }
                }
                b"w:t" => in_text = false,
                b"w:pPr" => in_properties = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "XML error at position {}: {}",
                    reader.buffer_position(),
                    e
                ))
            }
            _ => {}
        }
    }

    Ok(paragraphs)
}

fn handle_empty(e: &BytesStart, current: &mut Option<String>, paragraphs: &mut Vec<String>) {
    match e.name().as_ref() {
        // <w:p/> is an empty paragraph
        b"w:p" => paragraphs.push(String::new()),
        b"w:tab" => {
            if let Some(paragraph) = current.as_mut() {
                paragraph.push('\t');
            }
        }
        b"w:br" | b"w:cr" => {
            if let Some(paragraph) = current.as_mut() {
                paragraph.push('\n');
            }
        }
        _ => {}
    }
}
