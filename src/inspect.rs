//! Single-document inspection.
//!
//! Runs one file through the same processor a batch would use and prints
//! the outcome. Used by `lexchunk inspect` to debug extraction and chunking
//! on a specific document without writing any output file.

use anyhow::{bail, Result};
use std::path::Path;

use crate::config::Config;
use crate::models::{OutputRecord, ProcessingRecord, SourceDocument};
use crate::processor::DocumentProcessor;

const PREVIEW_CHARS: usize = 160;

/// Process `path` with the settings of `pillar` (or defaults when omitted).
///
/// Returns the pillar label used together with the record.
pub fn inspect_document(
    config: &Config,
    path: &Path,
    pillar: Option<&str>,
) -> Result<(String, ProcessingRecord)> {
    let label = match pillar {
        Some(name) => match config.pillars.get(name) {
            Some(p) => p.label_or(name).to_string(),
            None => bail!("Unknown pillar: '{}'", name),
        },
        None => "inspect".to_string(),
    };

    let processor = DocumentProcessor::from_config(config, &label)?;
    let record = processor.process(&SourceDocument::from_path(path));
    Ok((label, record))
}

/// CLI entry point. Prints the record summary, or JSONL lines with `json`.
pub fn run_inspect(config: &Config, path: &Path, pillar: Option<&str>, json: bool) -> Result<()> {
    let (pillar_label, record) = inspect_document(config, path, pillar)?;

    if !record.success {
        bail!(
            "{} failed ({}): {}",
            record.file_name,
            record.failure.map(|k| k.as_str()).unwrap_or("unknown"),
            record.error.as_deref().unwrap_or("unknown error")
        );
    }

    if json {
        for chunk in &record.chunks {
            let line = OutputRecord::from_chunk(chunk, &record.file_name, &pillar_label, record.used_ocr);
            println!("{}", serde_json::to_string(&line)?);
        }
        return Ok(());
    }

    println!("--- Document ---");
    println!("file:         {}", record.file_name);
    println!("pillar:       {}", pillar_label);
    println!("used_ocr:     {}", record.used_ocr);
    println!("chunks:       {}", record.chunks.len());
    for (key, value) in &record.metadata {
        println!("{:<13} {}", format!("{}:", key), value);
    }
    println!();

    println!("--- Chunks ({}) ---", record.chunks.len());
    for chunk in &record.chunks {
        match &chunk.section_title {
            Some(title) => println!(
                "[chunk {}] {} chars, section \"{}\"",
                chunk.chunk_index, chunk.char_count, title
            ),
            None => println!("[chunk {}] {} chars", chunk.chunk_index, chunk.char_count),
        }
        println!("{}", preview(&chunk.text));
        println!();
    }

    Ok(())
}

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        out.push('…');
    }
    out
}
