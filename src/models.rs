//! Core data models used throughout lexchunk.
//!
//! These types represent the documents, extraction results, chunks, and
//! per-run accounting that flow through the normalization pipeline.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// Container format of a source document, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Pdf,
    StatuteJson,
    StatuteXml,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "json" => Some(DocumentKind::StatuteJson),
            "xml" => Some(DocumentKind::StatuteXml),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::StatuteJson => "statute_json",
            DocumentKind::StatuteXml => "statute_xml",
        }
    }
}

/// A filesystem-resident input artifact. Read-only.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub name: String,
    pub kind: Option<DocumentKind>,
}

impl SourceDocument {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let kind = DocumentKind::from_path(&path);
        Self { path, name, kind }
    }
}

/// Output of the extraction layer.
///
/// `raw_text` is `None` when neither the native text layer nor OCR produced
/// any usable text. It is never `Some("")`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    pub raw_text: Option<String>,
    pub used_fallback: bool,
}

/// A chunk of a document's cleaned text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub text: String,
    pub char_count: usize,
    pub word_count: usize,
    pub chunk_index: usize,
    pub section_title: Option<String>,
    pub section_index: Option<usize>,
    pub is_section_derived: bool,
    pub hash: String,
    pub metadata: Map<String, Value>,
}

/// Why a document ended in `recorded_failure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Structural,
    ExtractionMiss,
    Ocr,
    Chunking,
    Io,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Structural => "structural",
            FailureKind::ExtractionMiss => "extraction_miss",
            FailureKind::Ocr => "ocr",
            FailureKind::Chunking => "chunking",
            FailureKind::Io => "io",
        }
    }
}

/// Result of processing one [`SourceDocument`].
///
/// Either `success` with at least one chunk, or not `success` with an
/// `error`. Build it through [`ProcessingRecord::succeeded`] or
/// [`ProcessingRecord::failed`].
#[derive(Debug, Clone)]
pub struct ProcessingRecord {
    pub file_name: String,
    pub success: bool,
    pub chunks: Vec<Chunk>,
    pub error: Option<String>,
    pub failure: Option<FailureKind>,
    pub used_ocr: bool,
    pub metadata: Map<String, Value>,
}

impl ProcessingRecord {
    /// Successful record. An empty chunk list is downgraded to a chunking
    /// failure so a document never counts as a silent success.
    pub fn succeeded(
        file_name: &str,
        chunks: Vec<Chunk>,
        used_ocr: bool,
        metadata: Map<String, Value>,
    ) -> Self {
        if chunks.is_empty() {
            return Self::failed(
                file_name,
                FailureKind::Chunking,
                "Chunking produced no chunks",
                used_ocr,
            );
        }
        Self {
            file_name: file_name.to_string(),
            success: true,
            chunks,
            error: None,
            failure: None,
            used_ocr,
            metadata,
        }
    }

    pub fn failed(
        file_name: &str,
        kind: FailureKind,
        error: impl Into<String>,
        used_ocr: bool,
    ) -> Self {
        Self {
            file_name: file_name.to_string(),
            success: false,
            chunks: Vec::new(),
            error: Some(error.into()),
            failure: Some(kind),
            used_ocr,
            metadata: Map::new(),
        }
    }
}

/// Cumulative counters for one pass over a document collection.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub pillar: String,
    pub total_files: usize,
    pub processed: usize,
    pub good_files: usize,
    pub bad_files: usize,
    pub total_chunks: usize,
    pub ocr_files: usize,
    pub error_list: Vec<(String, String)>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    pub fn new(pillar: &str, total_files: usize) -> Self {
        Self {
            pillar: pillar.to_string(),
            total_files,
            processed: 0,
            good_files: 0,
            bad_files: 0,
            total_chunks: 0,
            ocr_files: 0,
            error_list: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn record_success(&mut self, chunks: usize, used_ocr: bool) {
        self.processed += 1;
        self.good_files += 1;
        self.total_chunks += chunks;
        if used_ocr {
            self.ocr_files += 1;
        }
    }

    pub fn record_failure(&mut self, file_name: &str, error: &str, used_ocr: bool) {
        self.processed += 1;
        self.bad_files += 1;
        if used_ocr {
            self.ocr_files += 1;
        }
        self.error_list
            .push((file_name.to_string(), error.to_string()));
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}

/// One JSONL line written to the output sink.
#[derive(Debug, Clone, Serialize)]
pub struct OutputRecord {
    pub text: String,
    pub metadata: Map<String, Value>,
}

impl OutputRecord {
    pub fn from_chunk(chunk: &Chunk, file_name: &str, pillar: &str, used_ocr: bool) -> Self {
        let mut metadata = chunk.metadata.clone();
        metadata.insert("source_file".into(), Value::from(file_name));
        metadata.insert("chunk_id".into(), Value::from(chunk.chunk_index));
        metadata.insert("pillar".into(), Value::from(pillar));
        metadata.insert("used_ocr".into(), Value::from(used_ocr));
        metadata.insert("char_count".into(), Value::from(chunk.char_count));
        metadata.insert("word_count".into(), Value::from(chunk.word_count));
        metadata.insert("hash".into(), Value::from(chunk.hash.as_str()));
        metadata.insert(
            "is_section_derived".into(),
            Value::from(chunk.is_section_derived),
        );
        if let Some(title) = &chunk.section_title {
            metadata.insert("section_title".into(), Value::from(title.as_str()));
        }
        if let Some(idx) = chunk.section_index {
            metadata.insert("section_index".into(), Value::from(idx));
        }
        Self {
            text: chunk.text.clone(),
            metadata,
        }
    }
}
