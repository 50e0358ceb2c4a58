//! Per-document processing: validate → extract → clean → chunk.
//!
//! [`DocumentProcessor::process`] never returns an error. Every failure is
//! classified into a [`FailureKind`] and captured in the returned
//! [`ProcessingRecord`], so one bad file cannot stop a batch.

use std::panic::{self, AssertUnwindSafe};

use anyhow::Result;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::chunk::{Chunker, SectionSpan};
use crate::clean::clean_text;
use crate::config::Config;
use crate::extract::{ExtractError, Extractor};
use crate::metadata::{legal_metadata, pdf_metadata};
use crate::models::{Chunk, DocumentKind, FailureKind, ProcessingRecord, SourceDocument};
use crate::statute;

pub const NO_TEXT_ERROR: &str = "No text extracted (even with OCR)";

#[derive(Debug, Clone)]
pub struct ProcessorOptions {
    /// Label written into every chunk's metadata.
    pub pillar: String,
    pub strict_validation: bool,
    pub legal_metadata: bool,
}

pub struct DocumentProcessor {
    chunker: Chunker,
    extractor: Extractor,
    options: ProcessorOptions,
}

struct Failure {
    kind: FailureKind,
    message: String,
    used_ocr: bool,
}

impl Failure {
    fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            used_ocr: false,
        }
    }

    fn with_ocr(mut self, used_ocr: bool) -> Self {
        self.used_ocr = used_ocr;
        self
    }
}

struct Outcome {
    chunks: Vec<Chunk>,
    used_ocr: bool,
    metadata: Map<String, Value>,
}

impl DocumentProcessor {
    pub fn new(chunker: Chunker, extractor: Extractor, options: ProcessorOptions) -> Self {
        Self {
            chunker,
            extractor,
            options,
        }
    }

    pub fn from_config(config: &Config, pillar: &str) -> Result<Self> {
        let chunker = Chunker::new(
            config.chunking.strategy,
            config.chunking.chunker_config(),
        )?;
        let extractor = Extractor::new(&config.ocr);
        Ok(Self::new(
            chunker,
            extractor,
            ProcessorOptions {
                pillar: pillar.to_string(),
                strict_validation: config.processing.strict_validation,
                legal_metadata: config.processing.legal_metadata,
            },
        ))
    }

    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    pub fn pillar(&self) -> &str {
        &self.options.pillar
    }

    pub fn process(&self, doc: &SourceDocument) -> ProcessingRecord {
        let outcome = match doc.kind {
            Some(DocumentKind::Pdf) => self.process_pdf(doc),
            Some(kind @ (DocumentKind::StatuteJson | DocumentKind::StatuteXml)) => {
                self.process_statute(doc, kind)
            }
            None => Err(Failure::new(
                FailureKind::Structural,
                format!("Unsupported file type: {}", doc.name),
            )),
        };

        match outcome {
            Ok(out) => {
                debug!(file = %doc.name, chunks = out.chunks.len(), used_ocr = out.used_ocr, "processed");
                ProcessingRecord::succeeded(&doc.name, out.chunks, out.used_ocr, out.metadata)
            }
            Err(f) => {
                warn!(file = %doc.name, kind = f.kind.as_str(), error = %f.message, "document failed");
                ProcessingRecord::failed(&doc.name, f.kind, f.message, f.used_ocr)
            }
        }
    }

    fn process_pdf(&self, doc: &SourceDocument) -> Result<Outcome, Failure> {
        let bytes = read(doc)?;

        let pdf = guarded(|| lopdf::Document::load_mem(&bytes))
            .map_err(|panic| {
                Failure::new(
                    FailureKind::Structural,
                    format!("Invalid PDF file: parser panicked: {}", panic),
                )
            })?
            .map_err(|e| {
                Failure::new(FailureKind::Structural, format!("Invalid PDF file: {}", e))
            })?;
        if pdf.get_pages().is_empty() {
            return Err(Failure::new(
                FailureKind::Structural,
                "Invalid PDF file: document has no pages",
            ));
        }

        let extraction = self.extractor.extract(doc, &bytes).map_err(|e| match e {
            ExtractError::EngineUnavailable(_) => Failure::new(FailureKind::Ocr, e.to_string()),
            ExtractError::Ocr(_) => Failure::new(FailureKind::Ocr, e.to_string()).with_ocr(true),
        })?;
        let used_ocr = extraction.used_fallback;

        let cleaned = extraction
            .raw_text
            .map(|raw| clean_text(&raw))
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                Failure::new(FailureKind::ExtractionMiss, NO_TEXT_ERROR).with_ocr(used_ocr)
            })?;

        let mut metadata = self.base_metadata(doc, DocumentKind::Pdf, used_ocr);
        match guarded(|| pdf_metadata(&doc.path, &pdf)) {
            Ok(info) => metadata.extend(info),
            Err(panic) => {
                warn!(file = %doc.name, error = %panic, "PDF metadata walk panicked, skipping it")
            }
        }
        if self.options.legal_metadata {
            metadata.extend(legal_metadata(&cleaned));
        }

        let chunks = self.chunker.chunk(&cleaned, &metadata);
        self.check_chunks(doc, &chunks).map_err(|f| f.with_ocr(used_ocr))?;

        Ok(Outcome {
            chunks,
            used_ocr,
            metadata,
        })
    }

    fn process_statute(&self, doc: &SourceDocument, kind: DocumentKind) -> Result<Outcome, Failure> {
        let bytes = read(doc)?;

        let parsed = match kind {
            DocumentKind::StatuteXml => statute::parse_xml(&bytes),
            _ => statute::parse_json(&bytes),
        }
        .map_err(|e| Failure::new(FailureKind::Structural, e.to_string()))?;

        let chapters: Vec<(String, String)> = parsed
            .chapters
            .iter()
            .map(|c| (c.title(), clean_text(&c.text)))
            .filter(|(_, text)| !text.is_empty())
            .collect();
        if chapters.is_empty() {
            return Err(Failure::new(FailureKind::ExtractionMiss, NO_TEXT_ERROR));
        }

        let mut metadata = self.base_metadata(doc, kind, false);
        metadata.insert(
            "title_number".into(),
            Value::from(parsed.title_number.as_str()),
        );
        metadata.insert(
            "title_heading".into(),
            Value::from(parsed.title_heading.as_str()),
        );
        metadata.insert("chapter_count".into(), Value::from(parsed.chapters.len()));

        let spans: Vec<SectionSpan<'_>> = chapters
            .iter()
            .map(|(title, text)| SectionSpan {
                title: title.clone(),
                text,
            })
            .collect();
        let chunks = self.chunker.chunk_sections(&spans, &metadata);
        self.check_chunks(doc, &chunks)?;

        Ok(Outcome {
            chunks,
            used_ocr: false,
            metadata,
        })
    }

    fn base_metadata(
        &self,
        doc: &SourceDocument,
        kind: DocumentKind,
        used_ocr: bool,
    ) -> Map<String, Value> {
        let mut metadata = Map::new();
        metadata.insert("source_file".into(), Value::from(doc.name.as_str()));
        metadata.insert("pillar".into(), Value::from(self.options.pillar.as_str()));
        metadata.insert("used_ocr".into(), Value::from(used_ocr));
        metadata.insert("document_kind".into(), Value::from(kind.as_str()));
        metadata
    }

    fn check_chunks(&self, doc: &SourceDocument, chunks: &[Chunk]) -> Result<(), Failure> {
        if chunks.is_empty() {
            return Err(Failure::new(
                FailureKind::Chunking,
                "Chunking produced no chunks",
            ));
        }
        if !self.chunker.validate(chunks) {
            if self.options.strict_validation {
                return Err(Failure::new(
                    FailureKind::Chunking,
                    "Chunk validation failed",
                ));
            }
            warn!(file = %doc.name, chunks = chunks.len(), "chunk validation failed");
        }
        Ok(())
    }
}

/// Runs `f`, turning a panic inside a PDF library into an error message.
fn guarded<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string())
    })
}

fn read(doc: &SourceDocument) -> Result<Vec<u8>, Failure> {
    std::fs::read(&doc.path).map_err(|e| {
        let kind = if e.kind() == std::io::ErrorKind::NotFound {
            FailureKind::Structural
        } else {
            FailureKind::Io
        };
        Failure::new(
            kind,
            format!("Failed to read {}: {}", doc.path.display(), e),
        )
    })
}
