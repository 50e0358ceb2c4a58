//! PDF text extraction with an OCR fallback.
//!
//! The primary path reads the native text layer with `pdf-extract`. Only
//! when that yields nothing usable (an *extraction miss*) does the
//! [`Extractor`] render the pages and OCR them. The OCR engine is built on
//! the first miss and reused for the rest of the batch.

use std::panic::{self, AssertUnwindSafe};

use once_cell::unsync::OnceCell;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::OcrConfig;
use crate::models::{ExtractionResult, SourceDocument};
use crate::ocr::{self, OcrEngine, OcrError};

#[derive(Debug, Error)]
pub enum ExtractError {
    /// The engine could not be built; OCR never ran on the document.
    #[error("OCR engine unavailable: {0}")]
    EngineUnavailable(OcrError),
    #[error("OCR failed: {0}")]
    Ocr(#[from] OcrError),
}

pub type OcrFactory = Box<dyn Fn() -> Result<Box<dyn OcrEngine>, OcrError>>;

pub struct Extractor {
    factory: Option<OcrFactory>,
    engine: OnceCell<Box<dyn OcrEngine>>,
}

impl Extractor {
    /// Extractor for the configured OCR backend, or text-layer only when
    /// OCR is disabled.
    pub fn new(config: &OcrConfig) -> Self {
        if !config.enabled {
            return Self::without_ocr();
        }
        let config = config.clone();
        Self::with_ocr_factory(move || ocr::build_engine(&config))
    }

    pub fn with_ocr_factory<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn OcrEngine>, OcrError> + 'static,
    {
        Self {
            factory: Some(Box::new(factory)),
            engine: OnceCell::new(),
        }
    }

    pub fn without_ocr() -> Self {
        Self {
            factory: None,
            engine: OnceCell::new(),
        }
    }

    /// Whether the OCR engine has been built yet.
    pub fn ocr_initialized(&self) -> bool {
        self.engine.get().is_some()
    }

    /// Extract text from an already validated PDF.
    ///
    /// `raw_text` is `None` when neither path produced non-whitespace text.
    /// `used_fallback` is set whenever OCR ran, even if it found nothing.
    pub fn extract(
        &self,
        doc: &SourceDocument,
        bytes: &[u8],
    ) -> Result<ExtractionResult, ExtractError> {
        if let Some(text) = text_layer(doc, bytes) {
            debug!(file = %doc.name, chars = text.len(), "native text layer");
            return Ok(ExtractionResult {
                raw_text: Some(text),
                used_fallback: false,
            });
        }

        let Some(factory) = &self.factory else {
            debug!(file = %doc.name, "no text layer and OCR disabled");
            return Ok(ExtractionResult {
                raw_text: None,
                used_fallback: false,
            });
        };

        let engine = self
            .engine
            .get_or_try_init(|| {
                info!("initializing OCR engine");
                factory()
            })
            .map_err(ExtractError::EngineUnavailable)?;

        info!(file = %doc.name, "no text layer, running OCR");
        let text = engine.ocr_document(bytes)?;
        let raw_text = if text.trim().is_empty() {
            None
        } else {
            Some(text)
        };

        Ok(ExtractionResult {
            raw_text,
            used_fallback: true,
        })
    }
}

/// Native text, pages joined by `\n`. `None` on a miss.
///
/// The parser can fail or panic on PDFs that `lopdf` accepts (odd fonts,
/// broken encodings); both are treated as a miss.
fn text_layer(doc: &SourceDocument, bytes: &[u8]) -> Option<String> {
    let parsed = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    }));

    let pages = match parsed {
        Ok(Ok(pages)) => pages,
        Ok(Err(e)) => {
            warn!(file = %doc.name, error = %e, "text layer unreadable, treating as extraction miss");
            return None;
        }
        Err(_) => {
            warn!(file = %doc.name, "text layer parser panicked, treating as extraction miss");
            return None;
        }
    };

    let text = pages
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
