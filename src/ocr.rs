//! OCR fallback for PDFs without a usable text layer.
//!
//! Pages are rasterized with Pdfium at [`RENDER_SCALE`] and handed to a
//! [`TextRecognizer`]. The two stages meet in [`RasterOcr`], which is the
//! [`OcrEngine`] the extractor uses by default.
//!
//! Recognizers:
//! - **Tesseract** (default): shells out to the `tesseract` binary.
//! - **OCRS**: pure Rust, no external binaries (feature: `ocr-ocrs`).

use std::path::Path;
use std::process::Command;

use image::{ImageFormat, RgbaImage};
use pdfium_render::prelude::{PdfRenderConfig, Pdfium};
use thiserror::Error;
use tracing::debug;

use crate::config::{OcrBackend, OcrConfig};

/// Pages are rendered at twice their nominal size in both axes.
pub const RENDER_SCALE: f32 = 2.0;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("failed to load Pdfium runtime: {0}")]
    Library(String),
    #[error("failed to open PDF for rendering: {0}")]
    Document(String),
    #[error("failed to render page {page}: {message}")]
    Render { page: usize, message: String },
    #[error("text recognition failed: {0}")]
    Recognition(String),
    #[error("OCR backend unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Renders PDF pages to bitmaps, one at a time.
pub trait PageRasterizer {
    /// Calls `f` with each page in order. Returns the number of pages rendered.
    fn for_each_page(
        &self,
        pdf: &[u8],
        scale: f32,
        f: &mut dyn FnMut(usize, &RgbaImage) -> Result<(), OcrError>,
    ) -> Result<usize, OcrError>;
}

/// Recognizes text fragments (lines or words) in one page image.
pub trait TextRecognizer {
    fn recognize(&self, page: &RgbaImage) -> Result<Vec<String>, OcrError>;
}

/// Whole-document OCR: PDF bytes in, text out.
///
/// Implementations join fragments within a page with single spaces and
/// pages with `\n`. An empty string means nothing was recognized.
pub trait OcrEngine {
    fn ocr_document(&self, pdf: &[u8]) -> Result<String, OcrError>;
}

/// Rasterizer + recognizer pair.
pub struct RasterOcr<R, T> {
    rasterizer: R,
    recognizer: T,
}

impl<R: PageRasterizer, T: TextRecognizer> RasterOcr<R, T> {
    pub fn new(rasterizer: R, recognizer: T) -> Self {
        Self {
            rasterizer,
            recognizer,
        }
    }
}

impl<R: PageRasterizer, T: TextRecognizer> OcrEngine for RasterOcr<R, T> {
    fn ocr_document(&self, pdf: &[u8]) -> Result<String, OcrError> {
        let mut pages: Vec<String> = Vec::new();
        let rendered = self
            .rasterizer
            .for_each_page(pdf, RENDER_SCALE, &mut |index, image| {
                let fragments = self.recognizer.recognize(image)?;
                debug!(
                    page = index,
                    width = image.width(),
                    height = image.height(),
                    fragments = fragments.len(),
                    "recognized page"
                );
                pages.push(fragments.join(" "));
                Ok(())
            })?;
        debug!(pages = rendered, "OCR pass complete");
        Ok(pages.join("\n"))
    }
}

/// Pdfium-backed rasterizer. Binding the library is the expensive part, so
/// one instance is kept for the lifetime of the engine.
pub struct PdfiumRasterizer {
    pdfium: Pdfium,
}

impl PdfiumRasterizer {
    /// Binds to `library` (a file or a directory holding the platform
    /// library) or, when `None`, to `./` and then the system library.
    pub fn load(library: Option<&Path>) -> Result<Self, OcrError> {
        let bindings = match library {
            Some(path) if path.is_dir() => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(path))
            }
            Some(path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| OcrError::Library(e.to_string()))?;

        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn for_each_page(
        &self,
        pdf: &[u8],
        scale: f32,
        f: &mut dyn FnMut(usize, &RgbaImage) -> Result<(), OcrError>,
    ) -> Result<usize, OcrError> {
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|e| OcrError::Document(e.to_string()))?;
        let config = PdfRenderConfig::new().scale_page_by_factor(scale);

        let mut rendered = 0;
        for (index, page) in document.pages().iter().enumerate() {
            let bitmap = page
                .render_with_config(&config)
                .map_err(|e| OcrError::Render {
                    page: index,
                    message: e.to_string(),
                })?;
            let width = bitmap.width() as u32;
            let height = bitmap.height() as u32;
            let image = RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes()).ok_or_else(
                || OcrError::Render {
                    page: index,
                    message: format!("bitmap buffer does not match {}x{}", width, height),
                },
            )?;
            f(index, &image)?;
            rendered += 1;
        }
        Ok(rendered)
    }
}

/// Runs `tesseract <page.png> stdout -l <language>` per page.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    bin: String,
    language: String,
}

impl TesseractRecognizer {
    pub fn new(bin: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            bin: bin.into(),
            language: language.into(),
        }
    }

    /// Fails when the binary cannot be run at all.
    pub fn probe(&self) -> Result<(), OcrError> {
        let output = Command::new(&self.bin)
            .arg("--version")
            .output()
            .map_err(|e| OcrError::Unavailable(format!("{}: {}", self.bin, e)))?;
        if !output.status.success() {
            return Err(OcrError::Unavailable(format!(
                "{} --version exited with {}",
                self.bin, output.status
            )));
        }
        Ok(())
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, page: &RgbaImage) -> Result<Vec<String>, OcrError> {
        let file = tempfile::Builder::new()
            .prefix("lexchunk-page-")
            .suffix(".png")
            .tempfile()?;
        page.save_with_format(file.path(), ImageFormat::Png)
            .map_err(|e| OcrError::Recognition(e.to_string()))?;

        let output = Command::new(&self.bin)
            .arg(file.path())
            .arg("stdout")
            .args(["-l", &self.language])
            .output()
            .map_err(|e| OcrError::Unavailable(format!("{}: {}", self.bin, e)))?;

        if !output.status.success() {
            return Err(OcrError::Recognition(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        Ok(fragments(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Non-empty trimmed lines.
fn fragments(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(feature = "ocr-ocrs")]
pub use ocrs_backend::OcrsRecognizer;

#[cfg(feature = "ocr-ocrs")]
mod ocrs_backend {
    use std::path::Path;

    use image::RgbaImage;
    use ocrs::{ImageSource, OcrEngineParams};
    use rten::Model;

    use super::{fragments, OcrError, TextRecognizer};

    pub struct OcrsRecognizer {
        engine: ocrs::OcrEngine,
    }

    impl OcrsRecognizer {
        pub fn load(detection_model: &Path, recognition_model: &Path) -> Result<Self, OcrError> {
            let detection = Model::load_file(detection_model)
                .map_err(|e| OcrError::Unavailable(format!("detection model: {}", e)))?;
            let recognition = Model::load_file(recognition_model)
                .map_err(|e| OcrError::Unavailable(format!("recognition model: {}", e)))?;
            let engine = ocrs::OcrEngine::new(OcrEngineParams {
                detection_model: Some(detection),
                recognition_model: Some(recognition),
                ..Default::default()
            })
            .map_err(|e| OcrError::Unavailable(e.to_string()))?;
            Ok(Self { engine })
        }
    }

    impl TextRecognizer for OcrsRecognizer {
        fn recognize(&self, page: &RgbaImage) -> Result<Vec<String>, OcrError> {
            let source = ImageSource::from_bytes(page.as_raw(), page.dimensions())
                .map_err(|e| OcrError::Recognition(e.to_string()))?;
            let input = self
                .engine
                .prepare_input(source)
                .map_err(|e| OcrError::Recognition(e.to_string()))?;
            let text = self
                .engine
                .get_text(&input)
                .map_err(|e| OcrError::Recognition(e.to_string()))?;
            Ok(fragments(&text))
        }
    }
}

/// Builds the configured engine. Called lazily on the first OCR fallback.
pub fn build_engine(config: &OcrConfig) -> Result<Box<dyn OcrEngine>, OcrError> {
    let rasterizer = PdfiumRasterizer::load(config.pdfium_library.as_deref())?;
    match config.backend {
        OcrBackend::Tesseract => {
            let recognizer = TesseractRecognizer::new(&config.tesseract_bin, &config.language);
            recognizer.probe()?;
            Ok(Box::new(RasterOcr::new(rasterizer, recognizer)))
        }
        OcrBackend::Ocrs => build_ocrs(rasterizer, config),
    }
}

#[cfg(feature = "ocr-ocrs")]
fn build_ocrs(
    rasterizer: PdfiumRasterizer,
    config: &OcrConfig,
) -> Result<Box<dyn OcrEngine>, OcrError> {
    let (Some(detection), Some(recognition)) = (&config.detection_model, &config.recognition_model)
    else {
        return Err(OcrError::Unavailable(
            "ocrs backend needs detection_model and recognition_model".to_string(),
        ));
    };
    let recognizer = OcrsRecognizer::load(detection, recognition)?;
    Ok(Box::new(RasterOcr::new(rasterizer, recognizer)))
}

#[cfg(not(feature = "ocr-ocrs"))]
fn build_ocrs(
    _rasterizer: PdfiumRasterizer,
    _config: &OcrConfig,
) -> Result<Box<dyn OcrEngine>, OcrError> {
    Err(OcrError::Unavailable(
        "lexchunk was built without the ocr-ocrs feature".to_string(),
    ))
}
