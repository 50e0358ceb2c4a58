use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::chunk::{ChunkStrategy, ChunkerConfig};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub tracking: Option<TrackingConfig>,
    #[serde(default)]
    pub pillars: BTreeMap<String, PillarConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_min_chunk_chars")]
    pub min_chunk_chars: usize,
    #[serde(default = "default_strategy")]
    pub strategy: ChunkStrategy,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            min_chunk_chars: default_min_chunk_chars(),
            strategy: default_strategy(),
        }
    }
}

impl ChunkingConfig {
    pub fn chunker_config(&self) -> ChunkerConfig {
        ChunkerConfig {
            chunk_size: self.chunk_size,
            overlap: self.chunk_overlap,
            min_chunk_chars: self.min_chunk_chars,
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    175
}
fn default_min_chunk_chars() -> usize {
    20
}
fn default_strategy() -> ChunkStrategy {
    ChunkStrategy::Legal
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProcessingConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Treat a failed chunk quality check as a document failure.
    #[serde(default)]
    pub strict_validation: bool,
    #[serde(default = "default_true")]
    pub legal_metadata: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            strict_validation: false,
            legal_metadata: true,
        }
    }
}

fn default_batch_size() -> usize {
    50
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OcrBackend {
    Tesseract,
    Ocrs,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OcrConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_backend")]
    pub backend: OcrBackend,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_tesseract_bin")]
    pub tesseract_bin: String,
    #[serde(default)]
    pub pdfium_library: Option<PathBuf>,
    #[serde(default)]
    pub detection_model: Option<PathBuf>,
    #[serde(default)]
    pub recognition_model: Option<PathBuf>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: default_backend(),
            language: default_language(),
            tesseract_bin: default_tesseract_bin(),
            pdfium_library: None,
            detection_model: None,
            recognition_model: None,
        }
    }
}

fn default_backend() -> OcrBackend {
    OcrBackend::Tesseract
}
fn default_language() -> String {
    "eng".to_string()
}
fn default_tesseract_bin() -> String {
    "tesseract".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrackingConfig {
    #[serde(default = "default_tracking_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_experiment")]
    pub experiment: String,
}

fn default_tracking_dir() -> PathBuf {
    PathBuf::from("./runs")
}
fn default_experiment() -> String {
    "legal-rag-processing".to_string()
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PillarKind {
    Pdf,
    Statute,
}

/// One document collection: an input directory and its JSONL output.
#[derive(Debug, Deserialize, Clone)]
pub struct PillarConfig {
    pub kind: PillarKind,
    #[serde(default)]
    pub label: Option<String>,
    pub input_dir: PathBuf,
    pub output_file: PathBuf,
    #[serde(default)]
    pub include_globs: Option<Vec<String>>,
    #[serde(default)]
    pub recursive: bool,
}

impl PillarConfig {
    /// Label written into every record; the pillar's table name unless overridden.
    pub fn label_or<'a>(&'a self, name: &'a str) -> &'a str {
        self.label.as_deref().unwrap_or(name)
    }

    pub fn globs(&self) -> Vec<String> {
        match &self.include_globs {
            Some(globs) => globs.clone(),
            None => match self.kind {
                PillarKind::Pdf => vec!["*.pdf".to_string()],
                PillarKind::Statute => vec!["*.json".to_string(), "*.xml".to_string()],
            },
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!(
            "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
            config.chunking.chunk_overlap,
            config.chunking.chunk_size
        );
    }
    if config.chunking.min_chunk_chars > config.chunking.chunk_size {
        anyhow::bail!("chunking.min_chunk_chars must not exceed chunking.chunk_size");
    }

    // Validate processing
    if config.processing.batch_size == 0 {
        anyhow::bail!("processing.batch_size must be > 0");
    }

    // Validate pillars
    if config.pillars.is_empty() {
        anyhow::bail!("No pillars configured. Add at least one [pillars.<name>] table.");
    }
    for (name, pillar) in &config.pillars {
        if pillar.globs().is_empty() {
            anyhow::bail!("pillars.{}.include_globs must not be empty", name);
        }
    }

    // Validate OCR
    if config.ocr.enabled && config.ocr.backend == OcrBackend::Ocrs {
        if !cfg!(feature = "ocr-ocrs") {
            anyhow::bail!(
                "ocr.backend = \"ocrs\" requires lexchunk built with the ocr-ocrs feature"
            );
        }
        if config.ocr.detection_model.is_none() || config.ocr.recognition_model.is_none() {
            anyhow::bail!(
                "ocr.detection_model and ocr.recognition_model must be set when backend is 'ocrs'"
            );
        }
    }

    Ok(())
}
