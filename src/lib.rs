//! # lexchunk
//!
//! A legal document normalization pipeline: turns heterogeneous legal
//! sources (text and scanned PDFs, structured statute JSON/XML) into
//! uniformly chunked JSONL records ready for embedding and retrieval.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌───────────────┐   ┌─────────┐   ┌──────────┐   ┌────────┐
//! │  Pillar dir │──▶│   Extract     │──▶│  Clean  │──▶│  Chunk   │──▶│ JSONL  │
//! │ PDF/JSON/XML│   │ text │ OCR    │   │         │   │ sections │   │  sink  │
//! └─────────────┘   └───────────────┘   └─────────┘   └──────────┘   └────────┘
//!                                                          │
//!                                               progress + run tracking
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! lexchunk pillars                 # list configured collections
//! lexchunk process cases --dry-run # count what would be processed
//! lexchunk process all             # run every pillar
//! lexchunk inspect some/case.pdf   # debug one document
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`connector_fs`] | Pillar directory scanning |
//! | [`extract`] | Text layer extraction with OCR fallback |
//! | [`ocr`] | Page rasterization and text recognition |
//! | [`clean`] | Text normalization |
//! | [`chunk`] | Recursive and section-aware chunking |
//! | [`metadata`] | PDF info and legal heuristics |
//! | [`statute`] | Statute JSON/XML parsing |
//! | [`processor`] | Per-document processing |
//! | [`pipeline`] | Batch orchestration |
//! | [`sink`] | JSONL output |
//! | [`tracker`] | Run parameters, metrics, and artifacts |
//! | [`progress`] | Progress reporting |
//! | [`stats`] | Summaries |
//! | [`inspect`] | Single-document debugging |

pub mod chunk;
pub mod clean;
pub mod config;
pub mod connector_fs;
pub mod extract;
pub mod inspect;
pub mod metadata;
pub mod models;
pub mod ocr;
pub mod pipeline;
pub mod processor;
pub mod progress;
pub mod sink;
pub mod stats;
pub mod statute;
pub mod tracker;
