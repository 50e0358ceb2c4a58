//! Append-only JSONL output.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::models::OutputRecord;

/// One JSON object per line, UTF-8, no trailing comma.
///
/// The file is truncated when opened. Callers flush after each document so
/// a crash mid-run leaves only complete lines behind; `Drop` flushes too.
pub struct JsonlSink {
    path: PathBuf,
    writer: BufWriter<File>,
    lines: u64,
}

impl JsonlSink {
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create output directory: {}", parent.display())
                })?;
            }
        }
        let file = File::create(path)
            .with_context(|| format!("Failed to open output file: {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            lines: 0,
        })
    }

    pub fn write(&mut self, record: &OutputRecord) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record)
            .with_context(|| format!("Failed to write record to {}", self.path.display()))?;
        self.writer.write_all(b"\n")?;
        self.lines += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .with_context(|| format!("Failed to flush {}", self.path.display()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines_written(&self) -> u64 {
        self.lines
    }
}

impl Drop for JsonlSink {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}
