//! Pillar overview and run summaries.
//!
//! `lexchunk pillars` prints what is configured and how many files each
//! pillar would pick up; every finished `process` run prints a summary with
//! the per-file error table so failures are visible without digging
//! through logs.

use anyhow::Result;
use std::path::Path;

use crate::config::Config;
use crate::connector_fs;
use crate::models::PipelineRun;
use crate::progress::format_number;

/// Run the pillars command: print one row per configured pillar.
pub fn run_pillars(config: &Config) -> Result<()> {
    println!("lexchunk: pillars");
    println!("=================");
    println!();
    println!(
        "  {:<16} {:<8} {:>7}   {}",
        "PILLAR", "KIND", "FILES", "INPUT → OUTPUT"
    );
    println!("  {}", "-".repeat(76));

    for (name, pillar) in &config.pillars {
        let files = match connector_fs::scan_documents(pillar) {
            Ok(docs) => format_number(docs.len() as u64),
            Err(_) => "missing".to_string(),
        };
        let kind = match pillar.kind {
            crate::config::PillarKind::Pdf => "pdf",
            crate::config::PillarKind::Statute => "statute",
        };
        println!(
            "  {:<16} {:<8} {:>7}   {} → {}",
            name,
            kind,
            files,
            pillar.input_dir.display(),
            pillar.output_file.display()
        );
    }

    println!();
    Ok(())
}

/// Print the end-of-run summary to stdout.
pub fn print_summary(run: &PipelineRun, output: &Path) {
    let output_size = std::fs::metadata(output).map(|m| m.len()).unwrap_or(0);
    let duration = run
        .finished_at
        .map(|end| (end - run.started_at).num_milliseconds() as f64 / 1000.0)
        .unwrap_or(0.0);

    println!("process {}", run.pillar);
    println!("  documents:   {}", format_number(run.total_files as u64));
    println!("  succeeded:   {}", format_number(run.good_files as u64));
    println!("  failed:      {}", format_number(run.bad_files as u64));
    println!("  used OCR:    {}", format_number(run.ocr_files as u64));
    println!("  chunks:      {}", format_number(run.total_chunks as u64));
    println!(
        "  success:     {:.1}%",
        success_rate(run.good_files, run.processed) * 100.0
    );
    println!(
        "  output:      {} ({})",
        output.display(),
        format_bytes(output_size)
    );
    println!("  duration:    {:.1}s", duration);

    if !run.error_list.is_empty() {
        println!();
        println!("  Errors:");
        println!("  {:<40} {}", "FILE", "ERROR");
        println!("  {}", "-".repeat(76));
        for (file, error) in &run.error_list {
            println!("  {:<40} {}", file, error);
        }
    }

    println!("ok");
}

pub fn success_rate(good: usize, processed: usize) -> f64 {
    if processed == 0 {
        0.0
    } else {
        good as f64 / processed as f64
    }
}

/// Format a byte count as a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
