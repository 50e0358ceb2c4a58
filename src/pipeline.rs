//! Batch pipeline orchestration.
//!
//! Coordinates a pillar run: scan → process each document → write chunks
//! to JSONL. A failed document is recorded and skipped; only sink and
//! tracker I/O errors abort the run. Every `batch_size` documents the
//! pipeline logs a progress snapshot and stepped metrics.

use anyhow::{bail, Result};
use serde_json::{Map, Value};
use tracing::info;

use crate::config::{Config, PillarConfig};
use crate::connector_fs;
use crate::models::{OutputRecord, PipelineRun, SourceDocument};
use crate::processor::DocumentProcessor;
use crate::progress::{BatchProgressEvent, BatchProgressReporter, ProgressMode};
use crate::sink::JsonlSink;
use crate::stats;
use crate::tracker::{self, RunTracker};

pub const ERROR_TABLE: &str = "processing_errors.json";

pub struct BatchPipeline<'a> {
    processor: &'a DocumentProcessor,
    batch_size: usize,
    reporter: &'a dyn BatchProgressReporter,
    tracker: &'a mut dyn RunTracker,
}

impl<'a> BatchPipeline<'a> {
    pub fn new(
        processor: &'a DocumentProcessor,
        batch_size: usize,
        reporter: &'a dyn BatchProgressReporter,
        tracker: &'a mut dyn RunTracker,
    ) -> Self {
        Self {
            processor,
            batch_size: batch_size.max(1),
            reporter,
            tracker,
        }
    }

    pub fn run(&mut self, docs: &[SourceDocument], sink: &mut JsonlSink) -> Result<PipelineRun> {
        let pillar = self.processor.pillar().to_string();
        let mut run = PipelineRun::new(&pillar, docs.len());

        let chunker = self.processor.chunker();
        info!(
            pillar = %pillar,
            total = docs.len(),
            chunk_size = chunker.chunk_size(),
            overlap = chunker.overlap(),
            "starting batch"
        );
        self.reporter.report(BatchProgressEvent::Discovered {
            pillar: pillar.clone(),
            total: docs.len() as u64,
        });
        self.tracker
            .log_metrics(&metrics(&[("total_files", Value::from(docs.len()))]), Some(0))?;

        for doc in docs {
            let record = self.processor.process(doc);

            if record.success {
                for chunk in &record.chunks {
                    let line =
                        OutputRecord::from_chunk(chunk, &record.file_name, &pillar, record.used_ocr);
                    sink.write(&line)?;
                }
                sink.flush()?;
                run.record_success(record.chunks.len(), record.used_ocr);
            } else {
                let error = record.error.as_deref().unwrap_or("unknown error");
                run.record_failure(&record.file_name, error, record.used_ocr);
            }

            if run.processed % self.batch_size == 0 {
                self.checkpoint(&run)?;
            }
        }

        if run.processed % self.batch_size != 0 || docs.is_empty() {
            self.checkpoint(&run)?;
        }
        run.finish();

        self.tracker.log_metrics(&final_metrics(&run), None)?;
        if !run.error_list.is_empty() {
            let rows: Vec<Vec<String>> = run
                .error_list
                .iter()
                .map(|(file, error)| vec![file.clone(), error.clone()])
                .collect();
            self.tracker
                .log_table(ERROR_TABLE, &["file_name", "error"], &rows)?;
        }
        sink.flush()?;
        self.tracker.log_artifact(sink.path())?;

        info!(
            pillar = %pillar,
            good = run.good_files,
            bad = run.bad_files,
            chunks = run.total_chunks,
            ocr = run.ocr_files,
            lines = sink.lines_written(),
            "batch complete"
        );
        Ok(run)
    }

    fn checkpoint(&mut self, run: &PipelineRun) -> Result<()> {
        info!(
            pillar = %run.pillar,
            processed = run.processed,
            total = run.total_files,
            good = run.good_files,
            bad = run.bad_files,
            chunks = run.total_chunks,
            "progress"
        );
        self.reporter.report(BatchProgressEvent::Checkpoint {
            pillar: run.pillar.clone(),
            processed: run.processed as u64,
            total: run.total_files as u64,
            good: run.good_files as u64,
            bad: run.bad_files as u64,
            chunks: run.total_chunks as u64,
        });
        self.tracker.log_metrics(
            &metrics(&[
                ("files_processed", Value::from(run.processed)),
                ("good_files", Value::from(run.good_files)),
                ("bad_files", Value::from(run.bad_files)),
                ("total_chunks", Value::from(run.total_chunks)),
                ("ocr_files", Value::from(run.ocr_files)),
            ]),
            Some(run.processed as u64),
        )
    }
}

fn metrics(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn final_metrics(run: &PipelineRun) -> Map<String, Value> {
    let avg_chunks = if run.good_files == 0 {
        0.0
    } else {
        run.total_chunks as f64 / run.good_files as f64
    };
    let duration = run
        .finished_at
        .map(|end| (end - run.started_at).num_milliseconds() as f64 / 1000.0)
        .unwrap_or(0.0);
    metrics(&[
        ("total_files", Value::from(run.total_files)),
        ("good_files", Value::from(run.good_files)),
        ("bad_files", Value::from(run.bad_files)),
        ("total_chunks", Value::from(run.total_chunks)),
        ("ocr_files", Value::from(run.ocr_files)),
        (
            "success_rate",
            Value::from(stats::success_rate(run.good_files, run.processed)),
        ),
        ("avg_chunks_per_file", Value::from(avg_chunks)),
        ("duration_secs", Value::from(duration)),
    ])
}

#[derive(Debug, Clone, Copy)]
pub struct ProcessOptions {
    pub limit: Option<usize>,
    pub dry_run: bool,
    pub progress: ProgressMode,
}

/// CLI entry point for `lexchunk process <pillar|all>`.
pub fn run_process(config: &Config, target: &str, opts: &ProcessOptions) -> Result<Vec<PipelineRun>> {
    let selected: Vec<(&String, &PillarConfig)> = if target == "all" {
        config.pillars.iter().collect()
    } else {
        match config.pillars.get_key_value(target) {
            Some(entry) => vec![entry],
            None => bail!(
                "Unknown pillar: '{}'. Available: {}",
                target,
                config
                    .pillars
                    .keys()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    };

    let mut runs = Vec::new();
    for (name, pillar) in selected {
        let mut docs = connector_fs::scan_documents(pillar)?;
        if let Some(lim) = opts.limit {
            docs.truncate(lim);
        }

        if opts.dry_run {
            println!("process {} (dry-run)", name);
            println!("  input: {}", pillar.input_dir.display());
            println!("  documents found: {}", docs.len());
            println!("  output: {}", pillar.output_file.display());
            continue;
        }

        runs.push(process_pillar(config, name, pillar, &docs, opts.progress)?);
    }
    Ok(runs)
}

fn process_pillar(
    config: &Config,
    name: &str,
    pillar: &PillarConfig,
    docs: &[SourceDocument],
    progress: ProgressMode,
) -> Result<PipelineRun> {
    let label = pillar.label_or(name);
    let processor = DocumentProcessor::from_config(config, label)?;
    let reporter = progress.reporter();

    let mut tracker = tracker::start_run(config.tracking.as_ref(), &format!("process_{}", name))?;
    tracker.log_params(&metrics(&[
        ("pillar", Value::from(label)),
        ("chunk_size", Value::from(config.chunking.chunk_size)),
        ("chunk_overlap", Value::from(config.chunking.chunk_overlap)),
        ("batch_size", Value::from(config.processing.batch_size)),
        (
            "input_folder",
            Value::from(pillar.input_dir.display().to_string()),
        ),
        (
            "output_file",
            Value::from(pillar.output_file.display().to_string()),
        ),
    ]))?;

    let mut sink = match JsonlSink::create(&pillar.output_file) {
        Ok(sink) => sink,
        Err(e) => {
            let _ = tracker.end_run("failed");
            return Err(e);
        }
    };
    let result = BatchPipeline::new(
        &processor,
        config.processing.batch_size,
        reporter.as_ref(),
        tracker.as_mut(),
    )
    .run(docs, &mut sink);

    match result {
        Ok(run) => {
            tracker.end_run("finished")?;
            stats::print_summary(&run, sink.path());
            Ok(run)
        }
        Err(e) => {
            let _ = tracker.end_run("failed");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{ChunkStrategy, Chunker, ChunkerConfig};
    use crate::extract::Extractor;
    use crate::processor::ProcessorOptions;
    use crate::progress::NoProgress;
    use crate::tracker::NoTracker;
    use std::cell::RefCell;
    use std::fs;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorded(RefCell<Vec<BatchProgressEvent>>);

    impl BatchProgressReporter for Recorded {
        fn report(&self, event: BatchProgressEvent) {
            self.0.borrow_mut().push(event);
        }
    }

    fn processor() -> DocumentProcessor {
        DocumentProcessor::new(
            Chunker::new(ChunkStrategy::Legal, ChunkerConfig::default()).unwrap(),
            Extractor::without_ocr(),
            ProcessorOptions {
                pillar: "statutes".to_string(),
                strict_validation: false,
                legal_metadata: false,
            },
        )
    }

    fn statute(dir: &TempDir, i: usize, valid: bool) -> SourceDocument {
        let path = dir.path().join(format!("usc{:02}.json", i));
        let body = if valid {
            format!(
                r#"{{"main": {{"title": {{"num": "{i}", "heading": "TITLE {i}", "chapter": {{"num": "1", "heading": "SCOPE", "content": "This title governs matters numbered {i} in full."}}}}}}}}"#
            )
        } else {
            r#"{"main": {}}"#.to_string()
        };
        fs::write(&path, body).unwrap();
        SourceDocument::from_path(path)
    }

    #[test]
    fn failures_are_recorded_and_run_continues() {
        let dir = TempDir::new().unwrap();
        let docs: Vec<_> = (0..5).map(|i| statute(&dir, i, i != 2)).collect();
        let out = dir.path().join("out/statutes.jsonl");
        let mut sink = JsonlSink::create(&out).unwrap();

        let processor = processor();
        let reporter = Recorded::default();
        let mut tracker = NoTracker;
        let run = BatchPipeline::new(&processor, 2, &reporter, &mut tracker)
            .run(&docs, &mut sink)
            .unwrap();

        assert_eq!(run.processed, 5);
        assert_eq!(run.good_files, 4);
        assert_eq!(run.bad_files, 1);
        assert_eq!(run.total_chunks, 4);
        assert_eq!(run.error_list[0].0, "usc02.json");
        assert!(run.finished_at.is_some());

        // Discovered, checkpoints at 2 and 4, final at 5.
        let events = reporter.0.borrow();
        assert_eq!(events.len(), 4);
        assert!(matches!(
            events.last(),
            Some(BatchProgressEvent::Checkpoint { processed: 5, bad: 1, .. })
        ));

        let content = fs::read_to_string(&out).unwrap();
        let lines: Vec<Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 4);
        for line in &lines {
            assert_eq!(line["metadata"]["chunk_id"], 0);
            assert_eq!(line["metadata"]["pillar"], "statutes");
            assert_eq!(line["metadata"]["used_ocr"], false);
            assert!(line["metadata"]["source_file"].is_string());
        }
    }

    #[test]
    fn empty_batch() {
        let dir = TempDir::new().unwrap();
        let mut sink = JsonlSink::create(&dir.path().join("out.jsonl")).unwrap();
        let processor = processor();
        let mut tracker = NoTracker;
        let run = BatchPipeline::new(&processor, 50, &NoProgress, &mut tracker)
            .run(&[], &mut sink)
            .unwrap();
        assert_eq!(run.total_files, 0);
        assert_eq!(run.processed, 0);
        assert_eq!(fs::read_to_string(dir.path().join("out.jsonl")).unwrap(), "");
    }
}
