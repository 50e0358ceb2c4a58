//! Library-level pipeline tests on generated PDFs.
//!
//! OCR is replaced by an in-process engine so these run without Pdfium or
//! tesseract. Pages with a text layer never reach it.

use std::cell::Cell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use lexchunk::chunk::{ChunkStrategy, Chunker, ChunkerConfig};
use lexchunk::extract::Extractor;
use lexchunk::models::{FailureKind, SourceDocument};
use lexchunk::ocr::{OcrEngine, OcrError};
use lexchunk::pipeline::BatchPipeline;
use lexchunk::processor::{DocumentProcessor, ProcessorOptions, NO_TEXT_ERROR};
use lexchunk::progress::NoProgress;
use lexchunk::sink::JsonlSink;
use lexchunk::tracker::NoTracker;
use serde_json::Value;
use tempfile::TempDir;

const FAIL_MARKER: &[u8] = b"%OCR-FAIL";

/// Single-page PDF whose content stream shows `line` in Helvetica.
fn text_pdf(line: &str) -> Vec<u8> {
    let stream = format!("BT /F1 12 Tf 72 700 Td ({}) Tj ET", line);
    build_pdf(Some(&stream), &[])
}

/// Single-page PDF with no content stream at all, like a scan without images.
fn blank_pdf(extra: &[u8]) -> Vec<u8> {
    build_pdf(None, extra)
}

fn build_pdf(stream: Option<&str>, extra: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    out.extend_from_slice(extra);
    out.push(b'\n');

    let mut offsets = Vec::new();
    offsets.push(out.len());
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    offsets.push(out.len());
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    offsets.push(out.len());
    match stream {
        Some(_) => out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n"),
        None => out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Resources << >> >> endobj\n"),
    }
    if let Some(content) = stream {
        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
                content.len(),
                content
            )
            .as_bytes(),
        );
        offsets.push(out.len());
        out.extend_from_slice(
            b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
        );
    }

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", offsets.len() + 1).as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in &offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            offsets.len() + 1,
            xref_start
        )
        .as_bytes(),
    );
    out
}

/// Fails on documents carrying [`FAIL_MARKER`], otherwise returns `text`.
struct FakeOcr {
    text: &'static str,
}

impl OcrEngine for FakeOcr {
    fn ocr_document(&self, pdf: &[u8]) -> Result<String, OcrError> {
        if pdf.windows(FAIL_MARKER.len()).any(|w| w == FAIL_MARKER) {
            return Err(OcrError::Recognition("page image unreadable".into()));
        }
        Ok(self.text.to_string())
    }
}

fn processor_with(extractor: Extractor) -> DocumentProcessor {
    DocumentProcessor::new(
        Chunker::new(ChunkStrategy::Legal, ChunkerConfig::default()).unwrap(),
        extractor,
        ProcessorOptions {
            pillar: "case_law".to_string(),
            strict_validation: false,
            legal_metadata: true,
        },
    )
}

fn counting_ocr(text: &'static str) -> (Extractor, Rc<Cell<usize>>) {
    let built = Rc::new(Cell::new(0));
    let counter = built.clone();
    let extractor = Extractor::with_ocr_factory(move || {
        counter.set(counter.get() + 1);
        Ok(Box::new(FakeOcr { text }) as Box<dyn OcrEngine>)
    });
    (extractor, built)
}

fn write(dir: &Path, name: &str, bytes: &[u8]) -> SourceDocument {
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    SourceDocument::from_path(path)
}

#[test]
fn native_text_layer_skips_ocr() {
    let tmp = TempDir::new().unwrap();
    let doc = write(
        tmp.path(),
        "opinion.pdf",
        &text_pdf("The court finds that the defendant breached the lease agreement."),
    );
    let (extractor, built) = counting_ocr("should not be used");
    let processor = processor_with(extractor);

    let record = processor.process(&doc);
    assert!(record.success, "error: {:?}", record.error);
    assert!(!record.used_ocr);
    assert_eq!(built.get(), 0);
    assert!(!processor.extractor().ocr_initialized());
    assert!(record.chunks[0].text.contains("breached the lease"));
    assert_eq!(record.chunks[0].metadata["used_ocr"], false);
    assert_eq!(record.chunks[0].metadata["page_count"], 1);
}

#[test]
fn blank_pdf_goes_through_ocr() {
    let tmp = TempDir::new().unwrap();
    let doc = write(tmp.path(), "scan.pdf", &blank_pdf(b""));
    let (extractor, built) =
        counting_ocr("IN THE SUPERIOR COURT. Plaintiff moves for summary judgment on all counts.");
    let processor = processor_with(extractor);

    let record = processor.process(&doc);
    assert!(record.success, "error: {:?}", record.error);
    assert!(record.used_ocr);
    assert_eq!(built.get(), 1);
    assert!(record.chunks[0].text.contains("summary judgment"));
    assert_eq!(record.chunks[0].metadata["used_ocr"], true);
}

#[test]
fn empty_ocr_output_is_an_extraction_miss() {
    let tmp = TempDir::new().unwrap();
    let doc = write(tmp.path(), "empty.pdf", &blank_pdf(b""));
    let (extractor, _) = counting_ocr("   ");
    let processor = processor_with(extractor);

    let record = processor.process(&doc);
    assert!(!record.success);
    assert!(record.used_ocr);
    assert_eq!(record.failure, Some(FailureKind::ExtractionMiss));
    assert_eq!(record.error.as_deref(), Some(NO_TEXT_ERROR));
}

#[test]
fn blank_pdf_without_ocr_is_an_extraction_miss() {
    let tmp = TempDir::new().unwrap();
    let doc = write(tmp.path(), "empty.pdf", &blank_pdf(b""));
    let processor = processor_with(Extractor::without_ocr());

    let record = processor.process(&doc);
    assert!(!record.success);
    assert!(!record.used_ocr);
    assert_eq!(record.failure, Some(FailureKind::ExtractionMiss));
}

#[test]
fn one_bad_document_does_not_stop_the_batch() {
    let tmp = TempDir::new().unwrap();
    let mut docs = Vec::new();
    for i in 0..10 {
        let doc = if i == 5 {
            write(tmp.path(), &format!("doc{:02}.pdf", i), &blank_pdf(FAIL_MARKER))
        } else if i == 7 {
            write(tmp.path(), &format!("doc{:02}.pdf", i), &blank_pdf(b""))
        } else {
            write(
                tmp.path(),
                &format!("doc{:02}.pdf", i),
                &text_pdf(&format!(
                    "Order number {} entered by the clerk of court on the docket today.",
                    i
                )),
            )
        };
        docs.push(doc);
    }

    let (extractor, built) = counting_ocr("Scanned order granting the motion to dismiss with prejudice.");
    let processor = processor_with(extractor);
    let out = tmp.path().join("out").join("case_law.jsonl");
    let mut sink = JsonlSink::create(&out).unwrap();
    let mut tracker = NoTracker;

    let run = BatchPipeline::new(&processor, 3, &NoProgress, &mut tracker)
        .run(&docs, &mut sink)
        .unwrap();

    assert_eq!(run.total_files, 10);
    assert_eq!(run.processed, 10);
    assert_eq!(run.good_files, 9);
    assert_eq!(run.bad_files, 1);
    assert_eq!(run.ocr_files, 2);
    assert_eq!(run.error_list.len(), 1);
    assert_eq!(run.error_list[0].0, "doc05.pdf");
    assert!(run.error_list[0].1.contains("page image unreadable"));
    // The engine is built on the first miss and shared afterwards.
    assert_eq!(built.get(), 1);

    let content = fs::read_to_string(&out).unwrap();
    let lines: Vec<Value> = content
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), run.total_chunks);

    let mut sources: Vec<&str> = lines
        .iter()
        .map(|l| l["metadata"]["source_file"].as_str().unwrap())
        .collect();
    sources.dedup();
    assert_eq!(sources.len(), 9);
    assert!(!sources.contains(&"doc05.pdf"));
    for line in &lines {
        assert_eq!(line["metadata"]["pillar"], "case_law");
        assert!(line["text"].as_str().unwrap().len() >= 20);
    }
}

#[test]
fn statute_xml_chapters_become_sections() {
    let tmp = TempDir::new().unwrap();
    let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<uscDoc>
  <main>
    <title>
      <num value="5">Title 5.</num>
      <heading>GOVERNMENT ORGANIZATION AND EMPLOYEES</heading>
      <chapter>
        <num value="1">CHAPTER 1.</num>
        <heading>ORGANIZATION</heading>
        <content>Each Executive agency shall be organized under this chapter.</content>
      </chapter>
      <chapter>
        <num value="3">CHAPTER 3.</num>
        <heading>POWERS</heading>
        <content>The head of an Executive department may prescribe regulations.</content>
      </chapter>
    </title>
  </main>
</uscDoc>"#;
    let doc = write(tmp.path(), "usc05.xml", xml.as_bytes());
    let processor = processor_with(Extractor::without_ocr());

    let record = processor.process(&doc);
    assert!(record.success, "error: {:?}", record.error);
    assert_eq!(record.chunks.len(), 2);
    assert!(record.chunks.iter().all(|c| c.is_section_derived));
    assert_eq!(record.chunks[0].section_index, Some(0));
    assert_eq!(record.chunks[1].section_index, Some(1));
    assert!(record.chunks[1].text.contains("prescribe regulations"));
}
