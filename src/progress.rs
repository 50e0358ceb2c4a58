//! Batch progress reporting.
//!
//! Reports observable progress during `lexchunk process` so users see how
//! many documents were found, how many are done, and how many failed.
//! Progress is emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event for a pillar run.
#[derive(Clone, Debug)]
pub enum BatchProgressEvent {
    /// Input directory scanned; `total` documents queued.
    Discovered { pillar: String, total: u64 },
    /// Periodic snapshot, every `batch_size` documents and at the end.
    Checkpoint {
        pillar: String,
        processed: u64,
        total: u64,
        good: u64,
        bad: u64,
        chunks: u64,
    },
}

/// Reports batch progress. Implementations write to stderr (human or JSON).
pub trait BatchProgressReporter {
    fn report(&self, event: BatchProgressEvent);
}

/// Human-friendly progress on stderr: "process cases  1,234 / 5,000 docs  (3 failed, 20,511 chunks)".
pub struct StderrProgress;

impl BatchProgressReporter for StderrProgress {
    fn report(&self, event: BatchProgressEvent) {
        let line = match &event {
            BatchProgressEvent::Discovered { pillar, total } => {
                format!("process {}  found {} documents\n", pillar, format_number(*total))
            }
            BatchProgressEvent::Checkpoint {
                pillar,
                processed,
                total,
                bad,
                chunks,
                ..
            } => format!(
                "process {}  {} / {} docs  ({} failed, {} chunks)\n",
                pillar,
                format_number(*processed),
                format_number(*total),
                format_number(*bad),
                format_number(*chunks)
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl BatchProgressReporter for JsonProgress {
    fn report(&self, event: BatchProgressEvent) {
        let obj = match &event {
            BatchProgressEvent::Discovered { pillar, total } => serde_json::json!({
                "event": "progress",
                "pillar": pillar,
                "phase": "discovered",
                "total": total
            }),
            BatchProgressEvent::Checkpoint {
                pillar,
                processed,
                total,
                good,
                bad,
                chunks,
            } => serde_json::json!({
                "event": "progress",
                "pillar": pillar,
                "phase": "processing",
                "processed": processed,
                "total": total,
                "good_files": good,
                "bad_files": bad,
                "total_chunks": chunks
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl BatchProgressReporter for NoProgress {
    fn report(&self, _event: BatchProgressEvent) {}
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn BatchProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(1), "1");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234), "1,234");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }
}
