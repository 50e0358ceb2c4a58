//! Experiment tracking for pipeline runs.
//!
//! A run records its parameters, stepped metrics, tables (the per-file
//! error list) and artifacts (the JSONL output). [`FileTracker`] lays these
//! out on disk:
//!
//! ```text
//! <dir>/<experiment>/<run_id>/
//!   run.json          run name, status, timestamps
//!   params.json
//!   metrics.jsonl     {"step": n, "timestamp": ..., "metrics": {...}} per line
//!   artifacts/        tables as {"columns": [...], "data": [[...]]}, copied files
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::config::TrackingConfig;

pub trait RunTracker {
    fn log_params(&mut self, params: &Map<String, Value>) -> Result<()>;
    fn log_metrics(&mut self, metrics: &Map<String, Value>, step: Option<u64>) -> Result<()>;
    fn log_table(&mut self, name: &str, columns: &[&str], rows: &[Vec<String>]) -> Result<()>;
    fn log_artifact(&mut self, path: &Path) -> Result<()>;
    fn end_run(&mut self, status: &str) -> Result<()>;
}

/// Used when `[tracking]` is not configured.
pub struct NoTracker;

impl RunTracker for NoTracker {
    fn log_params(&mut self, _params: &Map<String, Value>) -> Result<()> {
        Ok(())
    }
    fn log_metrics(&mut self, _metrics: &Map<String, Value>, _step: Option<u64>) -> Result<()> {
        Ok(())
    }
    fn log_table(&mut self, _name: &str, _columns: &[&str], _rows: &[Vec<String>]) -> Result<()> {
        Ok(())
    }
    fn log_artifact(&mut self, _path: &Path) -> Result<()> {
        Ok(())
    }
    fn end_run(&mut self, _status: &str) -> Result<()> {
        Ok(())
    }
}

pub struct FileTracker {
    run_id: String,
    run_name: String,
    experiment: String,
    dir: PathBuf,
    started_at: DateTime<Utc>,
}

impl FileTracker {
    pub fn start(config: &TrackingConfig, run_name: &str) -> Result<Self> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let dir = config.dir.join(&config.experiment).join(&run_id);
        fs::create_dir_all(dir.join("artifacts"))
            .with_context(|| format!("Failed to create run directory: {}", dir.display()))?;

        let tracker = Self {
            run_id,
            run_name: run_name.to_string(),
            experiment: config.experiment.clone(),
            dir,
            started_at: Utc::now(),
        };
        tracker.write_run_file("running", None)?;
        debug!(run_id = %tracker.run_id, dir = %tracker.dir.display(), "tracking run started");
        Ok(tracker)
    }

    pub fn run_dir(&self) -> &Path {
        &self.dir
    }

    fn write_run_file(&self, status: &str, finished_at: Option<DateTime<Utc>>) -> Result<()> {
        let run = json!({
            "run_id": self.run_id,
            "run_name": self.run_name,
            "experiment": self.experiment,
            "status": status,
            "started_at": self.started_at.to_rfc3339(),
            "finished_at": finished_at.map(|t| t.to_rfc3339()),
        });
        write_json(&self.dir.join("run.json"), &run)
    }
}

impl RunTracker for FileTracker {
    fn log_params(&mut self, params: &Map<String, Value>) -> Result<()> {
        write_json(&self.dir.join("params.json"), &Value::Object(params.clone()))
    }

    fn log_metrics(&mut self, metrics: &Map<String, Value>, step: Option<u64>) -> Result<()> {
        let path = self.dir.join("metrics.jsonl");
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let line = json!({
            "step": step,
            "timestamp": Utc::now().to_rfc3339(),
            "metrics": metrics,
        });
        writeln!(file, "{}", serde_json::to_string(&line)?)
            .with_context(|| format!("Failed to append to {}", path.display()))?;
        Ok(())
    }

    fn log_table(&mut self, name: &str, columns: &[&str], rows: &[Vec<String>]) -> Result<()> {
        let table = json!({ "columns": columns, "data": rows });
        let file_name = if name.ends_with(".json") {
            name.to_string()
        } else {
            format!("{}.json", name)
        };
        write_json(&self.dir.join("artifacts").join(file_name), &table)
    }

    fn log_artifact(&mut self, path: &Path) -> Result<()> {
        let name = path
            .file_name()
            .with_context(|| format!("Artifact has no file name: {}", path.display()))?;
        let dest = self.dir.join("artifacts").join(name);
        fs::copy(path, &dest).with_context(|| {
            format!(
                "Failed to copy artifact {} to {}",
                path.display(),
                dest.display()
            )
        })?;
        Ok(())
    }

    fn end_run(&mut self, status: &str) -> Result<()> {
        self.write_run_file(status, Some(Utc::now()))
    }
}

fn write_json(path: &Path, value: &Value) -> Result<()> {
    let mut file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(&mut file, value)?;
    file.write_all(b"\n")?;
    Ok(())
}

/// Tracker for a run: file-backed when configured, otherwise a no-op.
pub fn start_run(config: Option<&TrackingConfig>, run_name: &str) -> Result<Box<dyn RunTracker>> {
    match config {
        Some(cfg) => Ok(Box::new(FileTracker::start(cfg, run_name)?)),
        None => Ok(Box::new(NoTracker)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tracking(dir: &TempDir) -> TrackingConfig {
        TrackingConfig {
            dir: dir.path().to_path_buf(),
            experiment: "unit".to_string(),
        }
    }

    #[test]
    fn lays_out_run_directory() {
        let dir = TempDir::new().unwrap();
        let mut tracker = FileTracker::start(&tracking(&dir), "cases").unwrap();
        let run_dir = tracker.run_dir().to_path_buf();
        assert!(run_dir.starts_with(dir.path().join("unit")));

        let mut params = Map::new();
        params.insert("chunk_size".into(), Value::from(1000));
        tracker.log_params(&params).unwrap();

        let mut metrics = Map::new();
        metrics.insert("good_files".into(), Value::from(3));
        tracker.log_metrics(&metrics, Some(50)).unwrap();
        tracker.log_metrics(&metrics, None).unwrap();

        tracker
            .log_table(
                "processing_errors.json",
                &["file_name", "error"],
                &[vec!["bad.pdf".into(), "boom".into()]],
            )
            .unwrap();

        let output = dir.path().join("out.jsonl");
        fs::write(&output, "{}\n").unwrap();
        tracker.log_artifact(&output).unwrap();
        tracker.end_run("finished").unwrap();

        let metric_lines = fs::read_to_string(run_dir.join("metrics.jsonl")).unwrap();
        assert_eq!(metric_lines.lines().count(), 2);
        let first: Value = serde_json::from_str(metric_lines.lines().next().unwrap()).unwrap();
        assert_eq!(first["step"], 50);
        assert_eq!(first["metrics"]["good_files"], 3);

        let table: Value = serde_json::from_str(
            &fs::read_to_string(run_dir.join("artifacts/processing_errors.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(table["columns"][1], "error");
        assert_eq!(table["data"][0][0], "bad.pdf");

        assert!(run_dir.join("artifacts/out.jsonl").exists());
        let run: Value =
            serde_json::from_str(&fs::read_to_string(run_dir.join("run.json")).unwrap()).unwrap();
        assert_eq!(run["status"], "finished");
        assert_eq!(run["run_name"], "cases");
        assert!(run["finished_at"].is_string());
    }

    #[test]
    fn missing_artifact_is_error() {
        let dir = TempDir::new().unwrap();
        let mut tracker = FileTracker::start(&tracking(&dir), "cases").unwrap();
        assert!(tracker.log_artifact(&dir.path().join("nope.jsonl")).is_err());
    }
}
