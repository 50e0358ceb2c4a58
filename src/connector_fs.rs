//! Document discovery for a pillar's input directory.

use anyhow::{bail, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::config::PillarConfig;
use crate::models::SourceDocument;

/// Enumerate the files a pillar will process, sorted by path.
///
/// Non-recursive pillars only look at the top level of `input_dir`. Globs
/// match against the path relative to `input_dir`, falling back to the bare
/// file name, so `*.pdf` works at any depth.
pub fn scan_documents(pillar: &PillarConfig) -> Result<Vec<SourceDocument>> {
    let root = &pillar.input_dir;
    if !root.exists() {
        bail!("Pillar input directory does not exist: {}", root.display());
    }
    if !root.is_dir() {
        bail!("Pillar input path is not a directory: {}", root.display());
    }

    let include_set = build_globset(&pillar.globs())?;
    let exclude_set = build_globset(&["**/.*".to_string(), ".*".to_string()])?;

    let mut walker = WalkDir::new(root).min_depth(1);
    if !pillar.recursive {
        walker = walker.max_depth(1);
    }

    let mut docs = Vec::new();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();
        let file_name = entry.file_name().to_string_lossy().to_string();

        // Hidden files and editor droppings
        if exclude_set.is_match(&rel_str) {
            continue;
        }

        if !include_set.is_match(&rel_str) && !include_set.is_match(&file_name) {
            continue;
        }

        docs.push(SourceDocument::from_path(path));
    }

    // Sort for deterministic ordering
    docs.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(docs)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(GlobBuilder::new(pattern).case_insensitive(true).build()?);
    }
    Ok(builder.build()?)
}
