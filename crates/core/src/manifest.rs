use crate::models::{FileStatus, RunSummary};
use crate::BatchError;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE_NAME: &str = "MANIFEST.md";

const FILENAME_COLUMN_CHARS: usize = 60;

/// Markdown table of every file in a run, one row per record.
pub struct Manifest<'a>(pub &'a RunSummary);

impl fmt::Display for Manifest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = self.0;
        let generated = summary
            .finished_at
            .unwrap_or(summary.started_at)
            .format("%Y-%m-%d %H:%M");

        writeln!(f, "# Extraction Manifest")?;
        writeln!(f, "Generated: {generated}")?;
        writeln!(f, "Total Files: {}", summary.total)?;
        writeln!(f, "Successfully Extracted: {}", summary.processed)?;
        writeln!(f, "Skipped: {}", summary.skipped)?;
        writeln!(f, "Errors: {}", summary.failed)?;
        writeln!(f)?;
        writeln!(f, "| # | Status | Pages | Chars | DOI | Filename |")?;
        writeln!(f, "|---|--------|-------|-------|-----|----------|")?;

        for record in &summary.records {
            let chars = match &record.status {
                FileStatus::Written { chars, .. } => chars.to_string(),
                _ => "-".to_string(),
            };
            let pages = record
                .pages
                .map(|pages| pages.to_string())
                .unwrap_or_else(|| "-".to_string());
            let doi = record.doi.as_deref().unwrap_or("-");
            writeln!(
                f,
                "| {} | {} | {} | {} | {} | {} |",
                record.index,
                record.status_label(),
                pages,
                chars,
                escape_cell(doi),
                escape_cell(&truncate(&record.file_name, FILENAME_COLUMN_CHARS)),
            )?;
        }
        Ok(())
    }
}

pub fn render_manifest(summary: &RunSummary) -> String {
    Manifest(summary).to_string()
}

pub fn write_manifest(summary: &RunSummary, output_dir: &Path) -> Result<PathBuf, BatchError> {
    let path = output_dir.join(MANIFEST_FILE_NAME);
    fs::write(&path, render_manifest(summary))?;
    Ok(path)
}

/// Writes the run summary as pretty-printed JSON, creating parent folders.
pub fn write_summary_json(summary: &RunSummary, path: &Path) -> Result<(), BatchError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(path, json)?;
    Ok(())
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut cut: String = value.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}

fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|")
}
