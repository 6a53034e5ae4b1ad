use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// What to do when the output file for an input already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExistingOutput {
    #[default]
    Overwrite,
    Skip,
}

#[derive(Debug, Clone)]
pub struct BatchJob {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub existing: ExistingOutput,
    pub recursive: bool,
}

impl BatchJob {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            existing: ExistingOutput::default(),
            recursive: false,
        }
    }
}

/// Result of converting one input, before it is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversion {
    Text {
        text: String,
        pages: Option<usize>,
        doi: Option<String>,
    },
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    Empty,
    OutputExists,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("empty"),
            Self::OutputExists => f.write_str("output exists"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileStatus {
    Written { output: PathBuf, chars: usize },
    Skipped { reason: SkipReason },
    Failed { reason: String },
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Written { output, chars } => {
                let name = output
                    .file_name()
                    .map(|name| name.to_string_lossy())
                    .unwrap_or_default();
                write!(f, "saved: {name} ({chars} characters)")
            }
            Self::Skipped { reason } => write!(f, "skipped: {reason}"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub index: usize,
    pub file_name: String,
    pub status: FileStatus,
    pub pages: Option<usize>,
    pub doi: Option<String>,
}

impl FileRecord {
    pub fn status_label(&self) -> &'static str {
        match self.status {
            FileStatus::Written { .. } => "success",
            FileStatus::Skipped { .. } => "skipped",
            FileStatus::Failed { .. } => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileFailure {
    pub file_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub records: Vec<FileRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    pub fn start(total: usize) -> Self {
        Self {
            total,
            processed: 0,
            failed: 0,
            skipped: 0,
            records: Vec::with_capacity(total),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn record(&mut self, record: FileRecord) {
        match record.status {
            FileStatus::Written { .. } => self.processed += 1,
            FileStatus::Skipped { .. } => self.skipped += 1,
            FileStatus::Failed { .. } => self.failed += 1,
        }
        self.records.push(record);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn is_balanced(&self) -> bool {
        self.processed + self.failed + self.skipped == self.total
    }

    pub fn failures(&self) -> Vec<FileFailure> {
        self.records
            .iter()
            .filter_map(|record| match &record.status {
                FileStatus::Failed { reason } => Some(FileFailure {
                    file_name: record.file_name.clone(),
                    reason: reason.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    pub fn elapsed_seconds(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_seconds())
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(50);
        writeln!(f, "{rule}")?;
        writeln!(f, "SUMMARY")?;
        writeln!(f, "{rule}")?;
        writeln!(f, "Total files:     {}", self.total)?;
        writeln!(f, "Processed:       {}", self.processed)?;
        writeln!(f, "Failed:          {}", self.failed)?;
        writeln!(f, "Skipped:         {}", self.skipped)?;
        if let Some(seconds) = self.elapsed_seconds() {
            writeln!(f, "Elapsed:         {seconds}s")?;
        }

        let failures = self.failures();
        if !failures.is_empty() {
            writeln!(f, "Failures:")?;
            for failure in failures {
                writeln!(f, "  {}: {}", failure.file_name, failure.reason)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(index: usize, name: &str, status: FileStatus) -> FileRecord {
        FileRecord {
            index,
            file_name: name.to_string(),
            status,
            pages: None,
            doi: None,
        }
    }

    #[test]
    fn counters_follow_recorded_statuses() {
        let mut summary = RunSummary::start(3);
        summary.record(record(
            1,
            "a.txt",
            FileStatus::Written {
                output: PathBuf::from("out/a.md"),
                chars: 10,
            },
        ));
        summary.record(record(
            2,
            "b.txt",
            FileStatus::Skipped {
                reason: SkipReason::Empty,
            },
        ));
        summary.record(record(
            3,
            "c.txt",
            FileStatus::Failed {
                reason: "boom".to_string(),
            },
        ));

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert!(summary.is_balanced());

        let failures = summary.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].file_name, "c.txt");
        assert_eq!(failures[0].reason, "boom");
    }

    #[test]
    fn summary_report_lists_failures() {
        let mut summary = RunSummary::start(1);
        summary.record(record(
            1,
            "broken.pdf",
            FileStatus::Failed {
                reason: "pdf parse error: bad xref".to_string(),
            },
        ));
        summary.finish();

        let report = summary.to_string();
        assert!(report.contains("Total files:     1"));
        assert!(report.contains("Failed:          1"));
        assert!(report.contains("broken.pdf: pdf parse error: bad xref"));
    }

    #[test]
    fn written_status_shows_output_name() {
        let status = FileStatus::Written {
            output: PathBuf::from("/tmp/out/paper.md"),
            chars: 42,
        };
        assert_eq!(status.to_string(), "saved: paper.md (42 characters)");
    }
}
