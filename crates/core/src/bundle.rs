use crate::models::{FileStatus, RunSummary};
use crate::text::title_guess;
use crate::BatchError;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const BATCHES_DIR: &str = "batches";

/// One extracted paper inside an upload batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchedPaper {
    pub index: usize,
    pub title: String,
    pub file_name: String,
    pub doi: Option<String>,
    pub pages: Option<usize>,
    pub text: String,
}

/// Several extracted papers concatenated into one upload file.
///
/// `first` and `last` count positions among the successfully extracted
/// papers of the run, starting at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadBatch {
    pub number: usize,
    pub first: usize,
    pub last: usize,
    pub of_total: usize,
    pub papers: Vec<BatchedPaper>,
}

impl UploadBatch {
    pub fn file_name(&self) -> String {
        format!(
            "batch_{:02}_papers_{}_to_{}.txt",
            self.number, self.first, self.last
        )
    }
}

impl fmt::Display for UploadBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hashes = "#".repeat(60);
        let rule = "=".repeat(60);
        let tilde = "~".repeat(60);

        writeln!(f, "{hashes}")?;
        writeln!(f, "# LITERATURE BATCH {}", self.number)?;
        writeln!(f, "# Papers {} to {} of {}", self.first, self.last, self.of_total)?;
        writeln!(f, "{hashes}")?;

        for paper in &self.papers {
            let pages = paper
                .pages
                .map(|pages| pages.to_string())
                .unwrap_or_else(|| "-".to_string());

            writeln!(f)?;
            writeln!(f, "{rule}")?;
            writeln!(f, "PAPER {}: {}", paper.index, paper.title)?;
            writeln!(f, "{rule}")?;
            writeln!(f, "Source: {}", paper.file_name)?;
            writeln!(f, "DOI: {}", paper.doi.as_deref().unwrap_or("Not found"))?;
            writeln!(f, "Pages: {pages}")?;
            writeln!(f, "{rule}")?;
            writeln!(f)?;
            writeln!(f, "{}", paper.text)?;
            writeln!(f)?;
            writeln!(f, "{tilde}")?;
            writeln!(f, "END OF PAPER {}", paper.index)?;
            writeln!(f, "{tilde}")?;
        }
        Ok(())
    }
}

/// Groups the written outputs of `summary` into batches of `batch_size`,
/// reading each paper's text back from its output file.
pub fn plan_batches(summary: &RunSummary, batch_size: usize) -> Result<Vec<UploadBatch>, BatchError> {
    if batch_size == 0 {
        return Err(BatchError::InvalidArgument(
            "batch size must be at least 1".to_string(),
        ));
    }

    let mut papers = Vec::new();
    for record in &summary.records {
        let FileStatus::Written { output, .. } = &record.status else {
            continue;
        };
        let stem = Path::new(&record.file_name)
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default();

        papers.push(BatchedPaper {
            index: record.index,
            title: title_guess(&stem)?,
            file_name: record.file_name.clone(),
            doi: record.doi.clone(),
            pages: record.pages,
            text: fs::read_to_string(output)?,
        });
    }

    let of_total = papers.len();
    Ok(papers
        .chunks(batch_size)
        .enumerate()
        .map(|(position, chunk)| {
            let first = position * batch_size + 1;
            UploadBatch {
                number: position + 1,
                first,
                last: first + chunk.len() - 1,
                of_total,
                papers: chunk.to_vec(),
            }
        })
        .collect())
}

/// Writes upload batches under `<output_dir>/batches/` and returns their
/// paths in batch order. A run with no written outputs produces none.
pub fn write_batches(
    summary: &RunSummary,
    output_dir: &Path,
    batch_size: usize,
) -> Result<Vec<PathBuf>, BatchError> {
    let batches = plan_batches(summary, batch_size)?;
    if batches.is_empty() {
        return Ok(Vec::new());
    }

    let folder = output_dir.join(BATCHES_DIR);
    fs::create_dir_all(&folder)?;

    let mut paths = Vec::with_capacity(batches.len());
    for batch in &batches {
        let path = folder.join(batch.file_name());
        fs::write(&path, batch.to_string())?;
        info!(
            batch = batch.number,
            papers = batch.papers.len(),
            path = %path.display(),
            "upload batch written"
        );
        paths.push(path);
    }
    Ok(paths)
}
