use crate::discover::discover_files;
use crate::models::{BatchJob, Conversion, ExistingOutput, FileRecord, FileStatus, RunSummary, SkipReason};
use crate::traits::{ConversionStage, ProgressReporter, Sleeper, StageContext};
use crate::BatchError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Runs `stage` over every matching file of `job.input_dir`, one at a time.
///
/// Only setup problems (missing input directory, unwritable output
/// directory) are returned as errors; per-file failures end up in the
/// summary.
pub async fn run_batch<C>(
    job: &BatchJob,
    stage: &C,
    sleeper: &dyn Sleeper,
    reporter: &dyn ProgressReporter,
) -> Result<RunSummary, BatchError>
where
    C: ConversionStage + ?Sized,
{
    let files = discover_files(&job.input_dir, stage.input_extension(), job.recursive)?;
    fs::create_dir_all(&job.output_dir)?;

    let total = files.len();
    let mut summary = RunSummary::start(total);
    reporter.batch_started(job, total);
    info!(
        input = %job.input_dir.display(),
        output = %job.output_dir.display(),
        extension = stage.input_extension(),
        total,
        "batch started"
    );

    let context = StageContext { sleeper, reporter };
    for (position, path) in files.iter().enumerate() {
        let index = position + 1;
        reporter.file_started(index, total, path);

        let (status, attempted, pages, doi) = process_file(job, stage, &context, path).await;
        let record = FileRecord {
            index,
            file_name: display_name(path, &job.input_dir),
            status,
            pages,
            doi,
        };

        if let FileStatus::Failed { reason } = &record.status {
            warn!(file = %record.file_name, %reason, "file failed");
        }
        reporter.file_finished(&record);
        summary.record(record);

        let pause = stage.pause_between_files();
        if attempted && index < total && !pause.is_zero() {
            sleeper.sleep(pause).await;
        }
    }

    summary.finish();
    info!(
        total = summary.total,
        processed = summary.processed,
        failed = summary.failed,
        skipped = summary.skipped,
        "batch finished"
    );
    Ok(summary)
}

// The flag reports whether the stage was invoked, which is what earns the
// inter-file pause.
async fn process_file<C>(
    job: &BatchJob,
    stage: &C,
    context: &StageContext<'_>,
    path: &Path,
) -> (FileStatus, bool, Option<usize>, Option<String>)
where
    C: ConversionStage + ?Sized,
{
    let output = match output_path(path, &job.input_dir, &job.output_dir, stage.output_extension()) {
        Ok(output) => output,
        Err(error) => {
            return (
                FileStatus::Failed {
                    reason: error.to_string(),
                },
                false,
                None,
                None,
            )
        }
    };

    if job.existing == ExistingOutput::Skip && output.exists() {
        let status = FileStatus::Skipped {
            reason: SkipReason::OutputExists,
        };
        return (status, false, None, None);
    }

    match stage.convert(path, context).await {
        Ok(Conversion::Empty) => (
            FileStatus::Skipped {
                reason: SkipReason::Empty,
            },
            false,
            None,
            None,
        ),
        Ok(Conversion::Text { text, pages, doi }) => {
            let status = match write_output(&output, &text) {
                Ok(()) => FileStatus::Written {
                    output,
                    chars: text.chars().count(),
                },
                Err(error) => FileStatus::Failed {
                    reason: BatchError::Io(error).to_string(),
                },
            };
            (status, true, pages, doi)
        }
        Err(error) => (
            FileStatus::Failed {
                reason: error.to_string(),
            },
            true,
            None,
            None,
        ),
    }
}

/// `<output_dir>/<subpath under input_root>/<input stem>.<extension>`
///
/// Inputs found in subfolders keep their relative folder, so two
/// `paper.pdf` files from different folders never share an output.
pub fn output_path(
    input: &Path,
    input_root: &Path,
    output_dir: &Path,
    extension: &str,
) -> Result<PathBuf, BatchError> {
    let stem = input
        .file_stem()
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| BatchError::MissingFileName(input.display().to_string()))?;

    let mut name = stem.to_os_string();
    name.push(".");
    name.push(extension);

    let folder = input
        .strip_prefix(input_root)
        .ok()
        .and_then(Path::parent)
        .map(|relative| output_dir.join(relative))
        .unwrap_or_else(|| output_dir.to_path_buf());
    Ok(folder.join(name))
}

fn write_output(output: &Path, text: &str) -> std::io::Result<()> {
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, text)
}

// Relative to the input folder so records from different subfolders stay
// distinguishable.
fn display_name(path: &Path, input_root: &Path) -> String {
    match path.strip_prefix(input_root) {
        Ok(relative) if !relative.as_os_str().is_empty() => relative.display().to_string(),
        _ => path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string()),
    }
}
