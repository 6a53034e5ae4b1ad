use crate::models::{BatchJob, Conversion, FileRecord};
use crate::{ApiError, BatchError};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str, document: &str) -> Result<String, ApiError>;
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// One kind of per-file conversion driven by the batch orchestrator.
#[async_trait]
pub trait ConversionStage: Send + Sync {
    fn input_extension(&self) -> &str;

    fn output_extension(&self) -> &str;

    /// Pause inserted after each converted file except the last.
    fn pause_between_files(&self) -> Duration {
        Duration::ZERO
    }

    async fn convert(
        &self,
        path: &Path,
        context: &StageContext<'_>,
    ) -> Result<Conversion, BatchError>;
}

/// Run-wide collaborators handed to a stage for each file.
pub struct StageContext<'a> {
    pub sleeper: &'a dyn Sleeper,
    pub reporter: &'a dyn ProgressReporter,
}

pub trait ProgressReporter: Sync {
    fn batch_started(&self, _job: &BatchJob, _total: usize) {}

    fn file_started(&self, _index: usize, _total: usize, _path: &Path) {}

    /// Size in characters of the document about to be sent.
    fn input_size(&self, _chars: usize) {}

    fn file_finished(&self, _record: &FileRecord) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
