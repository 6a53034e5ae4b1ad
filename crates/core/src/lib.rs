pub mod bundle;
pub mod config;
pub mod discover;
pub mod error;
pub mod extractor;
pub mod manifest;
pub mod models;
pub mod orchestrator;
pub mod providers;
pub mod retry;
pub mod stages;
pub mod text;
pub mod traits;

pub use bundle::{plan_batches, write_batches, BatchedPaper, UploadBatch, BATCHES_DIR};
pub use config::{
    load_prompt, parse_base_url, seconds, GenerationSettings, ProviderDefaults,
    CLAUDE_DEFAULTS, CLAUDE_DEFAULT_MAX_OUTPUT_TOKENS, GEMINI_DEFAULTS,
};
pub use discover::discover_files;
pub use error::{ApiError, BatchError};
pub use extractor::{extract_document_text, ExtractionOptions, LopdfExtractor, PageText, PdfExtractor};
pub use manifest::{
    render_manifest, write_manifest, write_summary_json, Manifest, MANIFEST_FILE_NAME,
};
pub use models::{
    BatchJob, Conversion, ExistingOutput, FileFailure, FileRecord, FileStatus, RunSummary,
    SkipReason,
};
pub use orchestrator::{output_path, run_batch};
pub use providers::claude::ClaudeConfig;
pub use providers::gemini::GeminiConfig;
pub use providers::{ClaudeGenerator, GeminiGenerator};
pub use retry::{compose_request, generate_with_retry, Generated, RetryPolicy, TokioSleeper};
pub use stages::{GenerationStage, PdfStage};
pub use traits::{
    ConversionStage, ProgressReporter, SilentReporter, Sleeper, StageContext, TextGenerator,
};
